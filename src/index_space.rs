use core::ops::Range;
use serde::{Deserialize, Serialize};




/**
 * Identifier for a Cartesian axis
 */
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Axis {
    I,
    J,
    K,
}

impl Axis {
    pub fn index(self) -> usize {
        match self {
            Axis::I => 0,
            Axis::J => 1,
            Axis::K => 2,
        }
    }

    /**
     * Return the axes which are active for data of the given dimension. 2D
     * data is laid out in the I-J plane with a degenerate K axis.
     */
    pub fn active(dimension: usize) -> &'static [Axis] {
        match dimension {
            2 => &[Axis::I, Axis::J],
            3 => &[Axis::I, Axis::J, Axis::K],
            _ => panic!("only 2D and 3D index spaces are supported, got {}", dimension),
        }
    }
}




/**
 * Represents a rectangular region in a discrete 3D index space. Ranges are
 * half-open, and the index type is signed 64-bit integer.
 */
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IndexSpace {
    di: Range<i64>,
    dj: Range<i64>,
    dk: Range<i64>,
}




// ============================================================================
impl IndexSpace {


    pub fn new(di: Range<i64>, dj: Range<i64>, dk: Range<i64>) -> Self {

        assert!(
            di.start <= di.end && dj.start <= dj.end && dk.start <= dk.end,
            "index space has negative volume");

        Self { di, dj, dk }
    }


    /**
     * Return the range on the given axis.
     */
    pub fn range(&self, axis: Axis) -> &Range<i64> {
        match axis {
            Axis::I => &self.di,
            Axis::J => &self.dj,
            Axis::K => &self.dk,
        }
    }


    /**
     * Return the number of indexes on each axis.
     */
    pub fn dim(&self) -> (usize, usize, usize) {
        ((self.di.end - self.di.start) as usize,
         (self.dj.end - self.dj.start) as usize,
         (self.dk.end - self.dk.start) as usize)
    }


    /**
     * Return the number of elements in this index space.
     */
    pub fn len(&self) -> usize {
        let (l, m, n) = self.dim();
        l * m * n
    }


    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }


    /**
     * Return the minimum index (inclusive).
     */
    pub fn start(&self) -> (i64, i64, i64) {
        (self.di.start, self.dj.start, self.dk.start)
    }


    /**
     * Return the maximum index (exclusive).
     */
    pub fn end(&self) -> (i64, i64, i64) {
        (self.di.end, self.dj.end, self.dk.end)
    }


    /**
     * Determine whether this index space contains the given index.
     */
    pub fn contains(&self, index: (i64, i64, i64)) -> bool {
        self.di.contains(&index.0) &&
        self.dj.contains(&index.1) &&
        self.dk.contains(&index.2)
    }


    /**
     * Determine whether another index space is a subset of this one.
     */
    pub fn contains_space(&self, other: &Self) -> bool {
        other.di.start >= self.di.start && other.di.end <= self.di.end &&
        other.dj.start >= self.dj.start && other.dj.end <= self.dj.end &&
        other.dk.start >= self.dk.start && other.dk.end <= self.dk.end
    }


    /**
     * Return the overlap of two index spaces, or `None` if they share no
     * elements. Spaces that only touch along a face do not intersect.
     */
    pub fn intersect(&self, other: &Self) -> Option<Self> {
        let clip = |a: &Range<i64>, b: &Range<i64>| a.start.max(b.start)..a.end.min(b.end);
        let di = clip(&self.di, &other.di);
        let dj = clip(&self.dj, &other.dj);
        let dk = clip(&self.dk, &other.dk);

        if di.start < di.end && dj.start < dj.end && dk.start < dk.end {
            Some(Self { di, dj, dk })
        } else {
            None
        }
    }


    /**
     * Expand this index space by the given number of elements on each of
     * the axes that are active for the given dimension.
     */
    pub fn extend_active(&self, delta: i64, dimension: usize) -> Self {
        let mut result = self.clone();

        for axis in Axis::active(dimension) {
            let r = result.range_mut(*axis);
            *r = r.start - delta .. r.end + delta;
        }
        assert!(
            result.di.start <= result.di.end &&
            result.dj.start <= result.dj.end &&
            result.dk.start <= result.dk.end,
            "index space has negative volume");
        result
    }


    /**
     * Trim this index space by the given number of elements on each active
     * axis.
     */
    pub fn trim_active(&self, delta: i64, dimension: usize) -> Self {
        self.extend_active(-delta, dimension)
    }


    /**
     * Increase the resolution of this index space by the given factor on
     * the active axes: each element becomes `factor` elements per axis.
     */
    pub fn refine(&self, factor: i64, dimension: usize) -> Self {
        let mut result = self.clone();

        for axis in Axis::active(dimension) {
            let r = result.range_mut(*axis);
            *r = r.start * factor .. r.end * factor;
        }
        result
    }


    /**
     * Decrease the resolution of this index space by the given factor on the
     * active axes. The result covers every coarse element that overlaps the
     * fine region (lower bounds round down, upper bounds round up).
     */
    pub fn coarsen(&self, factor: i64, dimension: usize) -> Self {
        let mut result = self.clone();

        for axis in Axis::active(dimension) {
            let r = result.range_mut(*axis);
            *r = r.start.div_euclid(factor) .. (r.end + factor - 1).div_euclid(factor);
        }
        result
    }


    /**
     * Return the linear offset for the given index, in a row-major memory
     * buffer aligned with the start of this index space.
     */
    pub fn row_major_offset(&self, index: (i64, i64, i64)) -> usize {
        let i = (index.0 - self.di.start) as usize;
        let j = (index.1 - self.dj.start) as usize;
        let k = (index.2 - self.dk.start) as usize;
        let (_, m, n) = self.dim();
        (i * m + j) * n + k
    }


    /**
     * Inverse of `row_major_offset`.
     */
    pub fn index_at(&self, offset: usize) -> (i64, i64, i64) {
        let (_, m, n) = self.dim();
        let k = offset % n;
        let j = (offset / n) % m;
        let i = offset / (n * m);
        (self.di.start + i as i64,
         self.dj.start + j as i64,
         self.dk.start + k as i64)
    }


    /**
     * Return a memory region object corresponding to the selection of this
     * index space in the buffer allocated for another one.
     */
    pub fn memory_region_in(&self, parent: &Self) -> MemoryRegion {
        assert!(parent.contains_space(self), "memory region is not inside its parent");

        let start = (
            (self.di.start - parent.di.start) as usize,
            (self.dj.start - parent.dj.start) as usize,
            (self.dk.start - parent.dk.start) as usize);
        let count = self.dim();
        let shape = parent.dim();
        MemoryRegion { start, count, shape }
    }


    /**
     * Return an iterator which traverses the index space in row-major order
     * (C-like; the final index increases fastest).
     */
    pub fn iter(&self) -> impl Iterator<Item = (i64, i64, i64)> + '_ {
        self.di.clone().flat_map(move |i| {
            self.dj.clone().flat_map(move |j| {
                self.dk.clone().map(move |k| (i, j, k))
            })
        })
    }


    fn range_mut(&mut self, axis: Axis) -> &mut Range<i64> {
        match axis {
            Axis::I => &mut self.di,
            Axis::J => &mut self.dj,
            Axis::K => &mut self.dk,
        }
    }
}




// ============================================================================
impl From<(Range<i64>, Range<i64>, Range<i64>)> for IndexSpace {
    fn from(range: (Range<i64>, Range<i64>, Range<i64>)) -> Self {
        Self::new(range.0, range.1, range.2)
    }
}

impl From<IndexSpace> for (Range<i64>, Range<i64>, Range<i64>) {
    fn from(space: IndexSpace) -> Self {
        (space.di, space.dj, space.dk)
    }
}




/**
 * Less imposing factory function to construct an IndexSpace object.
 */
pub fn range3d(di: Range<i64>, dj: Range<i64>, dk: Range<i64>) -> IndexSpace {
    IndexSpace::new(di, dj, dk)
}




/**
 * Factory function for a planar index space; the K axis is `0..1`.
 */
pub fn range2d(di: Range<i64>, dj: Range<i64>) -> IndexSpace {
    IndexSpace::new(di, dj, 0..1)
}




/**
 * A 3D memory region within a contiguous row-major buffer.
 */
pub struct MemoryRegion {
    start: (usize, usize, usize),
    count: (usize, usize, usize),
    shape: (usize, usize, usize),
}




// ============================================================================
impl MemoryRegion {

    pub fn iter_slice<'a, T>(&'a self, slice: &'a [T], chunk: usize) -> impl Iterator<Item = &'a [T]> {
        let start = self.start;
        let count = self.count;
        let shape = self.shape;
        let s = chunk;
        let r = shape.2 * s;
        let q = shape.1 * r;

        assert!(slice.len() == shape.0 * shape.1 * shape.2 * chunk);

        slice[start.0 * q .. (start.0 + count.0) * q]
        .chunks_exact(q).flat_map(move |j| j[start.1 * r .. (start.1 + count.1) * r]
        .chunks_exact(r).flat_map(move |k| k[start.2 * s .. (start.2 + count.2) * s]
        .chunks_exact(s)))
    }

    pub fn iter_slice_mut<'a, T>(&'a self, slice: &'a mut [T], chunk: usize) -> impl Iterator<Item = &'a mut [T]> {
        let start = self.start;
        let count = self.count;
        let shape = self.shape;
        let s = chunk;
        let r = shape.2 * s;
        let q = shape.1 * r;

        assert!(slice.len() == shape.0 * shape.1 * shape.2 * chunk);

        slice[start.0 * q .. (start.0 + count.0) * q]
        .chunks_exact_mut(q).flat_map(move |j| j[start.1 * r .. (start.1 + count.1) * r]
        .chunks_exact_mut(r).flat_map(move |k| k[start.2 * s .. (start.2 + count.2) * s]
        .chunks_exact_mut(s)))
    }
}
