use serde::{Deserialize, Serialize};
use crate::index_space::{Axis, IndexSpace};




/**
 * Metadata describing one block of an AMR hierarchy: where it lives in the
 * level's global cell index space, which process owns its data, and the
 * geometry needed to map cell indexes to world coordinates. Cell `(i, j, k)`
 * of a level spans `origin + index * spacing .. origin + (index + 1) *
 * spacing` on each active axis, where `origin` is the domain origin shared
 * by all levels and `spacing` is the cell size at this box's level.
 */
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AmrBox {
    pub level: usize,
    pub block: usize,
    pub owner: usize,
    pub dimension: usize,
    pub space: IndexSpace,
    pub origin: [f64; 3],
    pub spacing: [f64; 3],
}




// ============================================================================
impl AmrBox {


    /**
     * Return a copy of this box grown by `g` cells on each active axis.
     */
    pub fn grow(&self, g: usize) -> Self {
        Self {
            space: self.space.extend_active(g as i64, self.dimension),
            ..self.clone()
        }
    }


    /**
     * Return a copy of this box shrunk by `g` cells on each active axis.
     */
    pub fn shrink(&self, g: usize) -> Self {
        Self {
            space: self.space.trim_active(g as i64, self.dimension),
            ..self.clone()
        }
    }


    /**
     * Return the number of cells along each axis.
     */
    pub fn cells(&self) -> [usize; 3] {
        let (ni, nj, nk) = self.space.dim();
        [ni, nj, nk]
    }


    /**
     * Return the world coordinate of the lower corner of this box.
     */
    pub fn lower_corner(&self) -> [f64; 3] {
        let (i0, j0, k0) = self.space.start();
        let start = [i0, j0, k0];
        let mut x = self.origin;

        for axis in Axis::active(self.dimension) {
            let a = axis.index();
            x[a] = self.origin[a] + start[a] as f64 * self.spacing[a];
        }
        x
    }


    /**
     * Return the centroid of the cell with the given global index.
     */
    pub fn cell_center(&self, index: (i64, i64, i64)) -> [f64; 3] {
        let index = [index.0, index.1, index.2];
        let mut x = self.origin;

        for axis in Axis::active(self.dimension) {
            let a = axis.index();
            x[a] = self.origin[a] + (index[a] as f64 + 0.5) * self.spacing[a];
        }
        x
    }


    /**
     * Structured-coordinate inversion: return the global index of the cell at
     * this box's level which contains the given point. The result may lie
     * outside of this box. Inactive axes always map to the box's first index.
     */
    pub fn locate(&self, point: [f64; 3]) -> (i64, i64, i64) {
        let (i0, j0, k0) = self.space.start();
        let mut index = [i0, j0, k0];

        for axis in Axis::active(self.dimension) {
            let a = axis.index();
            index[a] = ((point[a] - self.origin[a]) / self.spacing[a]).floor() as i64;
        }
        (index[0], index[1], index[2])
    }


    /**
     * Determine whether the given point falls in one of this box's cells.
     * Cells are half-open, so a point on a face shared by two boxes belongs
     * to exactly one of them.
     */
    pub fn contains_point(&self, point: [f64; 3]) -> bool {
        self.space.contains(self.locate(point))
    }
}
