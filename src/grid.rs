use serde::{Deserialize, Serialize};
use crate::amr_box::AmrBox;
use crate::index_space::{range3d, IndexSpace};




/// Name of the per-cell array that distinguishes real cells from ghosts.
pub const GHOST_ARRAY: &str = "GHOST";

/// `GHOST` value of a cell that belongs to the block's real extent.
pub const REAL_CELL: i32 = 1;

/// `GHOST` value of a cell in the extruded ghost shell.
pub const GHOST_CELL: i32 = 0;




/**
 * Typed backing storage of a data array. Values are stored tuple by tuple,
 * so a buffer holding `n` tuples of `c` components has `n * c` entries.
 */
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum ArrayBuffer {
    Float64(Vec<f64>),
    Int32(Vec<i32>),
}




// ============================================================================
impl ArrayBuffer {

    pub fn len(&self) -> usize {
        match self {
            ArrayBuffer::Float64(v) => v.len(),
            ArrayBuffer::Int32(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /**
     * Return a zero-filled buffer of the same type with the given length.
     */
    pub fn zeros_like(&self, len: usize) -> Self {
        match self {
            ArrayBuffer::Float64(_) => ArrayBuffer::Float64(vec![0.0; len]),
            ArrayBuffer::Int32(_) => ArrayBuffer::Int32(vec![0; len]),
        }
    }

    /**
     * Return a copy of the entries in `start..start + count`.
     */
    pub fn slice(&self, start: usize, count: usize) -> Self {
        match self {
            ArrayBuffer::Float64(v) => ArrayBuffer::Float64(v[start..start + count].to_vec()),
            ArrayBuffer::Int32(v) => ArrayBuffer::Int32(v[start..start + count].to_vec()),
        }
    }

    /**
     * Overwrite the entries starting at `start` with the contents of another
     * buffer of the same type. Returns false (and writes nothing) if the
     * types differ.
     */
    pub fn write_at(&mut self, start: usize, values: &Self) -> bool {
        match (self, values) {
            (ArrayBuffer::Float64(dst), ArrayBuffer::Float64(src)) => {
                dst[start..start + src.len()].copy_from_slice(src);
                true
            }
            (ArrayBuffer::Int32(dst), ArrayBuffer::Int32(src)) => {
                dst[start..start + src.len()].copy_from_slice(src);
                true
            }
            _ => false,
        }
    }
}




/**
 * A named, multi-component array with one tuple per cell (or point).
 */
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DataArray {
    name: String,
    num_components: usize,
    buffer: ArrayBuffer,
}




// ============================================================================
impl DataArray {


    pub fn new(name: &str, num_components: usize, buffer: ArrayBuffer) -> Self {
        assert!(num_components > 0, "data array {} has no components", name);
        assert!(
            buffer.len() % num_components == 0,
            "data array {} has {} values, not a multiple of {} components",
            name, buffer.len(), num_components);

        Self { name: name.to_string(), num_components, buffer }
    }


    pub fn from_f64(name: &str, num_components: usize, values: Vec<f64>) -> Self {
        Self::new(name, num_components, ArrayBuffer::Float64(values))
    }


    pub fn from_i32(name: &str, num_components: usize, values: Vec<i32>) -> Self {
        Self::new(name, num_components, ArrayBuffer::Int32(values))
    }


    pub fn name(&self) -> &str {
        &self.name
    }


    pub fn num_components(&self) -> usize {
        self.num_components
    }


    pub fn num_tuples(&self) -> usize {
        self.buffer.len() / self.num_components
    }


    pub fn buffer(&self) -> &ArrayBuffer {
        &self.buffer
    }


    pub fn buffer_mut(&mut self) -> &mut ArrayBuffer {
        &mut self.buffer
    }


    /**
     * Return the `f64` values, if this is a floating point array.
     */
    pub fn as_f64(&self) -> Option<&[f64]> {
        match &self.buffer {
            ArrayBuffer::Float64(v) => Some(v),
            ArrayBuffer::Int32(_) => None,
        }
    }


    /**
     * Return the `i32` values, if this is an integer array.
     */
    pub fn as_i32(&self) -> Option<&[i32]> {
        match &self.buffer {
            ArrayBuffer::Int32(v) => Some(v),
            ArrayBuffer::Float64(_) => None,
        }
    }


    /**
     * Return an array of the same name, type and component count, holding
     * `num_tuples` zero tuples.
     */
    pub fn zeros_like(&self, num_tuples: usize) -> Self {
        Self {
            name: self.name.clone(),
            num_components: self.num_components,
            buffer: self.buffer.zeros_like(num_tuples * self.num_components),
        }
    }


    /**
     * Return a copy of tuple `index`.
     */
    pub fn tuple(&self, index: usize) -> ArrayBuffer {
        let c = self.num_components;
        self.buffer.slice(index * c, c)
    }


    /**
     * Overwrite tuple `index`. Returns false if the tuple's type or width
     * does not match this array.
     */
    pub fn set_tuple(&mut self, index: usize, tuple: &ArrayBuffer) -> bool {
        let c = self.num_components;
        tuple.len() == c && self.buffer.write_at(index * c, tuple)
    }
}




/**
 * An ordered collection of data arrays with unique names.
 */
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldData {
    arrays: Vec<DataArray>,
}




// ============================================================================
impl FieldData {

    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.arrays.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arrays.is_empty()
    }

    /**
     * Add an array, replacing any existing array with the same name.
     */
    pub fn insert(&mut self, array: DataArray) {
        match self.arrays.iter_mut().find(|a| a.name == array.name) {
            Some(existing) => *existing = array,
            None => self.arrays.push(array),
        }
    }

    pub fn get(&self, name: &str) -> Option<&DataArray> {
        self.arrays.iter().find(|a| a.name == name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut DataArray> {
        self.arrays.iter_mut().find(|a| a.name == name)
    }

    pub fn remove(&mut self, name: &str) -> Option<DataArray> {
        let n = self.arrays.iter().position(|a| a.name == name)?;
        Some(self.arrays.remove(n))
    }

    pub fn iter(&self) -> impl Iterator<Item = &DataArray> {
        self.arrays.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut DataArray> {
        self.arrays.iter_mut()
    }
}




/**
 * A block of an AMR hierarchy: a uniform rectilinear grid of cells with
 * cell-centered (and optionally point-centered) field data. Cell data is
 * stored in row-major order over the grid's local index space (the final
 * index increases fastest).
 */
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UniformGrid {
    dims: [usize; 3],
    origin: [f64; 3],
    spacing: [f64; 3],
    cell_data: FieldData,
    point_data: FieldData,
    visibility: Option<Vec<u8>>,
}




// ============================================================================
impl UniformGrid {


    /**
     * Create a grid with no field data. `origin` is the world coordinate of
     * the lower corner of cell `(0, 0, 0)`.
     */
    pub fn new(dims: [usize; 3], origin: [f64; 3], spacing: [f64; 3]) -> Self {
        Self {
            dims,
            origin,
            spacing,
            cell_data: FieldData::new(),
            point_data: FieldData::new(),
            visibility: None,
        }
    }


    /**
     * Create an empty grid covering the given AMR box.
     */
    pub fn for_box(meta: &AmrBox) -> Self {
        Self::new(meta.cells(), meta.lower_corner(), meta.spacing)
    }


    /**
     * Generate a grid covering the given AMR box, with a cell array defined
     * from a closure of the global cell index.
     */
    pub fn from_function<F>(meta: &AmrBox, name: &str, num_components: usize, f: F) -> Self
    where
        F: Fn((i64, i64, i64)) -> Vec<f64>
    {
        let values = meta.space.iter().flat_map(|index| {
            let tuple = f(index);
            assert_eq!(tuple.len(), num_components, "closure returned the wrong tuple width");
            tuple
        }).collect();

        let mut grid = Self::for_box(meta);
        grid.cell_data.insert(DataArray::from_f64(name, num_components, values));
        grid
    }


    pub fn dims(&self) -> [usize; 3] {
        self.dims
    }


    pub fn origin(&self) -> [f64; 3] {
        self.origin
    }


    pub fn spacing(&self) -> [f64; 3] {
        self.spacing
    }


    pub fn num_cells(&self) -> usize {
        self.dims[0] * self.dims[1] * self.dims[2]
    }


    /**
     * Return the local index space of this grid's cells, `0..ni x 0..nj x
     * 0..nk`.
     */
    pub fn space(&self) -> IndexSpace {
        range3d(0..self.dims[0] as i64, 0..self.dims[1] as i64, 0..self.dims[2] as i64)
    }


    /**
     * Return the centroid of the cell with the given linear index.
     */
    pub fn cell_centroid(&self, cell: usize) -> [f64; 3] {
        let (i, j, k) = self.space().index_at(cell);
        let index = [i, j, k];
        let mut x = [0.0; 3];

        for a in 0..3 {
            x[a] = self.origin[a] + (index[a] as f64 + 0.5) * self.spacing[a];
        }
        x
    }


    pub fn cell_data(&self) -> &FieldData {
        &self.cell_data
    }


    pub fn cell_data_mut(&mut self) -> &mut FieldData {
        &mut self.cell_data
    }


    pub fn point_data(&self) -> &FieldData {
        &self.point_data
    }


    pub fn point_data_mut(&mut self) -> &mut FieldData {
        &mut self.point_data
    }


    /**
     * Return the `GHOST` array values, if the grid has one.
     */
    pub fn ghost_flags(&self) -> Option<&[i32]> {
        self.cell_data.get(GHOST_ARRAY).and_then(|a| a.as_i32())
    }


    pub fn visibility(&self) -> Option<&[u8]> {
        self.visibility.as_deref()
    }


    pub fn set_visibility(&mut self, visibility: Vec<u8>) {
        assert_eq!(visibility.len(), self.num_cells(), "visibility array has the wrong length");
        self.visibility = Some(visibility)
    }
}




// ============================================================================
#[cfg(test)]
mod test {

    use super::{ArrayBuffer, DataArray, FieldData, UniformGrid};

    #[test]
    fn tuples_can_be_read_and_written() {
        let mut a = DataArray::from_f64("v", 2, vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0]);
        assert_eq!(a.num_tuples(), 3);
        assert_eq!(a.tuple(1), ArrayBuffer::Float64(vec![2.0, 3.0]));
        assert!(a.set_tuple(0, &ArrayBuffer::Float64(vec![9.0, 8.0])));
        assert!(!a.set_tuple(0, &ArrayBuffer::Int32(vec![1, 2])));
        assert!(!a.set_tuple(0, &ArrayBuffer::Float64(vec![1.0])));
        assert_eq!(a.as_f64().unwrap(), &[9.0, 8.0, 2.0, 3.0, 4.0, 5.0]);
    }

    #[test]
    fn field_data_replaces_arrays_by_name() {
        let mut fields = FieldData::new();
        fields.insert(DataArray::from_i32("GHOST", 1, vec![1; 4]));
        fields.insert(DataArray::from_i32("GHOST", 1, vec![0; 4]));
        assert_eq!(fields.len(), 1);
        assert_eq!(fields.get("GHOST").unwrap().as_i32().unwrap(), &[0; 4]);
        assert!(fields.remove("GHOST").is_some());
        assert!(fields.is_empty());
    }

    #[test]
    fn centroids_follow_row_major_order() {
        let grid = UniformGrid::new([2, 3, 1], [1.0, 2.0, 7.0], [0.5, 0.25, 1.0]);
        assert_eq!(grid.cell_centroid(0), [1.25, 2.125, 7.5]);
        assert_eq!(grid.cell_centroid(5), [1.75, 2.625, 7.5]);
    }
}
