use log::{debug, info};
use crate::amr_box::AmrBox;
use crate::error::Error;
use crate::grid::{ArrayBuffer, DataArray, UniformGrid, GHOST_ARRAY, GHOST_CELL, REAL_CELL};
use crate::hierarchy::AmrHierarchy;
use crate::index_space::{Axis, MemoryRegion};
use crate::message::Controller;




/**
 * Build a new hierarchy in which every block above the coarsest level is
 * surrounded by `ghost_layers` layers of ghost cells.
 *
 * Level-0 blocks are copied verbatim. Blocks at finer levels are enlarged by
 * `ghost_layers` cells on each side of every active axis, and their cell
 * arrays are copied into the real region of the enlarged grid; ghost entries
 * are zero until they are filled by the exchange. Every output grid carries a
 * `GHOST` array (1 on real cells, 0 on ghost cells), which replaces any
 * `GHOST` array on the input. Point data is only kept at level 0.
 *
 * The metadata of blocks which are absent on this process is grown as well,
 * so every process agrees on the global box layout. If a controller is given,
 * all processes synchronize on a barrier once the output is complete.
 */
pub fn extrude(
    input: &AmrHierarchy,
    ghost_layers: usize,
    controller: Option<&mut Controller>) -> Result<AmrHierarchy, Error>
{
    assert!(ghost_layers >= 1, "the number of ghost layers must be at least 1");
    assert_eq!(input.ghost_layers(1), 0, "the input hierarchy already has ghost layers");

    let mut output = input.empty_like();
    let mut extruded = 0;
    output.set_ghost_layers(ghost_layers);

    for (key, meta, grid) in input.blocks() {
        if key.level == 0 {
            output.push_block(meta.clone(), grid.map(mark_all_real));
        } else {
            let grown = meta.grow(ghost_layers);
            let grid = grid.map(|grid| extrude_grid(meta, &grown, grid, ghost_layers));
            extruded += grid.is_some() as usize;
            output.push_block(grown, grid);
        }
    }
    output.generate_visibility_arrays();

    info!("extruded {} local blocks with {} ghost layers", extruded, ghost_layers);

    if let Some(controller) = controller {
        controller.barrier()?;
    }
    Ok(output)
}




// ============================================================================
fn mark_all_real(grid: &UniformGrid) -> UniformGrid {
    let mut copy = grid.clone();
    let flags = vec![REAL_CELL; copy.num_cells()];
    copy.cell_data_mut().insert(DataArray::from_i32(GHOST_ARRAY, 1, flags));
    copy
}

fn extrude_grid(meta: &AmrBox, grown: &AmrBox, grid: &UniformGrid, g: usize) -> UniformGrid {
    let mut dims = grid.dims();
    let mut origin = grid.origin();
    let spacing = grid.spacing();

    for axis in Axis::active(meta.dimension) {
        let a = axis.index();
        dims[a] += 2 * g;
        origin[a] -= g as f64 * spacing[a];
    }
    let mut output = UniformGrid::new(dims, origin, spacing);
    let region = meta.space.memory_region_in(&grown.space);

    let mut flags = vec![GHOST_CELL; output.num_cells()];
    for flag in region.iter_slice_mut(&mut flags, 1) {
        flag[0] = REAL_CELL
    }

    for array in grid.cell_data().iter() {
        if array.name() == GHOST_ARRAY {
            debug!("block {}.{}: replacing the input {} array", meta.level, meta.block, GHOST_ARRAY);
            continue;
        }
        let mut copy = array.zeros_like(output.num_cells());
        scatter(&region, array.buffer(), copy.buffer_mut(), array.num_components());
        output.cell_data_mut().insert(copy);
    }
    output.cell_data_mut().insert(DataArray::from_i32(GHOST_ARRAY, 1, flags));

    if !grid.point_data().is_empty() {
        debug!("block {}.{}: {} point arrays are not extruded", meta.level, meta.block, grid.point_data().len());
    }
    output
}

fn scatter(region: &MemoryRegion, source: &ArrayBuffer, target: &mut ArrayBuffer, num_components: usize) {
    fn copy<T: Copy>(region: &MemoryRegion, source: &[T], target: &mut [T], num_components: usize) {
        for (dst, src) in region.iter_slice_mut(target, num_components).zip(source.chunks_exact(num_components)) {
            dst.copy_from_slice(src)
        }
    }
    match (source, target) {
        (ArrayBuffer::Float64(s), ArrayBuffer::Float64(t)) => copy(region, s, t, num_components),
        (ArrayBuffer::Int32(s), ArrayBuffer::Int32(t)) => copy(region, s, t, num_components),
        _ => unreachable!("zeros_like preserves the buffer type"),
    }
}




// ============================================================================
#[cfg(test)]
mod test {

    use super::extrude;
    use crate::grid::{DataArray, UniformGrid, GHOST_ARRAY};
    use crate::hierarchy::{AmrHierarchy, BlockKey};
    use crate::index_space::{range2d, range3d};
    use crate::message::{ChannelCommunicator, Controller};

    fn scenario_a() -> AmrHierarchy {
        let mut h = AmrHierarchy::new(2, [0.0; 3], [1.0, 1.0, 1.0]);
        h.add_level(2);
        h.add_level(2);

        let coarse = h.new_box(0, range2d(0..4, 0..4), 0);
        let mut grid = UniformGrid::from_function(&coarse, "rho", 1, |(i, j, _)| vec![(i * 10 + j) as f64]);
        grid.point_data_mut().insert(DataArray::from_f64("p", 1, vec![0.5; 25]));
        h.push_block(coarse, Some(grid));

        let fine = h.new_box(1, range2d(2..6, 2..6), 0);
        let grid = UniformGrid::from_function(&fine, "rho", 1, |(i, j, _)| vec![(i * 100 + j) as f64 + 0.25]);
        h.push_block(fine, Some(grid));
        h
    }

    #[test]
    fn coarsest_level_is_copied_with_all_cells_real() {
        let input = scenario_a();
        let output = extrude(&input, 1, None).unwrap();
        let key = BlockKey::new(0, 0);
        let (a, b) = (input.grid(key).unwrap(), output.grid(key).unwrap());
        assert_eq!(output.meta(key), input.meta(key));
        assert_eq!(b.dims(), a.dims());
        assert_eq!(b.cell_data().get("rho"), a.cell_data().get("rho"));
        assert_eq!(b.point_data(), a.point_data());
        assert!(b.ghost_flags().unwrap().iter().all(|&f| f == 1));
    }

    #[test]
    fn finer_blocks_grow_by_the_ghost_width() {
        let input = scenario_a();
        let output = extrude(&input, 1, None).unwrap();
        let key = BlockKey::new(1, 0);
        let grid = output.grid(key).unwrap();

        assert_eq!(grid.dims(), [6, 6, 1]);
        assert_eq!(grid.origin(), [0.5, 0.5, 0.0]);
        assert_eq!(output.meta(key).space, range2d(1..7, 1..7));
        assert_eq!(output.real_space(key), range2d(2..6, 2..6));
        assert!(grid.point_data().is_empty());
        assert_eq!(output.refinement_ratio(0), 2);
    }

    #[test]
    fn ghost_flags_mark_the_outer_ring() {
        let output = extrude(&scenario_a(), 1, None).unwrap();
        let key = BlockKey::new(1, 0);
        let flags = output.grid(key).unwrap().ghost_flags().unwrap();

        for (n, (i, j, _)) in output.meta(key).space.iter().enumerate() {
            let ring = i == 1 || i == 6 || j == 1 || j == 6;
            assert_eq!(flags[n], if ring { 0 } else { 1 });
        }
    }

    #[test]
    fn real_cells_are_preserved_exactly() {
        let input = scenario_a();
        let output = extrude(&input, 2, None).unwrap();
        let key = BlockKey::new(1, 0);
        let space = output.meta(key).space.clone();
        let rho = output.grid(key).unwrap().cell_data().get("rho").unwrap().as_f64().unwrap();

        for index in space.iter() {
            let value = rho[space.row_major_offset(index)];
            if input.meta(key).space.contains(index) {
                assert_eq!(value, (index.0 * 100 + index.1) as f64 + 0.25);
            } else {
                assert_eq!(value, 0.0);
            }
        }
    }

    #[test]
    fn input_ghost_array_is_replaced() {
        let mut input = scenario_a();
        let key = BlockKey::new(1, 0);
        let stale = DataArray::from_i32(GHOST_ARRAY, 1, vec![7; 16]);
        input.grid_mut(key).unwrap().cell_data_mut().insert(stale);

        let output = extrude(&input, 1, None).unwrap();
        let grid = output.grid(key).unwrap();
        assert_eq!(grid.cell_data().len(), 2);
        assert_eq!(grid.ghost_flags().unwrap().iter().filter(|&&f| f == 1).count(), 16);
    }

    #[test]
    fn null_blocks_stay_null_but_grow() {
        let mut input = scenario_a();
        input.add_block(1, range2d(0..2, 0..2), 1, None);

        let output = extrude(&input, 1, None).unwrap();
        let key = BlockKey::new(1, 1);
        assert!(output.grid(key).is_none());
        assert_eq!(output.meta(key).space, range2d(-1..3, -1..3));
        assert_eq!(output.num_blocks(1), 2);
    }

    #[test]
    fn three_dimensional_blocks_grow_on_every_axis() {
        let mut input = AmrHierarchy::new(3, [0.0; 3], [1.0; 3]);
        input.add_level(2);
        input.add_level(2);
        input.add_block(0, range3d(0..2, 0..2, 0..2), 0, None);
        let fine = input.new_box(1, range3d(0..2, 1..3, 2..4), 0);
        let grid = UniformGrid::from_function(&fine, "v", 3, |(i, j, k)| vec![i as f64, j as f64, k as f64]);
        input.push_block(fine, Some(grid));

        let output = extrude(&input, 1, None).unwrap();
        let key = BlockKey::new(1, 0);
        let grid = output.grid(key).unwrap();
        assert_eq!(grid.dims(), [4, 4, 4]);
        assert_eq!(grid.origin(), [-0.5, 0.0, 0.5]);

        let space = output.meta(key).space.clone();
        let v = grid.cell_data().get("v").unwrap().as_f64().unwrap();
        let n = space.row_major_offset((1, 2, 3));
        assert_eq!(&v[3 * n..3 * n + 3], &[1.0, 2.0, 3.0]);
    }

    #[test]
    fn extrusion_ends_on_a_barrier() {
        let handles: Vec<_> = ChannelCommunicator::group(3)
            .into_iter()
            .map(|comm| {
                std::thread::spawn(move || {
                    let mut controller = Controller::new(comm);
                    let output = extrude(&scenario_a(), 1, Some(&mut controller)).unwrap();
                    output.meta(BlockKey::new(1, 0)).space.clone()
                })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.join().unwrap(), range2d(1..7, 1..7));
        }
    }

    #[test]
    #[should_panic]
    fn zero_ghost_layers_is_rejected() {
        extrude(&scenario_a(), 0, None).ok();
    }
}
