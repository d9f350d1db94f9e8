use log::debug;
use serde::{Deserialize, Serialize};
use crate::amr_box::AmrBox;
use crate::grid::UniformGrid;
use crate::index_space::{Axis, IndexSpace};




/**
 * Identifies one block slot of a hierarchy by its level and its index
 * within that level. Keys order coarse to fine, then by index.
 */
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BlockKey {
    pub level: usize,
    pub index: usize,
}

impl BlockKey {
    pub fn new(level: usize, index: usize) -> Self {
        Self { level, index }
    }
}




#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
struct Block {
    meta: AmrBox,
    grid: Option<UniformGrid>,
}




#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
struct Level {
    refinement_ratio: i64,
    blocks: Vec<Block>,
}




/**
 * A block-structured AMR hierarchy, as seen from one process. The box layout
 * (metadata) of every block is known everywhere, but a block's grid is only
 * present on the process that owns it; elsewhere its slot is empty.
 *
 * Each level records the refinement ratio between itself and the next finer
 * level. Level 0 has the spacing given at construction, and level `l + 1`
 * has the spacing of level `l` divided by that level's ratio on each active
 * axis.
 */
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AmrHierarchy {
    dimension: usize,
    origin: [f64; 3],
    spacing: [f64; 3],
    ghost_layers: usize,
    levels: Vec<Level>,
}




// ============================================================================
impl AmrHierarchy {


    pub fn new(dimension: usize, origin: [f64; 3], spacing: [f64; 3]) -> Self {
        assert!(
            dimension == 2 || dimension == 3,
            "only 2D and 3D hierarchies are supported, got {}", dimension);

        Self {
            dimension,
            origin,
            spacing,
            ghost_layers: 0,
            levels: Vec::new(),
        }
    }


    /**
     * Return an empty hierarchy with the same geometry, level structure and
     * refinement ratios as this one.
     */
    pub fn empty_like(&self) -> Self {
        Self {
            levels: self.levels.iter().map(|level| Level {
                refinement_ratio: level.refinement_ratio,
                blocks: Vec::new(),
            }).collect(),
            ..Self::new(self.dimension, self.origin, self.spacing)
        }
    }


    /**
     * Append a new finest level, whose refinement ratio to the (future) next
     * level is `refinement_ratio`. Returns the new level's index.
     */
    pub fn add_level(&mut self, refinement_ratio: i64) -> usize {
        assert!(refinement_ratio >= 2, "refinement ratio must be at least 2, got {}", refinement_ratio);

        self.levels.push(Level { refinement_ratio, blocks: Vec::new() });
        self.levels.len() - 1
    }


    /**
     * Create the metadata of a box at the given level. The box is not added
     * to the hierarchy; its block id is assigned by `push_block`.
     */
    pub fn new_box(&self, level: usize, space: IndexSpace, owner: usize) -> AmrBox {
        assert!(level < self.levels.len(), "level {} does not exist", level);

        if self.dimension == 2 {
            assert_eq!(space.range(Axis::K), &(0..1), "2D boxes must have a K range of 0..1");
        }
        AmrBox {
            level,
            block: self.levels[level].blocks.len(),
            owner,
            dimension: self.dimension,
            space,
            origin: self.origin,
            spacing: self.level_spacing(level),
        }
    }


    /**
     * Append a block to the level named by its metadata. The grid, if given,
     * must have one cell per cell of the box.
     */
    pub fn push_block(&mut self, mut meta: AmrBox, grid: Option<UniformGrid>) -> BlockKey {
        assert!(meta.level < self.levels.len(), "level {} does not exist", meta.level);
        assert_eq!(meta.dimension, self.dimension, "box dimension does not match the hierarchy");

        if let Some(grid) = &grid {
            assert_eq!(grid.dims(), meta.cells(), "grid dimensions do not match the box");
        }
        let blocks = &mut self.levels[meta.level].blocks;
        meta.block = blocks.len();
        let key = BlockKey::new(meta.level, meta.block);
        blocks.push(Block { meta, grid });
        key
    }


    /**
     * Create a box at the given level and append it, with an optional grid.
     * The grid, if given, must cover the box.
     */
    pub fn add_block(&mut self, level: usize, space: IndexSpace, owner: usize, grid: Option<UniformGrid>) -> BlockKey {
        let meta = self.new_box(level, space, owner);
        self.push_block(meta, grid)
    }


    pub fn dimension(&self) -> usize {
        self.dimension
    }


    pub fn origin(&self) -> [f64; 3] {
        self.origin
    }


    pub fn num_levels(&self) -> usize {
        self.levels.len()
    }


    pub fn num_blocks(&self, level: usize) -> usize {
        self.levels[level].blocks.len()
    }


    /**
     * Return an iterator over the keys of all block slots, coarse to fine.
     */
    pub fn keys(&self) -> impl Iterator<Item = BlockKey> + '_ {
        self.levels.iter().enumerate().flat_map(|(level, l)| {
            (0..l.blocks.len()).map(move |index| BlockKey::new(level, index))
        })
    }


    /**
     * Return an iterator over every block slot: its key, its metadata, and
     * its grid if present on this process.
     */
    pub fn blocks(&self) -> impl Iterator<Item = (BlockKey, &AmrBox, Option<&UniformGrid>)> + '_ {
        self.keys().map(move |key| {
            let block = self.block(key);
            (key, &block.meta, block.grid.as_ref())
        })
    }


    pub fn meta(&self, key: BlockKey) -> &AmrBox {
        &self.block(key).meta
    }


    pub fn set_meta(&mut self, key: BlockKey, meta: AmrBox) {
        assert_eq!((meta.level, meta.block), (key.level, key.index), "metadata does not match its slot");
        self.block_mut(key).meta = meta
    }


    pub fn grid(&self, key: BlockKey) -> Option<&UniformGrid> {
        self.block(key).grid.as_ref()
    }


    pub fn grid_mut(&mut self, key: BlockKey) -> Option<&mut UniformGrid> {
        self.block_mut(key).grid.as_mut()
    }


    pub fn take_grid(&mut self, key: BlockKey) -> Option<UniformGrid> {
        self.block_mut(key).grid.take()
    }


    pub fn set_grid(&mut self, key: BlockKey, grid: Option<UniformGrid>) {
        self.block_mut(key).grid = grid
    }


    pub fn refinement_ratio(&self, level: usize) -> i64 {
        self.levels[level].refinement_ratio
    }


    pub fn set_refinement_ratio(&mut self, level: usize, ratio: i64) {
        assert!(ratio >= 2, "refinement ratio must be at least 2, got {}", ratio);
        self.levels[level].refinement_ratio = ratio
    }


    /**
     * Return the number of ghost layers around blocks at the given level.
     * The coarsest level never has ghost layers.
     */
    pub fn ghost_layers(&self, level: usize) -> usize {
        if level == 0 {
            0
        } else {
            self.ghost_layers
        }
    }


    pub(crate) fn set_ghost_layers(&mut self, ghost_layers: usize) {
        self.ghost_layers = ghost_layers
    }


    /**
     * Return the box of a block's real (non-ghost) cells.
     */
    pub fn real_box(&self, key: BlockKey) -> AmrBox {
        self.meta(key).shrink(self.ghost_layers(key.level))
    }


    pub fn real_space(&self, key: BlockKey) -> IndexSpace {
        self.real_box(key).space
    }


    /**
     * Return the cell spacing at the given level.
     */
    pub fn level_spacing(&self, level: usize) -> [f64; 3] {
        let mut spacing = self.spacing;

        for l in 0..level {
            for axis in Axis::active(self.dimension) {
                spacing[axis.index()] /= self.refinement_ratio(l) as f64;
            }
        }
        spacing
    }


    /**
     * Return the product of the refinement ratios between two levels.
     */
    pub fn ratio_between(&self, coarse: usize, fine: usize) -> i64 {
        assert!(coarse <= fine);
        (coarse..fine).map(|l| self.refinement_ratio(l)).product()
    }


    /**
     * Express an index space given at level `from` in the index space of the
     * finer (or equal) level `to`.
     */
    pub fn refine_space(&self, space: &IndexSpace, from: usize, to: usize) -> IndexSpace {
        space.refine(self.ratio_between(from, to), self.dimension)
    }


    /**
     * Express an index space given at level `from` in the index space of the
     * coarser (or equal) level `to`.
     */
    pub fn coarsen_space(&self, space: &IndexSpace, from: usize, to: usize) -> IndexSpace {
        space.coarsen(self.ratio_between(to, from), self.dimension)
    }


    /**
     * Return the bounding box of the level-0 blocks, expressed at the given
     * level. Returns `None` if the hierarchy has no level-0 blocks.
     */
    pub fn whole_space(&self, level: usize) -> Option<IndexSpace> {
        let root = self.levels.first()?;
        let mut spaces = root.blocks.iter().map(|b| b.meta.space.clone());
        let first = spaces.next()?;

        let (start, end) = spaces.fold((first.start(), first.end()), |(s, e), space| {
            let (s1, e1) = (space.start(), space.end());
            ((s.0.min(s1.0), s.1.min(s1.1), s.2.min(s1.2)),
             (e.0.max(e1.0), e.1.max(e1.1), e.2.max(e1.2)))
        });
        let whole = IndexSpace::new(start.0..end.0, start.1..end.1, start.2..end.2);
        Some(self.refine_space(&whole, 0, level))
    }


    /**
     * Regenerate the visibility array of every grid present on this process.
     * A cell is hidden (0) when it is covered by the real extent of a block
     * at the next finer level, and visible (1) otherwise.
     */
    pub fn generate_visibility_arrays(&mut self) {
        for level in 0..self.levels.len() {
            let covered: Vec<IndexSpace> = if level + 1 < self.levels.len() {
                (0..self.num_blocks(level + 1))
                    .map(|index| self.real_box(BlockKey::new(level + 1, index)).space)
                    .map(|space| self.coarsen_space(&space, level + 1, level))
                    .collect()
            } else {
                Vec::new()
            };

            for index in 0..self.num_blocks(level) {
                let key = BlockKey::new(level, index);
                let space = self.meta(key).space.clone();

                if let Some(grid) = self.grid_mut(key) {
                    let visibility: Vec<u8> = space
                        .iter()
                        .map(|cell| if covered.iter().any(|c| c.contains(cell)) { 0 } else { 1 })
                        .collect();
                    let hidden = visibility.iter().filter(|&&v| v == 0).count();
                    debug!("block {:?}: {} of {} cells hidden", key, hidden, visibility.len());
                    grid.set_visibility(visibility);
                }
            }
        }
    }


    fn block(&self, key: BlockKey) -> &Block {
        &self.levels[key.level].blocks[key.index]
    }


    fn block_mut(&mut self, key: BlockKey) -> &mut Block {
        &mut self.levels[key.level].blocks[key.index]
    }
}
