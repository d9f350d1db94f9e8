use log::debug;
use serde::{Deserialize, Serialize};
use crate::hierarchy::{AmrHierarchy, BlockKey};




/**
 * How a neighbor block relates to the block whose ghost cells it may serve.
 * Neighbors are never finer than the block itself.
 */
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Relationship {
    /// A block on the same level.
    SameLevelSibling,
    /// A coarser block whose real region covers the block's real region.
    Parent,
    /// A coarser block which covers only part of the block's real region.
    PartiallyOverlappingParent,
    /// A coarser block which overlaps the ghost shell only.
    CoarseSibling,
}




#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Neighbor {
    pub key: BlockKey,
    pub owner: usize,
    pub relationship: Relationship,
}




#[derive(Clone, Debug, Default)]
struct Record {
    local: Vec<Neighbor>,
    remote: Vec<Neighbor>,
}




/**
 * Donor candidates for the ghost cells of every block in an extruded
 * hierarchy, computed from the box layout alone. A block C is a candidate
 * for block B when C is on the same or a coarser level, and C's real region,
 * refined to B's level, intersects B's ghosted region. Both lists are
 * ordered by level, finest (B's own level) first, then by block index.
 *
 * With a rank, candidates owned by that rank are local and the rest are
 * remote. Without one (a single process), every candidate whose grid is
 * present is local, whatever its owner id.
 */
#[derive(Clone, Debug)]
pub struct Connectivity {
    rank: Option<usize>,
    records: Vec<Vec<Record>>,
}




// ============================================================================
impl Connectivity {


    pub fn compute(hierarchy: &AmrHierarchy, rank: Option<usize>) -> Self {
        let records = (0..hierarchy.num_levels())
            .map(|level| {
                (0..hierarchy.num_blocks(level))
                    .map(|index| Self::record(hierarchy, BlockKey::new(level, index), rank))
                    .collect()
            })
            .collect();

        Self { rank, records }
    }


    /**
     * The rank this connectivity was computed for, or `None` in single
     * process mode.
     */
    pub fn rank(&self) -> Option<usize> {
        self.rank
    }


    /**
     * Whether the data of the given block is held by this process.
     */
    pub fn is_local(&self, hierarchy: &AmrHierarchy, key: BlockKey) -> bool {
        match self.rank {
            Some(rank) => hierarchy.meta(key).owner == rank,
            None => hierarchy.grid(key).is_some(),
        }
    }


    /**
     * Candidates owned by this rank.
     */
    pub fn local(&self, key: BlockKey) -> &[Neighbor] {
        &self.records[key.level][key.index].local
    }


    /**
     * Candidates owned by other ranks.
     */
    pub fn remote(&self, key: BlockKey) -> &[Neighbor] {
        &self.records[key.level][key.index].remote
    }


    fn record(hierarchy: &AmrHierarchy, key: BlockKey, rank: Option<usize>) -> Record {
        let ghosted = &hierarchy.meta(key).space;
        let real = hierarchy.real_space(key);
        let mut record = Record::default();

        for level in (0..=key.level).rev() {
            for index in 0..hierarchy.num_blocks(level) {
                let other = BlockKey::new(level, index);

                if other == key {
                    continue;
                }
                let other_real = hierarchy.real_space(other);
                let refined = hierarchy.refine_space(&other_real, level, key.level);

                if refined.intersect(ghosted).is_none() {
                    continue;
                }
                let relationship = if level == key.level {
                    Relationship::SameLevelSibling
                } else {
                    let coarsened = hierarchy.coarsen_space(&real, key.level, level);

                    if other_real.contains_space(&coarsened) {
                        Relationship::Parent
                    } else if other_real.intersect(&coarsened).is_some() {
                        Relationship::PartiallyOverlappingParent
                    } else {
                        Relationship::CoarseSibling
                    }
                };
                let owner = hierarchy.meta(other).owner;
                let neighbor = Neighbor { key: other, owner, relationship };
                let local = match rank {
                    Some(rank) => owner == rank,
                    None => hierarchy.grid(other).is_some(),
                };

                if local {
                    record.local.push(neighbor)
                } else {
                    record.remote.push(neighbor)
                }
            }
        }
        debug!("block {:?}: {} local and {} remote candidates", key, record.local.len(), record.remote.len());
        record
    }
}




// ============================================================================
#[cfg(test)]
mod test {

    use super::{Connectivity, Relationship};
    use crate::extrude::extrude;
    use crate::grid::UniformGrid;
    use crate::hierarchy::{AmrHierarchy, BlockKey};
    use crate::index_space::range2d;

    fn layout() -> AmrHierarchy {
        let mut h = AmrHierarchy::new(2, [0.0; 3], [1.0; 3]);
        h.add_level(2);
        h.add_level(2);
        h.add_block(0, range2d(0..4, 0..8), 0, None);
        h.add_block(0, range2d(4..8, 0..8), 1, None);
        h.add_block(1, range2d(2..8, 2..8), 0, None);
        h.add_block(1, range2d(8..12, 2..8), 1, None);
        h.add_block(1, range2d(2..6, 12..14), 1, None);
        extrude(&h, 1, None).unwrap()
    }

    #[test]
    fn candidates_are_classified() {
        let c = Connectivity::compute(&layout(), Some(0));
        let key = BlockKey::new(1, 0);

        let local: Vec<_> = c.local(key).iter().map(|n| (n.key, n.relationship)).collect();
        let remote: Vec<_> = c.remote(key).iter().map(|n| (n.key, n.relationship)).collect();

        assert_eq!(local, vec![(BlockKey::new(0, 0), Relationship::Parent)]);
        assert_eq!(remote, vec![
            (BlockKey::new(1, 1), Relationship::SameLevelSibling),
            (BlockKey::new(0, 1), Relationship::CoarseSibling),
        ]);
    }

    #[test]
    fn partially_overlapping_parents_are_detected() {
        let c = Connectivity::compute(&layout(), Some(1));
        let key = BlockKey::new(1, 1);
        let coarse: Vec<_> = c.local(key).iter().filter(|n| n.key.level == 0).map(|n| n.relationship).collect();
        assert_eq!(coarse, vec![Relationship::Parent]);

        let mut h = layout();
        let straddling = h.meta(BlockKey::new(1, 1)).clone();
        h.set_meta(BlockKey::new(1, 1), crate::amr_box::AmrBox { space: range2d(5..11, 1..9), ..straddling });
        let c = Connectivity::compute(&h, Some(1));
        let relationships: Vec<_> = c.remote(key).iter().chain(c.local(key)).map(|n| (n.key, n.relationship)).collect();
        assert!(relationships.contains(&(BlockKey::new(0, 0), Relationship::PartiallyOverlappingParent)));
        assert!(relationships.contains(&(BlockKey::new(0, 1), Relationship::PartiallyOverlappingParent)));
    }

    #[test]
    fn finer_blocks_are_never_candidates() {
        let h = layout();
        let c = Connectivity::compute(&h, Some(0));
        for key in h.keys() {
            for n in c.local(key).iter().chain(c.remote(key)) {
                assert!(n.key.level <= key.level);
                assert_ne!(n.key, key);
            }
        }
        assert!(c.local(BlockKey::new(0, 0)).is_empty());
        assert_eq!(c.remote(BlockKey::new(0, 0)).len(), 0);
    }

    #[test]
    fn distant_blocks_are_not_candidates() {
        let c = Connectivity::compute(&layout(), Some(1));
        let key = BlockKey::new(1, 2);
        assert!(c.local(key).iter().chain(c.remote(key)).all(|n| n.key.level == 0));
    }

    #[test]
    fn without_a_rank_blocks_with_grids_are_local() {
        let mut h = layout();
        let grid = UniformGrid::for_box(h.meta(BlockKey::new(1, 1)));
        h.set_grid(BlockKey::new(1, 1), Some(grid));
        let c = Connectivity::compute(&h, None);
        let key = BlockKey::new(1, 0);

        assert_eq!(c.rank(), None);
        assert!(c.is_local(&h, BlockKey::new(1, 1)));
        assert!(!c.is_local(&h, BlockKey::new(0, 0)));
        assert_eq!(c.local(key).iter().map(|n| n.key).collect::<Vec<_>>(), vec![BlockKey::new(1, 1)]);
        assert_eq!(c.remote(key).len(), 2);
    }
}
