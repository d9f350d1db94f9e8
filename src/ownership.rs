use std::collections::HashMap;
use crate::hierarchy::{AmrHierarchy, BlockKey};
use crate::index_space::IndexSpace;




type Node = (i64, i64, i64);




/**
 * Assigns each grid node on the boundary of a block's real region to exactly
 * one block. Nodes are expressed in the node index space of the finest level,
 * so a node shared by blocks on different levels has a single identity.
 *
 * Levels are visited coarse to fine and the blocks of a level in ascending
 * index order; each block claims the nodes of its boundary which have not
 * been claimed already. Ownership is a function of the box layout alone, so
 * every process computes the same marking.
 */
#[derive(Clone, Debug, Default)]
pub struct PointOwnership {
    owners: HashMap<Node, BlockKey>,
    counts: HashMap<Node, usize>,
}




// ============================================================================
impl PointOwnership {


    pub fn mark(hierarchy: &AmrHierarchy) -> Self {
        let mut result = Self::default();

        if hierarchy.num_levels() == 0 {
            return result;
        }
        let finest = hierarchy.num_levels() - 1;

        for key in hierarchy.keys() {
            let real = hierarchy.real_space(key);
            let space = hierarchy.refine_space(&real, key.level, finest);

            for node in boundary_nodes(&space, hierarchy.dimension()) {
                result.owners.entry(node).or_insert(key);
                *result.counts.entry(node).or_insert(0) += 1;
            }
        }
        result
    }


    /**
     * The block which owns the given node, if it is on any block boundary.
     */
    pub fn owner(&self, node: Node) -> Option<BlockKey> {
        self.owners.get(&node).copied()
    }


    pub fn is_owner(&self, key: BlockKey, node: Node) -> bool {
        self.owner(node) == Some(key)
    }


    /**
     * Nodes which lie on the boundary of two or more blocks, sorted.
     */
    pub fn shared_points(&self) -> Vec<Node> {
        let mut nodes: Vec<_> = self.counts.iter().filter(|&(_, &n)| n > 1).map(|(&node, _)| node).collect();
        nodes.sort_unstable();
        nodes
    }


    /**
     * Nodes owned by the given block, sorted.
     */
    pub fn claimed_by(&self, key: BlockKey) -> Vec<Node> {
        let mut nodes: Vec<_> = self.owners.iter().filter(|&(_, &k)| k == key).map(|(&node, _)| node).collect();
        nodes.sort_unstable();
        nodes
    }
}




/**
 * The nodes on the surface of a box of cells. A box of `n` cells along an
 * active axis has `n + 1` nodes along it; 2D boxes have a single node layer.
 */
fn boundary_nodes(space: &IndexSpace, dimension: usize) -> Vec<Node> {
    let (i0, j0, k0) = space.start();
    let (i1, j1, k1) = space.end();
    let k1 = if dimension == 3 { k1 } else { k0 };
    let mut nodes = Vec::new();

    for i in i0..=i1 {
        for j in j0..=j1 {
            if i == i0 || i == i1 || j == j0 || j == j1 {
                nodes.extend((k0..=k1).map(|k| (i, j, k)))
            } else if dimension == 3 {
                nodes.push((i, j, k0));
                nodes.push((i, j, k1));
            }
        }
    }
    nodes
}




// ============================================================================
#[cfg(test)]
mod test {

    use super::{boundary_nodes, PointOwnership};
    use crate::hierarchy::{AmrHierarchy, BlockKey};
    use crate::index_space::{range2d, range3d};

    fn siblings() -> AmrHierarchy {
        let mut h = AmrHierarchy::new(2, [0.0; 3], [1.0; 3]);
        h.add_level(2);
        h.add_block(0, range2d(4..8, 0..4), 1, None);
        h.add_block(0, range2d(0..4, 0..4), 0, None);
        h
    }

    #[test]
    fn boundary_node_counts() {
        assert_eq!(boundary_nodes(&range2d(0..4, 0..3), 2).len(), 14);
        assert_eq!(boundary_nodes(&range3d(0..2, 0..2, 0..2), 3).len(), 26);
    }

    #[test]
    fn shared_face_has_exactly_one_owner() {
        let ownership = PointOwnership::mark(&siblings());
        let shared = ownership.shared_points();

        assert_eq!(shared, (0..=4).map(|j| (4, j, 0)).collect::<Vec<_>>());
        for node in shared {
            assert!(ownership.is_owner(BlockKey::new(0, 0), node));
            assert!(!ownership.is_owner(BlockKey::new(0, 1), node));
        }
        assert_eq!(ownership.claimed_by(BlockKey::new(0, 0)).len(), 16);
        assert_eq!(ownership.claimed_by(BlockKey::new(0, 1)).len(), 11);
    }

    #[test]
    fn coarser_blocks_claim_first() {
        let mut h = siblings();
        h.add_level(2);
        h.add_block(1, range2d(4..8, 0..4), 0, None);
        let ownership = PointOwnership::mark(&h);

        // The fine block's right face lies on the face shared by the coarse blocks.
        assert_eq!(ownership.owner((8, 2, 0)), Some(BlockKey::new(0, 0)));
        assert_eq!(ownership.owner((8, 0, 0)), Some(BlockKey::new(0, 0)));
        assert_eq!(ownership.owner((6, 4, 0)), Some(BlockKey::new(1, 0)));
        assert_eq!(ownership.owner((0, 1, 0)), Some(BlockKey::new(0, 1)));
        assert_eq!(ownership.owner((0, 0, 7)), None);
    }
}
