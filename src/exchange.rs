use std::cmp::Reverse;
use std::collections::HashSet;
use std::ops::Add;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use crate::connectivity::{Connectivity, Neighbor};
use crate::error::Error;
use crate::grid::{ArrayBuffer, UniformGrid, GHOST_ARRAY, GHOST_CELL, REAL_CELL};
use crate::hierarchy::{AmrHierarchy, BlockKey};
use crate::message::Controller;
use crate::ownership::PointOwnership;




/**
 * A real cell which supplies data to a ghost cell. `cell` is the linear
 * index of the cell in the donor block's (extruded) grid.
 */
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Donor {
    pub block: BlockKey,
    pub cell: usize,
}

impl Donor {
    pub fn level(&self) -> usize {
        self.block.level
    }

    /**
     * Donor preference: the finest level wins, then the lowest block index.
     */
    fn precedence(&self) -> (usize, Reverse<usize>) {
        (self.block.level, Reverse(self.block.index))
    }
}




/**
 * A ghost cell of a local block, waiting for a donor.
 */
#[derive(Clone, Debug, PartialEq)]
pub struct Receiver {
    pub block: BlockKey,
    pub cell: usize,
    pub centroid: [f64; 3],
    pub donor: Option<Donor>,
}




/**
 * Resolution counts for one exchange pass. Unresolved receivers keep their
 * zero value; `unresolved_outside_domain` counts those whose centroid is
 * outside the whole domain, which is expected along the outer boundary.
 */
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExchangeReport {
    pub receivers: usize,
    pub resolved_local: usize,
    pub resolved_remote: usize,
    pub unresolved: usize,
    pub unresolved_outside_domain: usize,
}

impl Add for ExchangeReport {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Self {
            receivers: self.receivers + other.receivers,
            resolved_local: self.resolved_local + other.resolved_local,
            resolved_remote: self.resolved_remote + other.resolved_remote,
            unresolved: self.unresolved + other.unresolved,
            unresolved_outside_domain: self.unresolved_outside_domain + other.unresolved_outside_domain,
        }
    }
}

impl ExchangeReport {

    /**
     * Sum the reports of all ranks. Must be called on every rank.
     */
    pub fn global(&self, controller: &mut Controller) -> Result<Self, Error> {
        controller.all_reduce(*self, |a, b| a + b)
    }

    fn tally(hierarchy: &AmrHierarchy, connectivity: &Connectivity, receivers: &[Receiver]) -> Self {
        let mut report = Self { receivers: receivers.len(), ..Self::default() };

        for r in receivers {
            match r.donor {
                Some(donor) if connectivity.is_local(hierarchy, donor.block) => report.resolved_local += 1,
                Some(_) => report.resolved_remote += 1,
                None => {
                    report.unresolved += 1;
                    let index = hierarchy.meta(r.block).locate(r.centroid);
                    let inside = hierarchy.whole_space(r.block.level).map_or(false, |w| w.contains(index));
                    report.unresolved_outside_domain += !inside as usize;
                }
            }
        }
        report
    }
}




/**
 * The result of a ghost exchange: the hierarchy with its ghost cells filled,
 * the resolution counts for this process, and the owner of every shared
 * boundary node. Ownership is computed from the box layout, so it is the
 * same on every process.
 */
#[derive(Clone, Debug)]
pub struct Exchanged {
    pub hierarchy: AmrHierarchy,
    pub report: ExchangeReport,
    pub ownership: PointOwnership,
}




#[derive(Debug, Serialize, Deserialize)]
struct PointQuery {
    receiver: usize,
    level: usize,
    point: [f64; 3],
    candidates: Vec<BlockKey>,
}

#[derive(Debug, Serialize, Deserialize)]
struct PointReply {
    receiver: usize,
    donor: Option<Donor>,
}

#[derive(Debug, Serialize, Deserialize)]
struct FieldRequest {
    receiver: usize,
    donor: Donor,
}

#[derive(Debug, Serialize, Deserialize)]
struct FieldReply {
    receiver: usize,
    values: Vec<(String, ArrayBuffer)>,
}




/**
 * Fill the ghost cells of every local block of an extruded hierarchy with
 * data from the real cell that contains each ghost cell's centroid.
 *
 * Donors are searched on the receiver's own level first, then on coarser
 * levels; finer levels are never used. Candidates on this process are
 * searched directly. When a controller is given, candidates on other
 * processes are queried through it, and a receiver whose point lies in a
 * remote block on a finer level than any local hit takes the remote donor.
 * Without a controller, only local candidates are considered; the
 * connectivity should then be computed without a rank, so that every block
 * with a grid is local.
 *
 * Every rank of the controller's group must call this function.
 */
pub fn exchange(
    mut hierarchy: AmrHierarchy,
    connectivity: &Connectivity,
    mut controller: Option<&mut Controller>) -> Result<Exchanged, Error>
{
    let rank = controller.as_deref().map_or(0, Controller::rank);

    if controller.is_some() && connectivity.rank() != Some(rank) {
        return Err(Error::ProtocolMismatch(format!(
            "connectivity is for rank {:?} but the controller is rank {}", connectivity.rank(), rank)));
    }

    let mut receivers = extract_receivers(&hierarchy);
    let deferred = resolve_local(&hierarchy, connectivity, &mut receivers, controller.is_some());
    debug!("rank {}: {} receivers deferred to remote resolution", rank, deferred);

    if let Some(controller) = controller.as_deref_mut() {
        resolve_remote(&hierarchy, connectivity, &mut receivers, controller)?;
    }
    let report = ExchangeReport::tally(&hierarchy, connectivity, &receivers);

    transfer_local(&mut hierarchy, connectivity, &receivers, rank);

    if let Some(controller) = controller.as_deref_mut() {
        transfer_remote(&mut hierarchy, connectivity, &receivers, controller)?;
        controller.barrier()?;
    }
    info!("rank {}: {:?}", rank, report);

    let ownership = PointOwnership::mark(&hierarchy);
    debug!("rank {}: {} shared boundary nodes", rank, ownership.shared_points().len());

    Ok(Exchanged { hierarchy, report, ownership })
}




// ============================================================================
fn extract_receivers(hierarchy: &AmrHierarchy) -> Vec<Receiver> {
    let mut receivers = Vec::new();

    for (key, _, grid) in hierarchy.blocks() {
        let grid = match grid {
            Some(grid) => grid,
            None => continue,
        };
        let flags = match grid.ghost_flags() {
            Some(flags) => flags,
            None => {
                warn!("block {:?} has no {} array and is skipped", key, GHOST_ARRAY);
                continue;
            }
        };
        for (cell, _) in flags.iter().enumerate().filter(|&(_, &f)| f == GHOST_CELL) {
            receivers.push(Receiver {
                block: key,
                cell,
                centroid: grid.cell_centroid(cell),
                donor: None,
            })
        }
    }
    receivers
}




/**
 * Return the donor cell of the given candidate for a point, if the point is
 * in the candidate's real region and the candidate's grid is present.
 */
fn locate_in(hierarchy: &AmrHierarchy, key: BlockKey, point: [f64; 3]) -> Option<Donor> {
    hierarchy.grid(key)?;
    let real = hierarchy.real_box(key);
    let index = real.locate(point);

    if real.space.contains(index) {
        let cell = hierarchy.meta(key).space.row_major_offset(index);
        Some(Donor { block: key, cell })
    } else {
        None
    }
}




/**
 * Search the local candidates, finest level first. With `guard` set, the
 * search stops (returning `Err(level)`) at the first level where a remote
 * candidate contains the point, before any coarser local candidate can be
 * accepted.
 */
fn search_local(
    hierarchy: &AmrHierarchy,
    connectivity: &Connectivity,
    receiver: &Receiver,
    guard: bool) -> Result<Option<Donor>, usize>
{
    let local = connectivity.local(receiver.block);
    let remote = connectivity.remote(receiver.block);

    for level in (0..=receiver.block.level).rev() {
        let at_level = |n: &&Neighbor| n.key.level == level;

        if let Some(donor) = local.iter().filter(at_level).find_map(|n| locate_in(hierarchy, n.key, receiver.centroid)) {
            return Ok(Some(donor));
        }
        if guard && remote.iter().filter(at_level).any(|n| hierarchy.real_box(n.key).contains_point(receiver.centroid)) {
            return Err(level);
        }
    }
    Ok(None)
}




/**
 * Resolve receivers against local candidates. Returns the number of
 * receivers deferred by the level precedence guard. Receivers which already
 * have a donor are skipped.
 */
fn resolve_local(
    hierarchy: &AmrHierarchy,
    connectivity: &Connectivity,
    receivers: &mut [Receiver],
    guard: bool) -> usize
{
    let mut deferred = 0;

    for receiver in receivers.iter_mut().filter(|r| r.donor.is_none()) {
        match search_local(hierarchy, connectivity, receiver, guard) {
            Ok(donor) => receiver.donor = donor,
            Err(_) => deferred += 1,
        }
    }
    deferred
}




/**
 * Resolve the remaining receivers by querying the owners of their remote
 * candidates. Each reply is weighed against the best local candidate, which
 * may be on a coarser level. One all-to-all round carries the queries and
 * another the replies.
 */
fn resolve_remote(
    hierarchy: &AmrHierarchy,
    connectivity: &Connectivity,
    receivers: &mut [Receiver],
    controller: &mut Controller) -> Result<(), Error>
{
    let mut fallback: Vec<Option<Donor>> = vec![None; receivers.len()];
    let mut queries: Vec<Vec<PointQuery>> = (0..controller.size()).map(|_| Vec::new()).collect();

    for (n, receiver) in receivers.iter().enumerate().filter(|(_, r)| r.donor.is_none()) {
        let local = search_local(hierarchy, connectivity, receiver, false).unwrap_or(None);
        let floor = local.map_or(0, |d| d.level());
        fallback[n] = local;

        for peer in 0..controller.size() {
            let candidates: Vec<_> = connectivity
                .remote(receiver.block)
                .iter()
                .filter(|c| c.owner == peer && c.key.level >= floor)
                .map(|c| c.key)
                .collect();

            if !candidates.is_empty() {
                queries[peer].push(PointQuery {
                    receiver: n,
                    level: receiver.block.level,
                    point: receiver.centroid,
                    candidates,
                })
            }
        }
    }

    let incoming = controller.all_to_all(queries)?;
    let rank = controller.rank();
    let replies = incoming
        .into_iter()
        .map(|batch| batch.into_iter().map(|q| serve_point_query(hierarchy, rank, q)).collect::<Result<Vec<_>, _>>())
        .collect::<Result<Vec<Vec<_>>, _>>()?;

    let mut best = fallback;

    for reply in controller.all_to_all(replies)?.into_iter().flatten() {
        let slot = best.get_mut(reply.receiver).ok_or_else(|| {
            Error::ProtocolMismatch(format!("reply for unknown receiver {}", reply.receiver))
        })?;
        if let Some(donor) = reply.donor {
            if slot.map_or(true, |current| donor.precedence() > current.precedence()) {
                *slot = Some(donor)
            }
        }
    }
    for (receiver, donor) in receivers.iter_mut().zip(best) {
        if receiver.donor.is_none() {
            receiver.donor = donor
        }
    }
    Ok(())
}




fn serve_point_query(hierarchy: &AmrHierarchy, rank: usize, query: PointQuery) -> Result<PointReply, Error> {
    for &key in &query.candidates {
        if key.level > query.level || hierarchy.meta(key).owner != rank {
            return Err(Error::ProtocolMismatch(format!("rank {} cannot serve candidate {:?}", rank, key)));
        }
    }
    let donor = query
        .candidates
        .iter()
        .filter_map(|&key| locate_in(hierarchy, key, query.point))
        .find(|donor| is_real(hierarchy, donor));

    Ok(PointReply { receiver: query.receiver, donor })
}

fn is_real(hierarchy: &AmrHierarchy, donor: &Donor) -> bool {
    hierarchy
        .grid(donor.block)
        .and_then(UniformGrid::ghost_flags)
        .map_or(false, |flags| flags[donor.cell] == REAL_CELL)
}




/**
 * The values of every cell array but `GHOST` at one cell.
 */
fn tuple_values(grid: &UniformGrid, cell: usize) -> Vec<(String, ArrayBuffer)> {
    grid.cell_data()
        .iter()
        .filter(|a| a.name() != GHOST_ARRAY)
        .map(|a| (a.name().to_string(), a.tuple(cell)))
        .collect()
}

fn write_values(
    hierarchy: &mut AmrHierarchy,
    receiver: &Receiver,
    values: &[(String, ArrayBuffer)],
    warned: &mut HashSet<(BlockKey, String)>)
{
    let grid = match hierarchy.grid_mut(receiver.block) {
        Some(grid) => grid,
        None => return,
    };
    for array in grid.cell_data_mut().iter_mut().filter(|a| a.name() != GHOST_ARRAY) {
        let written = values
            .iter()
            .find(|(name, _)| name == array.name())
            .map_or(false, |(_, tuple)| array.set_tuple(receiver.cell, tuple));

        if !written && warned.insert((receiver.block, array.name().to_string())) {
            warn!("block {:?}: array {} has no matching donor array", receiver.block, array.name());
        }
    }
}

fn transfer_local(hierarchy: &mut AmrHierarchy, connectivity: &Connectivity, receivers: &[Receiver], rank: usize) {
    let updates: Vec<_> = receivers
        .iter()
        .filter_map(|r| r.donor.map(|d| (r, d)))
        .filter(|(_, d)| connectivity.is_local(hierarchy, d.block))
        .filter_map(|(r, d)| hierarchy.grid(d.block).map(|grid| (r, tuple_values(grid, d.cell))))
        .collect();

    let mut warned = HashSet::new();

    for (receiver, values) in &updates {
        write_values(hierarchy, receiver, values, &mut warned)
    }
    debug!("rank {}: {} ghost cells filled from local donors", rank, updates.len());
}

fn transfer_remote(
    hierarchy: &mut AmrHierarchy,
    connectivity: &Connectivity,
    receivers: &[Receiver],
    controller: &mut Controller) -> Result<(), Error>
{
    let rank = controller.rank();
    let mut requests: Vec<Vec<FieldRequest>> = (0..controller.size()).map(|_| Vec::new()).collect();

    for (n, receiver) in receivers.iter().enumerate() {
        if let Some(donor) = receiver.donor {
            if !connectivity.is_local(hierarchy, donor.block) {
                let owner = hierarchy.meta(donor.block).owner;
                let batch = requests.get_mut(owner).ok_or(Error::UnexpectedPeer(owner))?;
                batch.push(FieldRequest { receiver: n, donor })
            }
        }
    }

    let incoming = controller.all_to_all(requests)?;
    let mut replies = Vec::with_capacity(incoming.len());

    for batch in incoming {
        let mut served = Vec::with_capacity(batch.len());

        for request in batch {
            let grid = hierarchy.grid(request.donor.block).ok_or_else(|| {
                Error::ProtocolMismatch(format!("rank {} does not hold block {:?}", rank, request.donor.block))
            })?;
            served.push(FieldReply {
                receiver: request.receiver,
                values: tuple_values(grid, request.donor.cell),
            })
        }
        replies.push(served)
    }

    let mut warned = HashSet::new();
    let mut filled = 0;

    for reply in controller.all_to_all(replies)?.into_iter().flatten() {
        let receiver = receivers.get(reply.receiver).ok_or_else(|| {
            Error::ProtocolMismatch(format!("field reply for unknown receiver {}", reply.receiver))
        })?;
        write_values(hierarchy, receiver, &reply.values, &mut warned);
        filled += 1;
    }
    debug!("rank {}: {} ghost cells filled from remote donors", rank, filled);
    Ok(())
}




// ============================================================================
#[cfg(test)]
mod test {

    use super::{exchange, extract_receivers, resolve_local, ExchangeReport};
    use crate::connectivity::Connectivity;
    use crate::extrude::extrude;
    use crate::grid::UniformGrid;
    use crate::hierarchy::{AmrHierarchy, BlockKey};
    use crate::index_space::range2d;
    use crate::message::{ChannelCommunicator, Controller};

    /**
     * A value which identifies the level and global index of a cell.
     */
    fn value(level: usize, (i, j, _): (i64, i64, i64)) -> f64 {
        (level * 10000) as f64 + (i * 100 + j) as f64
    }

    /**
     * Level 0 covers 0..8 x 0..8 in two blocks. Level 1 has two blocks
     * sharing the face i = 8, and a third block touching the domain
     * boundary. Level 2 has one block straddling the shared face. Block
     * owners are given by `owners`, and grids are present only on `rank`
     * (or everywhere, if `rank` is `None`).
     */
    fn layout(owners: [usize; 6], rank: Option<usize>) -> AmrHierarchy {
        let mut h = AmrHierarchy::new(2, [0.0; 3], [1.0; 3]);
        h.add_level(2);
        h.add_level(2);
        h.add_level(2);

        let boxes = [
            (0, range2d(0..4, 0..8)),
            (0, range2d(4..8, 0..8)),
            (1, range2d(4..8, 4..10)),
            (1, range2d(8..12, 4..10)),
            (1, range2d(0..4, 12..16)),
            (2, range2d(14..18, 16..20)),
        ];
        for ((level, space), owner) in boxes.into_iter().zip(owners) {
            let meta = h.new_box(level, space, owner);
            let grid = if rank.map_or(true, |r| r == owner) {
                Some(UniformGrid::from_function(&meta, "rho", 1, |index| vec![value(level, index)]))
            } else {
                None
            };
            h.push_block(meta, grid);
        }
        h
    }

    fn single_process(owners: [usize; 6]) -> AmrHierarchy {
        let input = extrude(&layout(owners, None), 1, None).unwrap();
        let connectivity = Connectivity::compute(&input, None);
        exchange(input, &connectivity, None).unwrap().hierarchy
    }

    fn rho(h: &AmrHierarchy, key: BlockKey, index: (i64, i64, i64)) -> f64 {
        let n = h.meta(key).space.row_major_offset(index);
        h.grid(key).unwrap().cell_data().get("rho").unwrap().as_f64().unwrap()[n]
    }

    #[test]
    fn shared_face_ghosts_take_neighbor_values() {
        let h = single_process([0; 6]);
        let left = BlockKey::new(1, 0);
        let right = BlockKey::new(1, 1);

        for j in 4..10 {
            assert_eq!(rho(&h, left, (8, j, 0)), value(1, (8, j, 0)));
            assert_eq!(rho(&h, right, (7, j, 0)), value(1, (7, j, 0)));
        }
    }

    #[test]
    fn shared_face_values_do_not_depend_on_owner_ids() {
        let h = single_process([3, 1, 2, 1, 0, 2]);
        let left = BlockKey::new(1, 0);
        let right = BlockKey::new(1, 1);

        for j in 4..10 {
            assert_eq!(rho(&h, left, (8, j, 0)), value(1, (8, j, 0)));
            assert_eq!(rho(&h, right, (7, j, 0)), value(1, (7, j, 0)));
        }
        assert_eq!(rho(&h, left, (3, 3, 0)), value(0, (1, 1, 0)));
        assert_eq!(rho(&h, BlockKey::new(2, 0), (13, 16, 0)), value(1, (6, 8, 0)));
    }

    #[test]
    fn blocks_without_grids_are_not_donors() {
        let mut h = AmrHierarchy::new(2, [0.0; 3], [1.0; 3]);
        h.add_level(2);
        h.add_level(2);
        h.add_block(0, range2d(0..8, 0..8), 0, None);

        for (space, owner) in [(range2d(4..8, 4..12), 0), (range2d(8..12, 4..12), 1)] {
            let meta = h.new_box(1, space, owner);
            let grid = UniformGrid::from_function(&meta, "rho", 1, |index| vec![value(1, index)]);
            h.push_block(meta, Some(grid));
        }
        let input = extrude(&h, 1, None).unwrap();
        let connectivity = Connectivity::compute(&input, None);
        let result = exchange(input, &connectivity, None).unwrap();
        let h = result.hierarchy;
        let left = BlockKey::new(1, 0);

        assert_eq!(rho(&h, left, (8, 5, 0)), value(1, (8, 5, 0)));
        assert_eq!(rho(&h, left, (3, 5, 0)), 0.0);

        let filled: usize = [left, BlockKey::new(1, 1)]
            .iter()
            .map(|&key| {
                let flags = h.grid(key).unwrap().ghost_flags().unwrap().to_vec();
                h.meta(key)
                    .space
                    .iter()
                    .enumerate()
                    .filter(|&(n, index)| flags[n] == 0 && rho(&h, key, index) != 0.0)
                    .count()
            })
            .sum();

        assert_eq!(result.report.resolved_local, filled);
        assert_eq!(result.report.resolved_local, 2 * 8);
        assert_eq!(result.report.unresolved, result.report.receivers - filled);
        assert_eq!(result.report.unresolved_outside_domain, 0);
    }

    #[test]
    fn same_level_donors_take_precedence() {
        let input = extrude(&layout([0; 6], None), 1, None).unwrap();
        let connectivity = Connectivity::compute(&input, None);
        let mut receivers = extract_receivers(&input);
        resolve_local(&input, &connectivity, &mut receivers, false);

        let face = receivers
            .iter()
            .find(|r| r.block == BlockKey::new(1, 0) && input.meta(r.block).space.index_at(r.cell) == (8, 6, 0))
            .unwrap();
        assert_eq!(face.donor.unwrap().block, BlockKey::new(1, 1));

        let corner = receivers
            .iter()
            .find(|r| r.block == BlockKey::new(1, 0) && input.meta(r.block).space.index_at(r.cell) == (3, 3, 0))
            .unwrap();
        assert_eq!(corner.donor.unwrap().block, BlockKey::new(0, 0));
    }

    #[test]
    fn donors_are_never_finer_than_receivers() {
        let input = extrude(&layout([0; 6], None), 1, None).unwrap();
        let connectivity = Connectivity::compute(&input, None);
        let mut receivers = extract_receivers(&input);
        resolve_local(&input, &connectivity, &mut receivers, false);

        for r in &receivers {
            if let Some(donor) = r.donor {
                assert!(donor.level() <= r.block.level);
            }
        }
        // The level-2 block covers these ghost cells of block 1.0, but they
        // are filled from level 1.
        let h = single_process([0; 6]);
        assert_eq!(rho(&h, BlockKey::new(1, 0), (8, 9, 0)), value(1, (8, 9, 0)));
    }

    #[test]
    fn without_a_controller_every_resolvable_receiver_is_local() {
        let input = extrude(&layout([0; 6], None), 1, None).unwrap();
        let connectivity = Connectivity::compute(&input, None);
        let report = exchange(input, &connectivity, None).unwrap().report;

        assert_eq!(report.resolved_remote, 0);
        assert_eq!(report.resolved_local + report.unresolved, report.receivers);
        assert_eq!(report.unresolved, report.unresolved_outside_domain);
        assert!(report.unresolved > 0);
    }

    #[test]
    fn ghosts_outside_the_domain_keep_zero() {
        let h = single_process([0; 6]);
        let key = BlockKey::new(1, 2);
        assert_eq!(rho(&h, key, (-1, 12, 0)), 0.0);
        assert_eq!(rho(&h, key, (4, 13, 0)), value(0, (2, 6, 0)));
        assert_eq!(rho(&h, key, (2, 11, 0)), value(0, (1, 5, 0)));
    }

    #[test]
    fn local_resolution_is_idempotent() {
        let input = extrude(&layout([0; 6], None), 1, None).unwrap();
        let connectivity = Connectivity::compute(&input, None);
        let mut receivers = extract_receivers(&input);
        resolve_local(&input, &connectivity, &mut receivers, false);
        let first = receivers.clone();
        resolve_local(&input, &connectivity, &mut receivers, false);
        assert_eq!(receivers, first);
    }

    #[test]
    fn real_cells_are_not_touched() {
        let input = extrude(&layout([0; 6], None), 1, None).unwrap();
        let h = single_process([0; 6]);

        for key in h.keys() {
            let flags = h.grid(key).unwrap().ghost_flags().unwrap().to_vec();
            for (n, index) in h.meta(key).space.iter().enumerate() {
                if flags[n] == 1 {
                    assert_eq!(rho(&h, key, index), rho(&input, key, index));
                }
            }
        }
    }

    #[test]
    fn multi_rank_exchange_matches_single_process() {
        let owners = [0, 1, 2, 1, 0, 2];
        let expected = single_process(owners);

        let handles: Vec<_> = ChannelCommunicator::group(3)
            .into_iter()
            .map(|comm| {
                std::thread::spawn(move || {
                    let mut controller = Controller::new(comm);
                    let rank = controller.rank();
                    let input = extrude(&layout(owners, Some(rank)), 1, Some(&mut controller)).unwrap();
                    let connectivity = Connectivity::compute(&input, Some(rank));
                    let result = exchange(input, &connectivity, Some(&mut controller)).unwrap();
                    let global = result.report.global(&mut controller).unwrap();
                    (result.hierarchy, result.report, global)
                })
            })
            .collect();

        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let total = results.iter().fold(ExchangeReport::default(), |acc, (_, report, _)| acc + *report);

        for (h, _, global) in &results {
            assert_eq!(*global, total);
            for (key, _, grid) in h.blocks() {
                if let Some(grid) = grid {
                    assert_eq!(Some(grid), expected.grid(key));
                }
            }
        }
        assert!(total.resolved_remote > 0);
    }
}
