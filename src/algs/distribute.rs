// src/algs/distribute.rs

//! Scatter a global field to its block owners, and gather it back.
//!
//! One rank holds the [`Coordinator`] capability: it owns the global field
//! from load time to save time together with the [`PartitionMap`] that says
//! which rectangle belongs to which mesh coordinate. Every other rank takes
//! the [`Role::Participant`] role and only knows who the coordinator is.
//!
//! Blocks always travel with padding 0. The coordinator keeps its own block
//! locally and never sends it to itself.

use crate::algs::communicator::{ChannelKey, Communicator, Wait};
use crate::algs::partition::PartitionMap;
use crate::algs::wire::{WireGridHeader, WireSample, cast_slice, decode_samples, encode_samples};
use crate::data::grid::GridBuffer;
use crate::heat_error::HeatSimError;
use crate::topology::cart::CartTopology;

/// The global field plus its decomposition, held by exactly one rank.
#[derive(Debug, Clone)]
pub struct Coordinator {
    rank: usize,
    map: PartitionMap,
    global: GridBuffer,
}

impl Coordinator {
    /// Take ownership of `global` and split it over a `dims` mesh.
    pub fn new(rank: usize, global: GridBuffer, dims: [usize; 2]) -> Result<Self, HeatSimError> {
        let global = if global.padding() == 0 {
            global
        } else {
            global.with_padding(0)?
        };
        let map = PartitionMap::new(global.width(), global.height(), dims[0], dims[1])?;
        Ok(Self { rank, map, global })
    }

    pub fn rank(&self) -> usize {
        self.rank
    }

    pub fn map(&self) -> &PartitionMap {
        &self.map
    }

    /// Current contents of the global field.
    pub fn global(&self) -> &GridBuffer {
        &self.global
    }

    pub fn into_global(self) -> GridBuffer {
        self.global
    }
}

/// What this rank does during scatter and gather.
pub enum Role<'a> {
    Coordinator(&'a mut Coordinator),
    Participant { coordinator: usize },
}

impl Role<'_> {
    /// Rank holding the global field.
    pub fn coordinator_rank(&self) -> usize {
        match self {
            Role::Coordinator(c) => c.rank,
            Role::Participant { coordinator } => *coordinator,
        }
    }
}

fn check_layout(map: &PartitionMap, topo: &CartTopology) -> Result<(), HeatSimError> {
    if map.dims() != topo.dims() {
        let [dimx, dimy] = map.dims();
        return Err(HeatSimError::MeshSizeMismatch {
            dimx,
            dimy,
            procs: topo.size(),
        });
    }
    Ok(())
}

/// Hand every rank its block of the global field.
///
/// Returns this rank's block (padding 0). A participant returns only once
/// the whole payload has arrived.
pub fn scatter_field<C>(comm: &C, topo: &CartTopology, role: Role<'_>) -> Result<GridBuffer, HeatSimError>
where
    C: Communicator,
{
    match role {
        Role::Coordinator(coord) => scatter_from_coordinator(comm, topo, coord),
        Role::Participant { coordinator } => receive_block(comm, coordinator),
    }
}

fn scatter_from_coordinator<C: Communicator>(
    comm: &C,
    topo: &CartTopology,
    coord: &Coordinator,
) -> Result<GridBuffer, HeatSimError> {
    check_layout(&coord.map, topo)?;
    let me = comm.rank();

    // 1) cut every block before anything goes on the wire
    let mut outgoing = Vec::with_capacity(topo.size());
    for peer in (0..topo.size()).filter(|&r| r != me) {
        let ext = coord.map.try_block(topo.coords_of(peer)?)?;
        let block = coord.global.extract(ext.x, ext.y, ext.width, ext.height)?;
        let hdr = WireGridHeader::new(block.width(), block.height(), block.padding())?;
        log::debug!(
            "[rank {me}] scatter block {}x{} at ({}, {}) to rank {peer}",
            ext.width,
            ext.height,
            ext.x,
            ext.y
        );
        outgoing.push((peer, hdr, encode_samples(block.as_slice())));
    }
    // our own block never goes on the wire
    let ext = coord.map.try_block(topo.coords_of(me)?)?;
    let own = coord.global.extract(ext.x, ext.y, ext.width, ext.height)?;

    // 2) post all sends; buffers in `outgoing` outlive the handles
    let mut pending_sends = Vec::with_capacity(2 * outgoing.len());
    for (peer, hdr, payload) in &outgoing {
        pending_sends.push(comm.isend(
            *peer,
            ChannelKey::SCATTER_HEADER.tag(),
            cast_slice(std::slice::from_ref(hdr)),
        ));
        pending_sends.push(comm.isend(*peer, ChannelKey::SCATTER_PAYLOAD.tag(), payload));
    }

    // 3) always drain all send handles before returning
    for send in pending_sends {
        let _ = send.wait();
    }
    log::info!("[rank {me}] scattered {} blocks", outgoing.len());
    Ok(own)
}

fn receive_block<C: Communicator>(comm: &C, coordinator: usize) -> Result<GridBuffer, HeatSimError> {
    let hdr_raw = comm
        .irecv(coordinator, ChannelKey::SCATTER_HEADER.tag(), WireGridHeader::SIZE)
        .wait()
        .ok_or_else(|| HeatSimError::comm(coordinator, "missing block header"))?;
    let hdr = WireGridHeader::decode(&hdr_raw, coordinator)?;
    let n = hdr.payload_samples(coordinator)?;
    let raw = comm
        .irecv(coordinator, ChannelKey::SCATTER_PAYLOAD.tag(), n * WireSample::SIZE)
        .wait()
        .ok_or_else(|| HeatSimError::comm(coordinator, "missing block payload"))?;
    let samples = decode_samples(&raw, n, coordinator)?;
    log::debug!(
        "[rank {}] received block {}x{} from rank {coordinator}",
        comm.rank(),
        hdr.width(),
        hdr.height()
    );
    GridBuffer::from_physical(hdr.width(), hdr.height(), hdr.padding(), samples)
}

/// Send every rank's final block back to the coordinator.
///
/// `block` may carry any padding; only its logical region is sent. On the
/// coordinator the global field is fully rewritten before this returns.
pub fn gather_field<C>(
    comm: &C,
    topo: &CartTopology,
    role: Role<'_>,
    block: &GridBuffer,
) -> Result<(), HeatSimError>
where
    C: Communicator,
{
    let stripped = block.with_padding(0)?;
    match role {
        Role::Participant { coordinator } => {
            let payload = encode_samples(stripped.as_slice());
            let _ = comm
                .isend(coordinator, ChannelKey::GATHER.tag(), &payload)
                .wait();
            Ok(())
        }
        Role::Coordinator(coord) => gather_into_coordinator(comm, topo, coord, &stripped),
    }
}

fn gather_into_coordinator<C: Communicator>(
    comm: &C,
    topo: &CartTopology,
    coord: &mut Coordinator,
    own: &GridBuffer,
) -> Result<(), HeatSimError> {
    check_layout(&coord.map, topo)?;
    let me = comm.rank();
    let mut extents = Vec::with_capacity(topo.size());
    for peer in (0..topo.size()).filter(|&r| r != me) {
        extents.push((peer, *coord.map.try_block(topo.coords_of(peer)?)?));
    }
    let ext = *coord.map.try_block(topo.coords_of(me)?)?;

    // 1) post all receives
    let pending: Vec<_> = extents
        .into_iter()
        .map(|(peer, ext)| {
            let h = comm.irecv(peer, ChannelKey::GATHER.tag(), ext.len() * 8);
            (peer, ext, h)
        })
        .collect();

    // 2) place our own block while the others are in flight
    let mut maybe_err = if own.shape() != (ext.width, ext.height) {
        Some(HeatSimError::ShapeMismatch {
            expected: (ext.width, ext.height),
            found: own.shape(),
        })
    } else {
        coord.global.paste(own, ext.x, ext.y).err()
    };

    // 3) wait for all receives (but do not early-return)
    for (peer, ext, h) in pending {
        let placed = match h.wait() {
            Some(raw) => decode_samples(&raw, ext.len(), peer)
                .and_then(|s| GridBuffer::from_samples(ext.width, ext.height, s))
                .and_then(|b| coord.global.paste(&b, ext.x, ext.y)),
            None => Err(HeatSimError::comm(peer, format!("no gather payload from rank {peer}"))),
        };
        if let Err(e) = placed {
            if maybe_err.is_none() {
                maybe_err = Some(e);
            }
        }
    }

    match maybe_err {
        Some(err) => Err(err),
        None => {
            log::info!("[rank {me}] gathered {} blocks", topo.size());
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algs::communicator::LocalComm;

    #[test]
    fn single_rank_scatter_keeps_whole_field() {
        let comm = LocalComm::universe(1).remove(0);
        let topo = CartTopology::new(1, 1, 1, 0).unwrap();
        let field = GridBuffer::from_samples(3, 2, vec![1., 2., 3., 4., 5., 6.]).unwrap();
        let mut coord = Coordinator::new(0, field.clone(), [1, 1]).unwrap();
        let block = scatter_field(&comm, &topo, Role::Coordinator(&mut coord)).unwrap();
        assert_eq!(block, field);
        gather_field(&comm, &topo, Role::Coordinator(&mut coord), &block.with_padding(1).unwrap())
            .unwrap();
        assert_eq!(coord.global(), &field);
    }

    #[test]
    fn layout_must_match_mesh() {
        let comm = LocalComm::universe(2).remove(0);
        let topo = CartTopology::new(2, 2, 1, 0).unwrap();
        let field = GridBuffer::new(4, 4, 0).unwrap();
        let mut coord = Coordinator::new(0, field, [1, 2]).unwrap();
        let err = scatter_field(&comm, &topo, Role::Coordinator(&mut coord)).unwrap_err();
        assert!(matches!(err, HeatSimError::MeshSizeMismatch { .. }));
    }
}
