//! Thin façade over intra-process (threads) or inter-process (MPI) message passing.
//!
//! Messages are *contiguous byte slices*, always copied: a receiver never
//! aliases the sender's buffer. All handles are **waitable** but
//! non-blocking: issuing `isend`/`irecv` never suspends, only `.wait()` does.
//! Callers issue every transfer of a phase first and then wait on all of
//! them, which is the only synchronisation the halo exchange relies on.

use crate::heat_error::HeatSimError;
use crate::topology::cart::Direction;
use bytes::Bytes;
use dashmap::DashMap;
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicUsize, Ordering};
use std::time::Duration;

/// Message tag as it travels on the wire.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CommTag(pub u16);

impl CommTag {
    pub const fn new(v: u16) -> Self {
        Self(v)
    }
    pub const fn as_u16(self) -> u16 {
        self.0
    }
}

/// Logical stream a message belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Channel {
    /// Block dimensions sent from the coordinator.
    ScatterHeader,
    /// Block samples sent from the coordinator.
    ScatterPayload,
    /// Border samples travelling *towards* the given direction.
    Halo(Direction),
    /// Final block samples sent to the coordinator.
    Gather,
}

/// Structured channel key; the only way tags are produced.
///
/// `phase` is the iteration parity for halo traffic and 0 elsewhere. Halo
/// tags differ per direction, so a rank that is its own neighbour never
/// matches its north-bound send with its south-bound receive.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ChannelKey {
    pub channel: Channel,
    pub phase: u8,
}

impl ChannelKey {
    pub const SCATTER_HEADER: ChannelKey = ChannelKey::fixed(Channel::ScatterHeader);
    pub const SCATTER_PAYLOAD: ChannelKey = ChannelKey::fixed(Channel::ScatterPayload);
    pub const GATHER: ChannelKey = ChannelKey::fixed(Channel::Gather);

    const fn fixed(channel: Channel) -> Self {
        Self { channel, phase: 0 }
    }

    /// Halo stream for messages moving towards `dir` during `iteration`.
    pub fn halo(dir: Direction, iteration: usize) -> Self {
        Self {
            channel: Channel::Halo(dir),
            phase: (iteration % 2) as u8,
        }
    }

    pub fn tag(self) -> CommTag {
        let phase = u16::from(self.phase & 1);
        let raw = match self.channel {
            Channel::ScatterHeader => 0x0100,
            Channel::ScatterPayload => 0x0101,
            Channel::Halo(dir) => 0x0200 | ((dir.index() as u16) << 1) | phase,
            Channel::Gather => 0x0300,
        };
        CommTag::new(raw)
    }
}

/// Non-blocking point-to-point messaging plus the two collectives a run needs.
pub trait Communicator {
    /// Handle returned by `isend`.
    type SendHandle: Wait;
    /// Handle returned by `irecv`.
    type RecvHandle: Wait;

    /// Start sending a copy of `buf` to `peer`.
    fn isend(&self, peer: usize, tag: CommTag, buf: &[u8]) -> Self::SendHandle;
    /// Start receiving a message of `len` bytes from `peer`.
    fn irecv(&self, peer: usize, tag: CommTag, len: usize) -> Self::RecvHandle;

    fn rank(&self) -> usize;
    fn size(&self) -> usize;

    /// Block until every rank has reached the barrier.
    fn barrier(&self) -> Result<(), HeatSimError>;

    /// Tear down the whole run; pending and future transfers fail.
    fn abort(&self, code: i32);
}

/// Anything that can be waited on.
pub trait Wait {
    /// Wait for completion and return the received data (if any).
    ///
    /// `None` from a receive handle means the transfer did not complete.
    fn wait(self) -> Option<Vec<u8>>;
}

impl Wait for () {
    fn wait(self) -> Option<Vec<u8>> {
        None
    }
}

// --- LocalComm: intra-process / one thread per rank ---
type Key = (usize, usize, u16); // (src, dst, tag)

const POLL: Duration = Duration::from_millis(5);

#[derive(Debug, Default)]
struct BarrierState {
    arrived: usize,
    generation: u64,
}

#[derive(Debug)]
struct Universe {
    size: usize,
    mailbox: DashMap<Key, VecDeque<Bytes>>,
    posted: Mutex<u64>,
    posted_cv: Condvar,
    barrier: Mutex<BarrierState>,
    barrier_cv: Condvar,
    aborted: AtomicBool,
    abort_code: AtomicI32,
    abort_origin: AtomicUsize,
}

impl Universe {
    fn aborted_error(&self) -> HeatSimError {
        HeatSimError::comm(
            self.abort_origin.load(Ordering::SeqCst),
            format!("run aborted with code {}", self.abort_code.load(Ordering::SeqCst)),
        )
    }

    fn take(&self, key: &Key) -> Option<Bytes> {
        self.mailbox.get_mut(key).and_then(|mut q| q.pop_front())
    }
}

/// Endpoint of an in-process universe of ranks.
///
/// Each rank runs on its own thread and owns its buffers; the only thing
/// shared is the mailbox, through which every message is copied.
#[derive(Clone, Debug)]
pub struct LocalComm {
    rank: usize,
    shared: Arc<Universe>,
}

impl LocalComm {
    /// Build `size` connected endpoints, rank `i` at index `i`.
    pub fn universe(size: usize) -> Vec<LocalComm> {
        let shared = Arc::new(Universe {
            size,
            mailbox: DashMap::new(),
            posted: Mutex::new(0),
            posted_cv: Condvar::new(),
            barrier: Mutex::new(BarrierState::default()),
            barrier_cv: Condvar::new(),
            aborted: AtomicBool::new(false),
            abort_code: AtomicI32::new(0),
            abort_origin: AtomicUsize::new(0),
        });
        (0..size)
            .map(|rank| LocalComm {
                rank,
                shared: shared.clone(),
            })
            .collect()
    }

    /// `true` once any rank of this universe has called [`Communicator::abort`].
    pub fn is_aborted(&self) -> bool {
        self.shared.aborted.load(Ordering::SeqCst)
    }
}

/// Pending receive on a [`LocalComm`].
pub struct LocalHandle {
    key: Key,
    shared: Arc<Universe>,
}

impl Wait for LocalHandle {
    fn wait(self) -> Option<Vec<u8>> {
        let shared = &self.shared;
        loop {
            let seen = *shared.posted.lock();
            if let Some(bytes) = shared.take(&self.key) {
                return Some(bytes.to_vec());
            }
            if shared.aborted.load(Ordering::SeqCst) {
                return None;
            }
            let mut posted = shared.posted.lock();
            if *posted == seen {
                shared.posted_cv.wait_for(&mut posted, POLL);
            }
        }
    }
}

impl Communicator for LocalComm {
    type SendHandle = ();
    type RecvHandle = LocalHandle;

    fn isend(&self, peer: usize, tag: CommTag, buf: &[u8]) -> Self::SendHandle {
        let key = (self.rank, peer, tag.as_u16());
        self.shared
            .mailbox
            .entry(key)
            .or_default()
            .push_back(Bytes::copy_from_slice(buf));
        let mut posted = self.shared.posted.lock();
        *posted += 1;
        self.shared.posted_cv.notify_all();
    }

    fn irecv(&self, peer: usize, tag: CommTag, _len: usize) -> Self::RecvHandle {
        LocalHandle {
            key: (peer, self.rank, tag.as_u16()),
            shared: self.shared.clone(),
        }
    }

    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.shared.size
    }

    fn barrier(&self) -> Result<(), HeatSimError> {
        let shared = &self.shared;
        let mut state = shared.barrier.lock();
        if shared.aborted.load(Ordering::SeqCst) {
            return Err(shared.aborted_error());
        }
        let generation = state.generation;
        state.arrived += 1;
        if state.arrived == shared.size {
            state.arrived = 0;
            state.generation += 1;
            shared.barrier_cv.notify_all();
            return Ok(());
        }
        while state.generation == generation {
            if shared.aborted.load(Ordering::SeqCst) {
                return Err(shared.aborted_error());
            }
            shared.barrier_cv.wait_for(&mut state, POLL);
        }
        Ok(())
    }

    fn abort(&self, code: i32) {
        let shared = &self.shared;
        if !shared.aborted.swap(true, Ordering::SeqCst) {
            shared.abort_code.store(code, Ordering::SeqCst);
            shared.abort_origin.store(self.rank, Ordering::SeqCst);
            log::error!("[rank {}] aborting run with code {code}", self.rank);
        }
        {
            let _posted = shared.posted.lock();
            shared.posted_cv.notify_all();
        }
        let _state = shared.barrier.lock();
        shared.barrier_cv.notify_all();
    }
}

// --- MPI backend (feature = "mpi-support") ---
#[cfg(feature = "mpi-support")]
mod mpi_backend {
    use super::{CommTag, Wait};
    use crate::heat_error::HeatSimError;
    use mpi::environment::Universe;
    use mpi::request::{Request, StaticScope};
    use mpi::topology::SimpleCommunicator;
    use mpi::traits::*;

    /// World communicator of an MPI job.
    ///
    /// Immediate operations need buffers that outlive the call, so every
    /// send/receive owns a heap copy that is released once the request has
    /// been waited on.
    pub struct MpiComm {
        pub world: SimpleCommunicator,
        rank: usize,
        size: usize,
        _universe: Universe,
    }

    impl MpiComm {
        pub fn new() -> Result<Self, HeatSimError> {
            let universe = mpi::initialize().ok_or_else(|| {
                HeatSimError::InvalidConfig("MPI is already initialized".into())
            })?;
            let world = universe.world();
            let rank = world.rank() as usize;
            let size = world.size() as usize;
            Ok(Self {
                world,
                rank,
                size,
                _universe: universe,
            })
        }
    }

    pub struct MpiSendHandle {
        req: Request<'static, [u8], StaticScope>,
        buf: *mut [u8],
    }

    impl Wait for MpiSendHandle {
        fn wait(self) -> Option<Vec<u8>> {
            self.req.wait();
            // SAFETY: `buf` came from `Box::leak` in `isend` and the request
            // that borrowed it has completed.
            drop(unsafe { Box::from_raw(self.buf) });
            None
        }
    }

    pub struct MpiRecvHandle {
        req: Request<'static, [u8], StaticScope>,
        buf: *mut [u8],
    }

    impl Wait for MpiRecvHandle {
        fn wait(self) -> Option<Vec<u8>> {
            self.req.wait();
            // SAFETY: as above; the receive has completed so nothing else
            // writes into `buf`.
            let owned = unsafe { Box::from_raw(self.buf) };
            Some(owned.into_vec())
        }
    }

    impl super::Communicator for MpiComm {
        type SendHandle = MpiSendHandle;
        type RecvHandle = MpiRecvHandle;

        fn isend(&self, peer: usize, tag: CommTag, buf: &[u8]) -> MpiSendHandle {
            let owned: &'static mut [u8] = Box::leak(buf.to_vec().into_boxed_slice());
            let ptr: *mut [u8] = owned;
            // SAFETY: `ptr` stays valid until the handle is waited on.
            let data: &'static [u8] = unsafe { &*ptr };
            let req = self
                .world
                .process_at_rank(peer as i32)
                .immediate_send_with_tag(StaticScope, data, i32::from(tag.as_u16()));
            MpiSendHandle { req, buf: ptr }
        }

        fn irecv(&self, peer: usize, tag: CommTag, len: usize) -> MpiRecvHandle {
            let owned: &'static mut [u8] = Box::leak(vec![0u8; len].into_boxed_slice());
            let ptr: *mut [u8] = owned;
            // SAFETY: the receive is the only writer until the handle is waited on.
            let data: &'static mut [u8] = unsafe { &mut *ptr };
            let req = self
                .world
                .process_at_rank(peer as i32)
                .immediate_receive_into_with_tag(StaticScope, data, i32::from(tag.as_u16()));
            MpiRecvHandle { req, buf: ptr }
        }

        fn rank(&self) -> usize {
            self.rank
        }

        fn size(&self) -> usize {
            self.size
        }

        fn barrier(&self) -> Result<(), HeatSimError> {
            self.world.barrier();
            Ok(())
        }

        fn abort(&self, code: i32) {
            log::error!("[rank {}] MPI_Abort({code})", self.rank);
            self.world.abort(code)
        }
    }
}

#[cfg(feature = "mpi-support")]
pub use mpi_backend::MpiComm;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_roundtrip_two_ranks() {
        let comms = LocalComm::universe(2);
        let tag = ChannelKey::GATHER.tag();
        let recv_handle = comms[1].irecv(0, tag, 4);
        comms[0].isend(1, tag, &[1, 2, 3, 4]).wait();
        let data = recv_handle.wait().expect("Expected to receive data from rank 0");
        assert_eq!(data, vec![1, 2, 3, 4]);
    }

    #[test]
    fn halo_tags_are_distinct() {
        let mut tags: Vec<u16> = Vec::new();
        for it in 0..2 {
            for d in Direction::ALL {
                tags.push(ChannelKey::halo(d, it).tag().as_u16());
            }
        }
        tags.push(ChannelKey::SCATTER_HEADER.tag().as_u16());
        tags.push(ChannelKey::SCATTER_PAYLOAD.tag().as_u16());
        tags.push(ChannelKey::GATHER.tag().as_u16());
        let n = tags.len();
        tags.sort_unstable();
        tags.dedup();
        assert_eq!(tags.len(), n);
    }

    #[test]
    fn halo_phase_repeats_every_other_iteration() {
        assert_eq!(
            ChannelKey::halo(Direction::East, 0).tag(),
            ChannelKey::halo(Direction::East, 2).tag()
        );
    }
}
