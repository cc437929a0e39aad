//! Message passing between ranks: serial, threads of one process, or MPI.
//!
//! Renumbering decisions are purely local; ranks only talk to each other to
//! aggregate diagnostics (histograms of thread counts and imbalance) and the
//! validator's conflict counts. Messages are contiguous byte slices; the
//! provided collectives are built on `isend`/`irecv` and may be overridden
//! by backends with native collectives.

use bytes::Bytes;
use dashmap::DashMap;
use once_cell::sync::Lazy;
use std::collections::VecDeque;

/// Message tag namespace. Collectives of this crate use [`STATS_TAG`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct CommTag(pub u16);

impl CommTag {
    #[inline]
    pub const fn base(self) -> u16 {
        self.0
    }
    #[inline]
    pub const fn offset(self, k: u16) -> CommTag {
        CommTag(self.0.wrapping_add(k))
    }
}

/// Tag used by the statistics collectives.
pub const STATS_TAG: CommTag = CommTag(0x5200);

/// Non-blocking point-to-point messaging plus the collectives built on it.
pub trait Communicator: Send + Sync + 'static {
    /// Handle returned by `isend`.
    type SendHandle: Wait;
    /// Handle returned by `irecv`.
    type RecvHandle: Wait;

    fn isend(&self, peer: usize, tag: u16, buf: &[u8]) -> Self::SendHandle;
    fn irecv(&self, peer: usize, tag: u16, buf: &mut [u8]) -> Self::RecvHandle;
    fn rank(&self) -> usize;
    fn size(&self) -> usize;

    /// Every rank's `local` buffer, indexed by rank. All ranks must pass
    /// buffers of the same length.
    fn all_gather_bytes(&self, tag: CommTag, local: &[u8]) -> Vec<Vec<u8>> {
        let (me, n) = (self.rank(), self.size());
        let sends: Vec<_> = (0..n)
            .filter(|&p| p != me)
            .map(|p| self.isend(p, tag.base(), local))
            .collect();
        let mut out = vec![Vec::new(); n];
        for p in 0..n {
            if p == me {
                out[p] = local.to_vec();
            } else {
                let mut buf = vec![0u8; local.len()];
                out[p] = self.irecv(p, tag.base(), &mut buf).wait().unwrap_or(buf);
            }
        }
        for s in sends {
            let _ = s.wait();
        }
        out
    }

    fn all_gather_u64(&self, value: u64) -> Vec<u64> {
        self.all_gather_bytes(STATS_TAG, bytemuck::bytes_of(&value))
            .iter()
            .map(|b| bytemuck::pod_read_unaligned(&b[..8]))
            .collect()
    }

    fn all_gather_f64(&self, value: f64) -> Vec<f64> {
        self.all_gather_bytes(STATS_TAG.offset(1), bytemuck::bytes_of(&value))
            .iter()
            .map(|b| bytemuck::pod_read_unaligned(&b[..8]))
            .collect()
    }

    /// Element-wise sum of `values` over all ranks.
    fn all_reduce_sum_u64(&self, values: &[u64]) -> Vec<u64> {
        let mut sum = vec![0u64; values.len()];
        for bytes in self.all_gather_bytes(STATS_TAG.offset(2), bytemuck::cast_slice(values)) {
            for (s, chunk) in sum.iter_mut().zip(bytes.chunks_exact(8)) {
                *s += bytemuck::pod_read_unaligned::<u64>(chunk);
            }
        }
        sum
    }
}

/// Anything that can be waited on.
pub trait Wait {
    /// Wait for completion and return the received data (if any).
    fn wait(self) -> Option<Vec<u8>>;
}

/// Compile-time no-op comm for pure serial runs: rank 0 of 1.
#[derive(Clone, Debug, Default)]
pub struct NoComm;

impl Wait for () {
    fn wait(self) -> Option<Vec<u8>> {
        None
    }
}

impl Communicator for NoComm {
    type SendHandle = ();
    type RecvHandle = ();

    fn isend(&self, _peer: usize, _tag: u16, _buf: &[u8]) {}
    fn irecv(&self, _peer: usize, _tag: u16, _buf: &mut [u8]) {}
    fn rank(&self) -> usize {
        0
    }
    fn size(&self) -> usize {
        1
    }
}

// (src, dst, tag)
type Key = (usize, usize, u16);

static MAILBOX: Lazy<DashMap<Key, VecDeque<Bytes>>> = Lazy::new(DashMap::new);

/// Pending receive from the in-process mailbox; resolved in [`Wait::wait`].
pub struct LocalHandle {
    key: Key,
    len: usize,
}

impl Wait for LocalHandle {
    fn wait(self) -> Option<Vec<u8>> {
        loop {
            let popped = MAILBOX.get_mut(&self.key).and_then(|mut q| q.pop_front());
            if let Some(bytes) = popped {
                return Some(bytes[..self.len.min(bytes.len())].to_vec());
            }
            std::thread::yield_now();
        }
    }
}

/// Ranks emulated by threads of one process, exchanging through a global
/// FIFO mailbox keyed by `(src, dst, tag)`.
#[derive(Clone, Debug)]
pub struct RayonComm {
    rank: usize,
    size: usize,
}

impl RayonComm {
    pub fn new(rank: usize, size: usize) -> Self {
        Self { rank, size }
    }
}

impl Communicator for RayonComm {
    type SendHandle = ();
    type RecvHandle = LocalHandle;

    fn isend(&self, peer: usize, tag: u16, buf: &[u8]) -> Self::SendHandle {
        MAILBOX
            .entry((self.rank, peer, tag))
            .or_default()
            .push_back(Bytes::copy_from_slice(buf));
    }

    fn irecv(&self, peer: usize, tag: u16, buf: &mut [u8]) -> Self::RecvHandle {
        LocalHandle {
            key: (peer, self.rank, tag),
            len: buf.len(),
        }
    }

    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }
}

// --- MPI backend (feature = "mpi-support") ---
#[cfg(feature = "mpi-support")]
mod mpi_backend {
    use super::{Communicator, Wait};
    use crate::mesh_error::MeshRenumberError;
    use mpi::Threading;
    use mpi::collective::SystemOperation;
    use mpi::topology::SimpleCommunicator;
    use mpi::traits::{
        Communicator as MpiCommunicator, CommunicatorCollectives, Destination, Source,
    };

    /// MPI communicator; the caller keeps the `Universe` alive.
    ///
    /// MPI must be initialized with `Threading::Multiple`
    /// (`mpi::initialize_with_threading`), since the handle may be used from
    /// any thread. [`MpiComm::new`] rejects lower threading levels.
    pub struct MpiComm {
        world: SimpleCommunicator,
        rank: usize,
        size: usize,
    }

    // SAFETY: only constructed when MPI provides `Threading::Multiple`, so
    // concurrent calls on the communicator from several threads are allowed.
    unsafe impl Send for MpiComm {}
    unsafe impl Sync for MpiComm {}

    impl MpiComm {
        /// Wrap `world`; `provided` is the threading level returned by
        /// `mpi::initialize_with_threading`.
        pub fn new(
            world: SimpleCommunicator,
            provided: Threading,
        ) -> Result<Self, MeshRenumberError> {
            if !matches!(provided, Threading::Multiple) {
                return Err(MeshRenumberError::InvalidConfig(format!(
                    "MPI threading level {provided:?} is below Threading::Multiple"
                )));
            }
            let rank = world.rank() as usize;
            let size = world.size() as usize;
            Ok(Self { world, rank, size })
        }
    }

    /// Receive completed eagerly in `irecv`.
    pub struct MpiRecv(Option<Vec<u8>>);

    impl Wait for MpiRecv {
        fn wait(self) -> Option<Vec<u8>> {
            self.0
        }
    }

    impl Communicator for MpiComm {
        type SendHandle = ();
        type RecvHandle = MpiRecv;

        fn isend(&self, peer: usize, tag: u16, buf: &[u8]) {
            self.world
                .process_at_rank(peer as i32)
                .send_with_tag(buf, i32::from(tag));
        }

        fn irecv(&self, peer: usize, tag: u16, buf: &mut [u8]) -> MpiRecv {
            let (data, _status) = self
                .world
                .process_at_rank(peer as i32)
                .receive_vec_with_tag::<u8>(i32::from(tag));
            let n = buf.len().min(data.len());
            MpiRecv(Some(data[..n].to_vec()))
        }

        fn rank(&self) -> usize {
            self.rank
        }

        fn size(&self) -> usize {
            self.size
        }

        fn all_gather_u64(&self, value: u64) -> Vec<u64> {
            let mut out = vec![0u64; self.size];
            self.world.all_gather_into(&value, &mut out[..]);
            out
        }

        fn all_gather_f64(&self, value: f64) -> Vec<f64> {
            let mut out = vec![0f64; self.size];
            self.world.all_gather_into(&value, &mut out[..]);
            out
        }

        fn all_reduce_sum_u64(&self, values: &[u64]) -> Vec<u64> {
            let mut out = vec![0u64; values.len()];
            self.world
                .all_reduce_into(values, &mut out[..], SystemOperation::sum());
            out
        }
    }
}

#[cfg(feature = "mpi-support")]
pub use mpi_backend::MpiComm;

#[cfg(all(test, feature = "mpi-support"))]
mod mpi_tests {
    use super::MpiComm;
    use mpi::Threading;

    #[test]
    fn mpi_comm_requires_multiple_threading() {
        let (universe, provided) =
            mpi::initialize_with_threading(Threading::Multiple).expect("MPI init");
        assert!(MpiComm::new(universe.world(), Threading::Serialized).is_err());
        if matches!(provided, Threading::Multiple) {
            let comm = MpiComm::new(universe.world(), provided).unwrap();
            assert_eq!(
                super::Communicator::all_gather_u64(&comm, 3).len(),
                super::Communicator::size(&comm)
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn no_comm_collectives_are_local() {
        let c = NoComm;
        assert_eq!(c.all_gather_u64(7), vec![7]);
        assert_eq!(c.all_gather_f64(0.25), vec![0.25]);
        assert_eq!(c.all_reduce_sum_u64(&[1, 2]), vec![1, 2]);
    }

    #[test]
    fn collectives_use_distinct_tags() {
        assert_eq!(STATS_TAG.offset(0), STATS_TAG);
        assert_ne!(STATS_TAG.offset(1), STATS_TAG);
        assert_eq!(STATS_TAG.offset(2).base(), STATS_TAG.base() + 2);
        assert_eq!(CommTag(u16::MAX).offset(1), CommTag(0));
    }

    #[test]
    #[serial]
    fn collectives_over_two_ranks() {
        let (a, b) = (RayonComm::new(0, 2), RayonComm::new(1, 2));
        let (ga, gb) = std::thread::scope(|s| {
            let ha = s.spawn(|| (a.all_gather_f64(1.5), a.all_reduce_sum_u64(&[1, 10])));
            let hb = s.spawn(|| (b.all_gather_f64(2.5), b.all_reduce_sum_u64(&[2, 20])));
            (ha.join().unwrap(), hb.join().unwrap())
        });
        assert_eq!(ga, (vec![1.5, 2.5], vec![3, 30]));
        assert_eq!(gb, ga);
    }

    #[test]
    #[serial]
    fn mailbox_is_keyed_by_tag() {
        let (a, b) = (RayonComm::new(0, 2), RayonComm::new(1, 2));
        a.isend(1, 7, &[7, 7]).wait();
        a.isend(1, 8, &[8]).wait();
        let mut buf = [0u8; 2];
        assert_eq!(b.irecv(0, 8, &mut buf).wait(), Some(vec![8]));
        assert_eq!(b.irecv(0, 7, &mut buf).wait(), Some(vec![7, 7]));
    }
}
