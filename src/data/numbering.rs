//! Face numbering descriptors.
//!
//! A [`Numbering`] tells face-loop consumers how a renumbered face range may
//! be processed in parallel: groups run one after another, and inside a
//! group every thread owns one contiguous range of faces that touches no
//! cell of any other thread's range.
//!
//! Ranges live in a [`GroupIndex`], stored thread-major so that all groups
//! of one thread are adjacent (`t * n_groups + g`).

use std::ops::Range;

use serde::{Deserialize, Serialize};
use static_assertions::assert_impl_all;

use crate::debug_invariants::DebugInvariants;
use crate::mesh_error::MeshRenumberError;

/// How a face range was renumbered.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NumberingKind {
    /// No renumbering: one group run by one thread.
    Serial,
    /// Grouped for conflict-free multithreaded loops.
    Threads,
    /// Ordered so that no vector register touches a cell twice.
    Vectorized { vector_size: usize },
}

/// Per-(thread, group) face ranges; `None` marks a thread idle in a group.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupIndex {
    n_threads: usize,
    n_groups: usize,
    ranges: Vec<Option<Range<usize>>>,
}

impl GroupIndex {
    /// An index with every range unset.
    pub fn new(n_threads: usize, n_groups: usize) -> Self {
        Self {
            n_threads,
            n_groups,
            ranges: vec![None; n_threads * n_groups],
        }
    }

    #[inline]
    pub fn n_threads(&self) -> usize {
        self.n_threads
    }

    #[inline]
    pub fn n_groups(&self) -> usize {
        self.n_groups
    }

    #[inline]
    fn slot(&self, thread: usize, group: usize) -> usize {
        debug_assert!(thread < self.n_threads && group < self.n_groups);
        thread * self.n_groups + group
    }

    /// Face range of `thread` in `group`.
    #[inline]
    pub fn range(&self, thread: usize, group: usize) -> Option<Range<usize>> {
        self.ranges[self.slot(thread, group)].clone()
    }

    pub fn set_range(&mut self, thread: usize, group: usize, range: Option<Range<usize>>) {
        let s = self.slot(thread, group);
        self.ranges[s] = range;
    }

    /// Number of faces of `thread` in `group` (0 when unset).
    pub fn n_faces(&self, thread: usize, group: usize) -> usize {
        self.range(thread, group).map_or(0, |r| r.len())
    }

    /// Faces covered by all ranges of `group`.
    pub fn group_n_faces(&self, group: usize) -> usize {
        (0..self.n_threads).map(|t| self.n_faces(t, group)).sum()
    }

    /// Faces covered by the whole index.
    pub fn total_faces(&self) -> usize {
        (0..self.n_groups).map(|g| self.group_n_faces(g)).sum()
    }

    /// Iterate `(group, thread, range)` in loop order: groups outer, threads inner.
    pub fn iter(&self) -> impl Iterator<Item = (usize, usize, Range<usize>)> + '_ {
        (0..self.n_groups).flat_map(move |g| {
            (0..self.n_threads).filter_map(move |t| self.range(t, g).map(|r| (g, t, r)))
        })
    }

    /// Face-weighted imbalance estimate: each group contributes
    /// `max/mean - 1` of its per-thread face counts, weighted by its size.
    pub fn estimate_imbalance(&self) -> f64 {
        let total = self.total_faces();
        if total == 0 || self.n_threads == 0 {
            return 0.0;
        }
        let mut weighted = 0.0;
        for g in 0..self.n_groups {
            let group_faces = self.group_n_faces(g);
            if group_faces == 0 {
                continue;
            }
            let max = (0..self.n_threads)
                .map(|t| self.n_faces(t, g))
                .max()
                .unwrap_or(0);
            let mean = group_faces as f64 / self.n_threads as f64;
            weighted += (max as f64 / mean - 1.0) * group_faces as f64;
        }
        weighted / total as f64
    }
}

impl DebugInvariants for GroupIndex {
    fn debug_assert_invariants(&self) {
        crate::debug_invariants!(self.validate_invariants(), "GroupIndex");
    }

    fn validate_invariants(&self) -> Result<(), MeshRenumberError> {
        if self.ranges.len() != self.n_threads * self.n_groups {
            return Err(MeshRenumberError::InvariantViolation(format!(
                "group index holds {} ranges for {} threads x {} groups",
                self.ranges.len(),
                self.n_threads,
                self.n_groups
            )));
        }
        // ranges never overlap and follow loop order
        let mut prev_end = 0;
        for (g, t, r) in self.iter() {
            if r.start > r.end || r.start < prev_end {
                return Err(MeshRenumberError::InvariantViolation(format!(
                    "range {r:?} of thread {t} in group {g} overlaps or precedes offset {prev_end}"
                )));
            }
            prev_end = r.end;
        }
        Ok(())
    }
}

/// Numbering descriptor attached to a face kind of a mesh.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Numbering {
    kind: NumberingKind,
    n_elts: usize,
    group_index: GroupIndex,
}

assert_impl_all!(Numbering: Send, Sync, Clone);
assert_impl_all!(GroupIndex: Send, Sync, Clone);

impl Numbering {
    /// Serial numbering: one thread, one group covering `[0, n_elts)`.
    pub fn serial(n_elts: usize) -> Self {
        let mut group_index = GroupIndex::new(1, 1);
        group_index.set_range(0, 0, Some(0..n_elts));
        Self {
            kind: NumberingKind::Serial,
            n_elts,
            group_index,
        }
    }

    /// Threaded numbering over `n_elts` elements.
    pub fn threaded(group_index: GroupIndex, n_elts: usize) -> Result<Self, MeshRenumberError> {
        group_index.validate_invariants()?;
        if group_index.total_faces() != n_elts {
            return Err(MeshRenumberError::InconsistentGroupIndex {
                expected: n_elts,
                found: group_index.total_faces(),
            });
        }
        Ok(Self {
            kind: NumberingKind::Threads,
            n_elts,
            group_index,
        })
    }

    /// Vectorized numbering: a single serial range, processed register by register.
    pub fn vectorized(n_elts: usize, vector_size: usize) -> Self {
        let mut group_index = GroupIndex::new(1, 1);
        group_index.set_range(0, 0, Some(0..n_elts));
        Self {
            kind: NumberingKind::Vectorized { vector_size },
            n_elts,
            group_index,
        }
    }

    #[inline]
    pub fn kind(&self) -> NumberingKind {
        self.kind
    }

    #[inline]
    pub fn n_elts(&self) -> usize {
        self.n_elts
    }

    #[inline]
    pub fn n_threads(&self) -> usize {
        self.group_index.n_threads()
    }

    #[inline]
    pub fn n_groups(&self) -> usize {
        self.group_index.n_groups()
    }

    #[inline]
    pub fn group_index(&self) -> &GroupIndex {
        &self.group_index
    }

    /// See [`GroupIndex::estimate_imbalance`].
    pub fn estimate_imbalance(&self) -> f64 {
        self.group_index.estimate_imbalance()
    }
}
