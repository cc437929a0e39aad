//! Block-uniform interior face renumbering for threads.
//!
//! Faces are first split into independent groups (no shared cell inside a
//! group), then every group is cut into equal contiguous chunks, one per
//! thread. Since a group is cell-disjoint, any split of it is conflict-free.

use crate::algs::independent_groups::independent_face_groups;
use crate::algs::renumber::{Permutation, ThreadedFaceNumbering};
use crate::data::numbering::GroupIndex;
use crate::mesh_error::MeshRenumberError;

/// Parameters of [`renumber_block`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlockOptions {
    pub n_threads: usize,
    pub min_subset_size: usize,
    /// Starting maximum group size.
    pub max_group_size: usize,
    /// Decrement applied while the faces would form fewer than
    /// `2 * n_threads` groups.
    pub size_step: usize,
    /// Groups with at most this many faces per thread go to thread 0.
    pub serial_threshold: usize,
}

impl BlockOptions {
    pub fn new(n_threads: usize, min_subset_size: usize) -> Self {
        Self {
            n_threads,
            min_subset_size,
            max_group_size: 1014,
            size_step: 64,
            serial_threshold: 4,
        }
    }

    /// Group size actually used for `n_faces` faces.
    pub fn group_size(&self, n_faces: usize) -> usize {
        let step = self.size_step.max(1);
        let mut size = self.max_group_size.max(1);
        while n_faces / size < 2 * self.n_threads && size > self.min_subset_size && size > step {
            size -= step;
        }
        size.max(self.min_subset_size).max(2 * self.n_threads)
    }
}

/// Per-thread ranges for consecutive groups of the given sizes.
///
/// A group with more than `serial_threshold` faces per thread is split into
/// `n_threads` chunks, the first `size % n_threads` of them one face larger;
/// smaller groups go entirely to thread 0.
pub fn thread_bounds_by_group_size(
    n_faces: usize,
    group_sizes: &[usize],
    n_threads: usize,
    serial_threshold: usize,
) -> Result<GroupIndex, MeshRenumberError> {
    if n_threads == 0 {
        return Err(MeshRenumberError::NoThreads);
    }
    let mut index = GroupIndex::new(n_threads, group_sizes.len());
    let mut pos = 0;
    for (g, &size) in group_sizes.iter().enumerate() {
        let chunk = size / n_threads;
        let extra = size % n_threads;
        if chunk > serial_threshold {
            for t in 0..n_threads {
                let start = pos;
                pos += chunk + usize::from(t < extra);
                index.set_range(t, g, Some(start..pos));
            }
        } else {
            index.set_range(0, g, Some(pos..pos + size));
            pos += size;
        }
    }
    if pos != n_faces {
        return Err(MeshRenumberError::InconsistentGroupIndex {
            expected: n_faces,
            found: pos,
        });
    }
    Ok(index)
}

/// Group interior faces for threads with independent sets split uniformly.
pub fn renumber_block(
    n_cells_ext: usize,
    face_cells: &[[usize; 2]],
    opts: &BlockOptions,
) -> Result<ThreadedFaceNumbering, MeshRenumberError> {
    if opts.n_threads == 0 {
        return Err(MeshRenumberError::NoThreads);
    }
    let n_faces = face_cells.len();
    if n_faces <= opts.min_subset_size {
        return Err(MeshRenumberError::TooFewFaces {
            n_faces,
            min_subset_size: opts.min_subset_size,
        });
    }
    if let Some((face, fc)) = face_cells
        .iter()
        .enumerate()
        .find(|(_, fc)| fc[0].max(fc[1]) >= n_cells_ext)
    {
        return Err(MeshRenumberError::CellOutOfRange {
            face,
            cell: fc[0].max(fc[1]),
            n_cells: n_cells_ext,
        });
    }

    let group_size = opts.group_size(n_faces);
    let groups = independent_face_groups(group_size, n_cells_ext, face_cells);
    let group_index = thread_bounds_by_group_size(
        n_faces,
        &groups.group_sizes,
        opts.n_threads,
        opts.serial_threshold,
    )?;
    crate::debug_invariants!(
        crate::debug_invariants::DebugInvariants::validate_invariants(&group_index),
        "block group index"
    );

    Ok(ThreadedFaceNumbering {
        new_to_old: Permutation::from_new_to_old(groups.new_to_old)?,
        group_index,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::debug_invariants::DebugInvariants;

    #[test]
    fn bounds_split_large_groups_evenly() {
        let gi = thread_bounds_by_group_size(23, &[22, 1], 4, 4).unwrap();
        // 22 = 4 * 5 + 2
        assert_eq!(gi.range(0, 0), Some(0..6));
        assert_eq!(gi.range(1, 0), Some(6..12));
        assert_eq!(gi.range(2, 0), Some(12..17));
        assert_eq!(gi.range(3, 0), Some(17..22));
        assert_eq!(gi.range(0, 1), Some(22..23));
        assert_eq!(gi.range(1, 1), None);
    }

    #[test]
    fn bounds_keep_small_groups_serial() {
        // 20 faces over 4 threads is exactly 5 per thread: split
        // 16 faces is 4 per thread: serial
        let gi = thread_bounds_by_group_size(36, &[20, 16], 4, 4).unwrap();
        assert_eq!(gi.n_faces(3, 0), 5);
        assert_eq!(gi.range(0, 1), Some(20..36));
        assert_eq!(gi.n_faces(2, 1), 0);
    }

    #[test]
    fn grid_groups_pass_invariant_checks() {
        let n = 12;
        let faces: Vec<[usize; 2]> = (0..n * n)
            .flat_map(|c| {
                let right = (c % n + 1 < n).then(|| [c, c + 1]);
                let up = (c + n < n * n).then(|| [c, c + n]);
                right.into_iter().chain(up)
            })
            .collect();
        let out = renumber_block(n * n, &faces, &BlockOptions::new(3, 4)).unwrap();
        assert!(out.group_index.validate_invariants().is_ok());
        assert_eq!(out.group_index.total_faces(), faces.len());
    }

    #[test]
    fn bounds_must_tile_faces() {
        let err = thread_bounds_by_group_size(10, &[4, 4], 2, 4).unwrap_err();
        assert_eq!(
            err,
            MeshRenumberError::InconsistentGroupIndex {
                expected: 10,
                found: 8
            }
        );
    }

    #[test]
    fn group_size_shrinks_for_small_meshes() {
        let opts = BlockOptions::new(4, 64);
        assert_eq!(opts.group_size(1_000_000), 1014);
        // 2000 faces make 8 groups once the size drops to 1014 - 12 * 64
        assert_eq!(opts.group_size(2000), 246);
        assert_eq!(opts.group_size(10), 64);
    }

    #[test]
    fn chain_blocks_are_two_independent_groups() {
        let faces: Vec<[usize; 2]> = (0..200).map(|i| [i, i + 1]).collect();
        let mut opts = BlockOptions::new(2, 8);
        opts.max_group_size = 1000;
        let out = renumber_block(201, &faces, &opts).unwrap();
        let gi = &out.group_index;
        assert_eq!(gi.total_faces(), 200);
        // even faces first, then odd ones
        assert_eq!(out.new_to_old.new_to_old()[0], 0);
        assert_eq!(out.new_to_old.new_to_old()[1], 2);
        assert!(gi.n_groups() >= 2);
    }

    #[test]
    fn too_few_faces() {
        let faces = vec![[0, 1], [1, 2]];
        assert!(renumber_block(3, &faces, &BlockOptions::new(2, 64))
            .unwrap_err()
            .is_infeasible());
    }
}
