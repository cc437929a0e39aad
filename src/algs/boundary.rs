//! Boundary face renumbering for threads.
//!
//! Boundary faces are sorted by adjacent cell and cut into `n_threads`
//! contiguous ranges of roughly equal size. A cut never separates two faces
//! of the same cell, which is all it takes for the ranges to be
//! conflict-free: a single group suffices.

use crate::algs::lexical::order_lexical;
use crate::algs::renumber::{Permutation, ThreadedFaceNumbering};
use crate::data::numbering::GroupIndex;
use crate::mesh_error::MeshRenumberError;

/// Split boundary faces into per-thread ranges of at least
/// `min_subset_size` faces (the last ranges may be shorter or empty).
pub fn renumber_boundary_faces(
    b_face_cells: &[usize],
    n_threads: usize,
    min_subset_size: usize,
) -> Result<ThreadedFaceNumbering, MeshRenumberError> {
    let n_faces = b_face_cells.len();
    if n_faces == 0 {
        return Err(MeshRenumberError::NoBoundaryFaces);
    }
    if n_threads == 0 {
        return Err(MeshRenumberError::NoThreads);
    }

    let order = order_lexical(b_face_cells);
    let cell_at = |pos: usize| b_face_cells[order[pos]];
    let subset_size = n_faces.div_ceil(n_threads).max(min_subset_size);

    let mut group_index = GroupIndex::new(n_threads, 1);
    let mut end = 0;
    for t in 0..n_threads {
        let start = end;
        end = ((t + 1) * subset_size).clamp(start, n_faces);
        if end > 0 && end < n_faces {
            let cell = cell_at(end - 1);
            while end < n_faces && cell_at(end) == cell {
                end += 1;
            }
        }
        group_index.set_range(t, 0, Some(start..end));
    }

    Ok(ThreadedFaceNumbering {
        new_to_old: Permutation::from_new_to_old(order)?,
        group_index,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_boundary_faces() {
        assert_eq!(
            renumber_boundary_faces(&[], 4, 1).unwrap_err(),
            MeshRenumberError::NoBoundaryFaces
        );
    }

    #[test]
    fn cuts_follow_cells() {
        // already sorted; faces 3 and 4 share cell 3
        let cells = [0, 1, 2, 3, 3, 4, 5, 6, 7, 8];
        let out = renumber_boundary_faces(&cells, 3, 1).unwrap();
        let gi = &out.group_index;
        assert_eq!(gi.range(0, 0), Some(0..5));
        assert_eq!(gi.range(1, 0), Some(5..8));
        assert_eq!(gi.range(2, 0), Some(8..10));
        assert!(out.new_to_old.is_identity());
    }

    #[test]
    fn faces_sorted_by_cell_then_id() {
        let cells = [4, 1, 4, 0, 1];
        let out = renumber_boundary_faces(&cells, 2, 1).unwrap();
        assert_eq!(out.new_to_old.new_to_old(), &[3, 1, 4, 0, 2]);
        // first cut lands right after both faces of cell 1
        assert_eq!(out.group_index.range(0, 0), Some(0..3));
        assert_eq!(out.group_index.range(1, 0), Some(3..5));
    }

    #[test]
    fn min_subset_leaves_trailing_threads_empty() {
        let cells: Vec<usize> = (0..10).collect();
        let out = renumber_boundary_faces(&cells, 4, 8).unwrap();
        let gi = &out.group_index;
        assert_eq!(gi.range(0, 0), Some(0..8));
        assert_eq!(gi.range(1, 0), Some(8..10));
        assert_eq!(gi.range(2, 0), Some(10..10));
        assert_eq!(gi.range(3, 0), Some(10..10));
    }
}
