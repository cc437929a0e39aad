//! Greedy partition of interior faces into groups of pairwise cell-disjoint
//! faces ("independent sets").
//!
//! Faces are visited in increasing id order; a face joins the current group
//! unless it shares a cell with a face already in the group (checked through
//! the cell → face graph) or the group is full. Faces left over seed the
//! next group until every face has been placed.

use crate::algs::csr_graph::CsrGraph;

/// Faces grouped so that no two faces of one group share a cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FaceGroups {
    /// Faces in group order (group 0 first).
    pub new_to_old: Vec<usize>,
    /// Size of each group.
    pub group_sizes: Vec<usize>,
}

impl FaceGroups {
    #[inline]
    pub fn n_groups(&self) -> usize {
        self.group_sizes.len()
    }

    /// Faces of group `g`, in new order.
    pub fn group(&self, g: usize) -> &[usize] {
        let start: usize = self.group_sizes[..g].iter().sum();
        &self.new_to_old[start..start + self.group_sizes[g]]
    }
}

/// Split interior faces into independent groups of at most `max_group_size`.
pub fn independent_face_groups(
    max_group_size: usize,
    n_cells_ext: usize,
    face_cells: &[[usize; 2]],
) -> FaceGroups {
    let n_faces = face_cells.len();
    let max_group_size = max_group_size.max(1);
    let cell_faces = CsrGraph::cell_faces(n_cells_ext, face_cells);

    let mut placed = vec![false; n_faces];
    let mut in_group = vec![false; n_faces];
    let mut new_to_old = Vec::with_capacity(n_faces);
    let mut group_sizes = Vec::new();
    let mut first_unplaced = 0;

    while new_to_old.len() < n_faces {
        let group_start = new_to_old.len();
        for f in first_unplaced..n_faces {
            if placed[f] {
                continue;
            }
            if new_to_old.len() - group_start >= max_group_size {
                break;
            }
            let [c0, c1] = face_cells[f];
            let conflicts = [c0, c1]
                .iter()
                .any(|&c| cell_faces.row(c).iter().any(|&g| in_group[g]));
            if !conflicts {
                placed[f] = true;
                in_group[f] = true;
                new_to_old.push(f);
            }
        }
        for &f in &new_to_old[group_start..] {
            in_group[f] = false;
        }
        group_sizes.push(new_to_old.len() - group_start);
        while first_unplaced < n_faces && placed[first_unplaced] {
            first_unplaced += 1;
        }
    }

    log::debug!(
        "independent face groups: {} faces in {} groups (max size {})",
        n_faces,
        group_sizes.len(),
        max_group_size
    );
    FaceGroups {
        new_to_old,
        group_sizes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn assert_independent(groups: &FaceGroups, face_cells: &[[usize; 2]]) {
        for g in 0..groups.n_groups() {
            let mut seen = HashSet::new();
            for &f in groups.group(g) {
                for c in face_cells[f] {
                    assert!(seen.insert(c), "cell {c} twice in group {g}");
                }
            }
        }
    }

    #[test]
    fn chain_alternates_two_groups() {
        let faces: Vec<[usize; 2]> = (0..6).map(|i| [i, i + 1]).collect();
        let groups = independent_face_groups(100, 7, &faces);
        assert_eq!(groups.new_to_old, vec![0, 2, 4, 1, 3, 5]);
        assert_eq!(groups.group_sizes, vec![3, 3]);
        assert_independent(&groups, &faces);
    }

    #[test]
    fn group_size_is_capped() {
        let faces: Vec<[usize; 2]> = (0..10).map(|i| [2 * i, 2 * i + 1]).collect();
        let groups = independent_face_groups(4, 20, &faces);
        assert_eq!(groups.group_sizes, vec![4, 4, 2]);
        assert_eq!(groups.new_to_old, (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn star_needs_one_group_per_face() {
        let faces: Vec<[usize; 2]> = (1..=5).map(|c| [0, c]).collect();
        let groups = independent_face_groups(10, 6, &faces);
        assert_eq!(groups.group_sizes, vec![1; 5]);
        assert_independent(&groups, &faces);
    }

    #[test]
    fn empty_input() {
        let groups = independent_face_groups(8, 3, &[]);
        assert!(groups.new_to_old.is_empty());
        assert_eq!(groups.n_groups(), 0);
    }
}
