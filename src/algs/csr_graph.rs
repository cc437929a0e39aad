//! Compressed-sparse-row graphs derived from interior face → cell connectivity.
//!
//! Both builders run the same two-pass counting scheme: count entries per
//! row, prefix-sum the counts into offsets, then scatter. The cell → cell
//! graph additionally sorts and deduplicates each row; the cell → face graph
//! keeps faces in scatter (increasing face id) order.

use crate::algs::lexical::sort_local;
use crate::debug_invariants::{DebugInvariants, check_offsets};
use crate::mesh_error::MeshRenumberError;

/// CSR adjacency over `n_rows` rows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CsrGraph {
    /// Offsets into `col_id` for each row (`n_rows + 1` entries).
    pub row_index: Vec<usize>,
    /// Column ids, row after row.
    pub col_id: Vec<usize>,
    /// Largest row length.
    pub n_cols_max: usize,
}

impl CsrGraph {
    #[inline]
    pub fn n_rows(&self) -> usize {
        self.row_index.len().saturating_sub(1)
    }

    /// Column ids of row `i`.
    #[inline]
    pub fn row(&self, i: usize) -> &[usize] {
        &self.col_id[self.row_index[i]..self.row_index[i + 1]]
    }

    #[inline]
    pub fn degree(&self, i: usize) -> usize {
        self.row_index[i + 1] - self.row_index[i]
    }

    /// Cell → cell adjacency over `n_cells_ext` cells (ghosts included).
    /// Rows are sorted and free of duplicates.
    pub fn cell_cells(n_cells_ext: usize, face_cells: &[[usize; 2]]) -> Self {
        let mut graph = scatter(n_cells_ext, face_cells, |_, other| other);

        // compact each sorted row in place
        let mut write = 0;
        let mut row_start = 0;
        for i in 0..n_cells_ext {
            let row_end = graph.row_index[i + 1];
            sort_local(&mut graph.col_id[row_start..row_end]);
            graph.row_index[i] = write;
            let mut prev = None;
            for k in row_start..row_end {
                let c = graph.col_id[k];
                if prev != Some(c) {
                    graph.col_id[write] = c;
                    write += 1;
                    prev = Some(c);
                }
            }
            row_start = row_end;
        }
        graph.row_index[n_cells_ext] = write;
        graph.col_id.truncate(write);
        graph.col_id.shrink_to_fit();
        graph.n_cols_max = (0..n_cells_ext).map(|i| graph.degree(i)).max().unwrap_or(0);

        crate::debug_invariants!(graph.validate_invariants(), "cell->cell CSR");
        graph
    }

    /// Cell → face adjacency over `n_cells_ext` cells; rows list interior
    /// faces in increasing id order.
    pub fn cell_faces(n_cells_ext: usize, face_cells: &[[usize; 2]]) -> Self {
        let graph = scatter(n_cells_ext, face_cells, |face, _| face);
        crate::debug_invariants!(graph.validate_invariants(), "cell->face CSR");
        graph
    }
}

/// Two-pass counting build: every face contributes one entry to the row of
/// each of its cells, with the value chosen by `entry(face, other_cell)`.
fn scatter<F>(n_rows: usize, face_cells: &[[usize; 2]], entry: F) -> CsrGraph
where
    F: Fn(usize, usize) -> usize,
{
    let mut count = vec![0usize; n_rows];
    for &[c0, c1] in face_cells {
        count[c0] += 1;
        count[c1] += 1;
    }

    let mut row_index = Vec::with_capacity(n_rows + 1);
    row_index.push(0);
    let mut acc = 0;
    for &n in &count {
        acc += n;
        row_index.push(acc);
    }
    let n_cols_max = count.iter().copied().max().unwrap_or(0);

    count.fill(0);
    let mut col_id = vec![0usize; acc];
    for (face, &[c0, c1]) in face_cells.iter().enumerate() {
        col_id[row_index[c0] + count[c0]] = entry(face, c1);
        count[c0] += 1;
        col_id[row_index[c1] + count[c1]] = entry(face, c0);
        count[c1] += 1;
    }

    CsrGraph {
        row_index,
        col_id,
        n_cols_max,
    }
}

impl DebugInvariants for CsrGraph {
    fn debug_assert_invariants(&self) {
        crate::debug_invariants!(self.validate_invariants(), "CsrGraph");
    }

    fn validate_invariants(&self) -> Result<(), MeshRenumberError> {
        check_offsets("csr graph", &self.row_index, self.n_rows(), self.col_id.len())?;
        let widest = (0..self.n_rows()).map(|i| self.degree(i)).max().unwrap_or(0);
        if widest != self.n_cols_max {
            return Err(MeshRenumberError::InvariantViolation(format!(
                "n_cols_max {} but widest row has {} entries",
                self.n_cols_max, widest
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // 0 - 1 - 2 plus a duplicated face between 1 and 2, and a ghost 3 on 2
    fn faces() -> Vec<[usize; 2]> {
        vec![[0, 1], [2, 1], [1, 2], [2, 3]]
    }

    #[test]
    fn cell_cells_sorted_and_deduplicated() {
        let g = CsrGraph::cell_cells(4, &faces());
        assert_eq!(g.n_rows(), 4);
        assert_eq!(g.row(0), &[1]);
        assert_eq!(g.row(1), &[0, 2]);
        assert_eq!(g.row(2), &[1, 3]);
        assert_eq!(g.row(3), &[2]);
        assert_eq!(g.n_cols_max, 2);
        assert!(g.validate_invariants().is_ok());
    }

    #[test]
    fn duplicate_links_release_their_storage() {
        // every pair listed three times
        let faces: Vec<[usize; 2]> = (0..40).flat_map(|c| [[c, c + 1], [c + 1, c], [c, c + 1]]).collect();
        let g = CsrGraph::cell_cells(41, &faces);
        assert_eq!(g.col_id.len(), 80);
        assert_eq!(g.col_id.capacity(), g.col_id.len());
    }

    #[test]
    fn cell_faces_keep_face_order() {
        let g = CsrGraph::cell_faces(4, &faces());
        assert_eq!(g.row(1), &[0, 1, 2]);
        assert_eq!(g.row(2), &[1, 2, 3]);
        assert_eq!(g.row(3), &[3]);
        assert_eq!(g.n_cols_max, 3);
        assert_eq!(g.col_id.len(), 2 * faces().len());
    }

    #[test]
    fn isolated_cells_and_empty_mesh() {
        let g = CsrGraph::cell_cells(3, &[]);
        assert_eq!(g.row_index, vec![0, 0, 0, 0]);
        assert_eq!(g.n_cols_max, 0);
        let g = CsrGraph::cell_faces(0, &[]);
        assert_eq!(g.n_rows(), 0);
    }

    #[test]
    fn long_rows_use_heap_sort() {
        // star: cell 0 touches 30 others, listed in reverse
        let faces: Vec<[usize; 2]> = (1..=30).rev().map(|c| [c, 0]).collect();
        let g = CsrGraph::cell_cells(31, &faces);
        assert_eq!(g.row(0), (1..=30).collect::<Vec<_>>().as_slice());
    }
}
