//! Face-based mesh connectivity consumed and rewritten by the renumbering.
//!
//! [`FaceMesh`] is a deliberately thin model of a finite-volume mesh: cells
//! are `0..n_cells` (local) followed by `n_cells..n_cells_with_ghosts`
//! (ghosts owned by other ranks), interior faces join two cells and boundary
//! faces hang off one local cell. Everything else (vertices, families,
//! global numbers, extended neighborhood) is optional and is kept in sync by
//! [`crate::algs::renumber`].

use crate::data::numbering::Numbering;
use crate::debug_invariants::{DebugInvariants, check_offsets};
use crate::mesh_error::MeshRenumberError;

/// Face → vertex connectivity in CSR form (`index.len() == n_faces + 1`).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FaceVertices {
    pub index: Vec<usize>,
    pub list: Vec<usize>,
}

impl FaceVertices {
    /// Build from per-face vertex lists.
    pub fn from_lists<I, L>(faces: I) -> Self
    where
        I: IntoIterator<Item = L>,
        L: AsRef<[usize]>,
    {
        let mut index = vec![0];
        let mut list = Vec::new();
        for f in faces {
            list.extend_from_slice(f.as_ref());
            index.push(list.len());
        }
        Self { index, list }
    }

    #[inline]
    pub fn n_faces(&self) -> usize {
        self.index.len().saturating_sub(1)
    }

    /// Vertices of face `f`.
    #[inline]
    pub fn vertices(&self, f: usize) -> &[usize] {
        &self.list[self.index[f]..self.index[f + 1]]
    }
}

/// Extended cell → cell neighborhood (cells sharing only a vertex), CSR over
/// local cells. Entries may name ghost cells.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CellCells {
    pub index: Vec<usize>,
    pub list: Vec<usize>,
}

impl CellCells {
    #[inline]
    pub fn neighbors(&self, c: usize) -> &[usize] {
        &self.list[self.index[c]..self.index[c + 1]]
    }
}

/// Mesh state touched by renumbering.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FaceMesh {
    pub n_cells: usize,
    pub n_cells_with_ghosts: usize,
    /// Interior face → (cell, cell).
    pub i_face_cells: Vec<[usize; 2]>,
    /// Boundary face → local cell.
    pub b_face_cells: Vec<usize>,
    pub i_face_vtx: Option<FaceVertices>,
    pub b_face_vtx: Option<FaceVertices>,
    pub cell_cells: Option<CellCells>,
    pub cell_family: Option<Vec<i32>>,
    pub i_face_family: Option<Vec<i32>>,
    pub b_face_family: Option<Vec<i32>>,
    /// 1-based global numbers.
    pub global_cell_num: Option<Vec<u64>>,
    pub global_i_face_num: Option<Vec<u64>>,
    pub global_b_face_num: Option<Vec<u64>>,
    pub i_face_numbering: Option<Numbering>,
    pub b_face_numbering: Option<Numbering>,
    /// Number of ranks sharing the global mesh.
    pub n_domains: usize,
    /// Diagnostic level; bandwidth info is logged when positive.
    pub verbosity: i32,
}

impl FaceMesh {
    /// Mesh with `n_cells` local cells followed by `n_ghost_cells` ghosts.
    ///
    /// Interior faces may reference ghosts, boundary faces only local cells,
    /// and no interior face may join a cell to itself.
    pub fn new(
        n_cells: usize,
        n_ghost_cells: usize,
        i_face_cells: Vec<[usize; 2]>,
        b_face_cells: Vec<usize>,
    ) -> Result<Self, MeshRenumberError> {
        let mesh = Self {
            n_cells,
            n_cells_with_ghosts: n_cells + n_ghost_cells,
            i_face_cells,
            b_face_cells,
            n_domains: 1,
            ..Default::default()
        };
        mesh.validate_invariants()?;
        Ok(mesh)
    }

    pub fn with_face_vertices(
        mut self,
        i_face_vtx: FaceVertices,
        b_face_vtx: FaceVertices,
    ) -> Result<Self, MeshRenumberError> {
        self.i_face_vtx = Some(i_face_vtx);
        self.b_face_vtx = Some(b_face_vtx);
        self.validate_invariants()?;
        Ok(self)
    }

    pub fn with_cell_cells(mut self, cell_cells: CellCells) -> Result<Self, MeshRenumberError> {
        self.cell_cells = Some(cell_cells);
        self.validate_invariants()?;
        Ok(self)
    }

    #[inline]
    pub fn n_i_faces(&self) -> usize {
        self.i_face_cells.len()
    }

    #[inline]
    pub fn n_b_faces(&self) -> usize {
        self.b_face_cells.len()
    }

    #[inline]
    pub fn n_ghost_cells(&self) -> usize {
        self.n_cells_with_ghosts - self.n_cells
    }
}

fn check_len<T>(
    entity: &'static str,
    values: &Option<Vec<T>>,
    expected: usize,
) -> Result<(), MeshRenumberError> {
    match values {
        Some(v) if v.len() != expected => Err(MeshRenumberError::ConnectivityMismatch {
            entity,
            reason: format!("{} entries, expected {}", v.len(), expected),
        }),
        _ => Ok(()),
    }
}

impl DebugInvariants for FaceMesh {
    fn debug_assert_invariants(&self) {
        crate::debug_invariants!(self.validate_invariants(), "FaceMesh");
    }

    fn validate_invariants(&self) -> Result<(), MeshRenumberError> {
        if self.n_cells_with_ghosts < self.n_cells {
            return Err(MeshRenumberError::InvariantViolation(format!(
                "{} cells with ghosts < {} local cells",
                self.n_cells_with_ghosts, self.n_cells
            )));
        }
        for (face, &[c0, c1]) in self.i_face_cells.iter().enumerate() {
            for cell in [c0, c1] {
                if cell >= self.n_cells_with_ghosts {
                    return Err(MeshRenumberError::CellOutOfRange {
                        face,
                        cell,
                        n_cells: self.n_cells_with_ghosts,
                    });
                }
            }
            if c0 == c1 {
                return Err(MeshRenumberError::DegenerateFace { face, cell: c0 });
            }
        }
        if let Some((face, &cell)) = self
            .b_face_cells
            .iter()
            .enumerate()
            .find(|&(_, &c)| c >= self.n_cells)
        {
            return Err(MeshRenumberError::CellOutOfRange {
                face,
                cell,
                n_cells: self.n_cells,
            });
        }
        if let Some(fv) = &self.i_face_vtx {
            check_offsets("interior face vertices", &fv.index, self.n_i_faces(), fv.list.len())?;
        }
        if let Some(fv) = &self.b_face_vtx {
            check_offsets("boundary face vertices", &fv.index, self.n_b_faces(), fv.list.len())?;
        }
        if let Some(cc) = &self.cell_cells {
            check_offsets("cell cells", &cc.index, self.n_cells, cc.list.len())?;
            if let Some(&c) = cc.list.iter().find(|&&c| c >= self.n_cells_with_ghosts) {
                return Err(MeshRenumberError::ConnectivityMismatch {
                    entity: "cell cells",
                    reason: format!("neighbor {c} beyond {} cells", self.n_cells_with_ghosts),
                });
            }
        }
        check_len("cell family", &self.cell_family, self.n_cells)?;
        check_len("interior face family", &self.i_face_family, self.n_i_faces())?;
        check_len("boundary face family", &self.b_face_family, self.n_b_faces())?;
        check_len("global cell numbers", &self.global_cell_num, self.n_cells)?;
        check_len("global interior face numbers", &self.global_i_face_num, self.n_i_faces())?;
        check_len("global boundary face numbers", &self.global_b_face_num, self.n_b_faces())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_validates_face_cells() {
        assert!(FaceMesh::new(2, 1, vec![[0, 1], [1, 2]], vec![0]).is_ok());
        assert_eq!(
            FaceMesh::new(2, 0, vec![[0, 2]], vec![]).unwrap_err(),
            MeshRenumberError::CellOutOfRange {
                face: 0,
                cell: 2,
                n_cells: 2
            }
        );
        // boundary faces may not touch ghosts
        assert!(FaceMesh::new(2, 1, vec![[0, 1]], vec![2]).is_err());
        assert_eq!(
            FaceMesh::new(2, 0, vec![[1, 1]], vec![]).unwrap_err(),
            MeshRenumberError::DegenerateFace { face: 0, cell: 1 }
        );
    }

    #[test]
    fn face_vertices_from_lists() {
        let fv = FaceVertices::from_lists([vec![0, 1], vec![1, 2, 3]]);
        assert_eq!(fv.index, vec![0, 2, 5]);
        assert_eq!(fv.vertices(1), &[1, 2, 3]);
        assert_eq!(fv.n_faces(), 2);
    }

    #[test]
    fn optional_arrays_checked_against_counts() {
        let mut mesh = FaceMesh::new(3, 0, vec![[0, 1], [1, 2]], vec![0, 2]).unwrap();
        mesh.cell_family = Some(vec![1, 1]);
        assert!(mesh.validate_invariants().is_err());
        mesh.cell_family = Some(vec![1, 1, 2]);
        assert!(mesh.validate_invariants().is_ok());
        let bad = FaceVertices::from_lists([vec![0, 1]]);
        let good_b = FaceVertices::from_lists([vec![0], vec![1]]);
        assert!(mesh.with_face_vertices(bad, good_b).is_err());
    }
}
