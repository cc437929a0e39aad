//! Renumbering utilities: validated permutations and the connectivity
//! rewrite that applies them to a [`FaceMesh`].
//!
//! Every array indexed by cell or face is gathered through `new_to_old`,
//! every array holding cell ids is translated through `old_to_new`. Ghost
//! cells (`n_cells..n_cells_with_ghosts`) always map to themselves.
//!
//! Collaborators that cache mesh-indexed data (halo exchange, output
//! writers) are told through a [`RenumberListener`].

use rayon::prelude::*;

use crate::data::numbering::{GroupIndex, Numbering};
use crate::mesh_error::MeshRenumberError;
use crate::topology::mesh::{CellCells, FaceMesh, FaceVertices};

/// A bijection on `0..n`, stored as `new_to_old`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Permutation {
    new_to_old: Vec<usize>,
}

impl Permutation {
    pub fn identity(n: usize) -> Self {
        Self {
            new_to_old: (0..n).collect(),
        }
    }

    /// Validate that `new_to_old` hits every id of `0..len` exactly once.
    pub fn from_new_to_old(new_to_old: Vec<usize>) -> Result<Self, MeshRenumberError> {
        let n = new_to_old.len();
        let mut seen = vec![false; n];
        for (new, &old) in new_to_old.iter().enumerate() {
            if old >= n {
                return Err(MeshRenumberError::InvalidPermutation(format!(
                    "entry {new} maps to {old}, outside 0..{n}"
                )));
            }
            if std::mem::replace(&mut seen[old], true) {
                return Err(MeshRenumberError::InvalidPermutation(format!(
                    "old id {old} appears more than once"
                )));
            }
        }
        Ok(Self { new_to_old })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.new_to_old.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.new_to_old.is_empty()
    }

    #[inline]
    pub fn new_to_old(&self) -> &[usize] {
        &self.new_to_old
    }

    pub fn into_new_to_old(self) -> Vec<usize> {
        self.new_to_old
    }

    /// Inverse map: `old_to_new[new_to_old[i]] == i`.
    pub fn old_to_new(&self) -> Vec<usize> {
        let mut inv = vec![0; self.len()];
        for (new, &old) in self.new_to_old.iter().enumerate() {
            inv[old] = new;
        }
        inv
    }

    pub fn is_identity(&self) -> bool {
        self.new_to_old.iter().enumerate().all(|(i, &o)| i == o)
    }

    /// Gather `values` into new order.
    pub fn permute<T: Clone + Send + Sync>(&self, values: &[T]) -> Vec<T> {
        self.new_to_old
            .par_iter()
            .map(|&old| values[old].clone())
            .collect()
    }
}

/// Face permutation plus the thread/group ranges valid in the new order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ThreadedFaceNumbering {
    pub new_to_old: Permutation,
    pub group_index: GroupIndex,
}

impl ThreadedFaceNumbering {
    /// Split into the permutation to apply and the numbering descriptor.
    pub fn into_parts(self) -> Result<(Permutation, Numbering), MeshRenumberError> {
        let n = self.new_to_old.len();
        let numbering = Numbering::threaded(self.group_index, n)?;
        Ok((self.new_to_old, numbering))
    }
}

/// Observer of connectivity rewrites. All methods default to no-ops.
pub trait RenumberListener {
    /// Cell ids changed; `old_to_new` spans ghosts too (identity on them).
    fn halo_cells_renumbered(&mut self, _old_to_new: &[usize]) {}
    /// Local cells were reordered.
    fn cells_renumbered(&mut self, _new_to_old: &[usize]) {}
    /// Interior and/or boundary faces were reordered.
    fn faces_renumbered(&mut self, _i_new_to_old: Option<&[usize]>, _b_new_to_old: Option<&[usize]>) {}
}

/// Listener that ignores every notification.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoListener;

impl RenumberListener for NoListener {}

fn check_len(
    entity: &'static str,
    perm: &Permutation,
    expected: usize,
) -> Result<(), MeshRenumberError> {
    if perm.len() != expected {
        return Err(MeshRenumberError::PermutationLength {
            entity,
            expected,
            found: perm.len(),
        });
    }
    Ok(())
}

fn permute_face_vertices(fv: &FaceVertices, perm: &Permutation) -> FaceVertices {
    let mut index = Vec::with_capacity(fv.index.len());
    let mut list = Vec::with_capacity(fv.list.len());
    index.push(0);
    for &old in perm.new_to_old() {
        list.extend_from_slice(fv.vertices(old));
        index.push(list.len());
    }
    FaceVertices { index, list }
}

/// 1-based global numbers in new order, created from the old local order
/// when the mesh had none.
fn permute_global_num(global: &Option<Vec<u64>>, perm: &Permutation) -> Vec<u64> {
    match global {
        Some(g) => perm.permute(g),
        None => perm.new_to_old().iter().map(|&o| o as u64 + 1).collect(),
    }
}

/// Reorder local cells and translate every cell reference.
pub fn apply_cell_renumbering<L>(
    mesh: &mut FaceMesh,
    perm: &Permutation,
    listener: &mut L,
) -> Result<(), MeshRenumberError>
where
    L: RenumberListener + ?Sized,
{
    check_len("cells", perm, mesh.n_cells)?;
    if perm.is_identity() {
        return Ok(());
    }

    let mut new_cell_id: Vec<usize> = (0..mesh.n_cells_with_ghosts).collect();
    for (new, &old) in perm.new_to_old().iter().enumerate() {
        new_cell_id[old] = new;
    }
    listener.halo_cells_renumbered(&new_cell_id);

    mesh.i_face_cells
        .par_iter_mut()
        .for_each(|fc| *fc = [new_cell_id[fc[0]], new_cell_id[fc[1]]]);
    mesh.b_face_cells
        .par_iter_mut()
        .for_each(|c| *c = new_cell_id[*c]);

    if let Some(cc) = &mesh.cell_cells {
        let mut index = Vec::with_capacity(cc.index.len());
        let mut list = Vec::with_capacity(cc.list.len());
        index.push(0);
        for &old in perm.new_to_old() {
            list.extend(cc.neighbors(old).iter().map(|&c| new_cell_id[c]));
            index.push(list.len());
        }
        mesh.cell_cells = Some(CellCells { index, list });
    }

    if let Some(family) = &mesh.cell_family {
        mesh.cell_family = Some(perm.permute(family));
    }
    mesh.global_cell_num = Some(permute_global_num(&mesh.global_cell_num, perm));

    listener.cells_renumbered(perm.new_to_old());
    Ok(())
}

/// Reorder interior and/or boundary faces with their vertex lists,
/// families and global numbers.
pub fn apply_face_renumbering<L>(
    mesh: &mut FaceMesh,
    i_perm: Option<&Permutation>,
    b_perm: Option<&Permutation>,
    listener: &mut L,
) -> Result<(), MeshRenumberError>
where
    L: RenumberListener + ?Sized,
{
    if let Some(p) = i_perm {
        check_len("interior faces", p, mesh.n_i_faces())?;
    }
    if let Some(p) = b_perm {
        check_len("boundary faces", p, mesh.n_b_faces())?;
    }
    let i_perm = i_perm.filter(|p| !p.is_identity());
    let b_perm = b_perm.filter(|p| !p.is_identity());

    if let Some(p) = i_perm {
        mesh.i_face_cells = p.permute(&mesh.i_face_cells);
        if let Some(fv) = &mesh.i_face_vtx {
            mesh.i_face_vtx = Some(permute_face_vertices(fv, p));
        }
        if let Some(family) = &mesh.i_face_family {
            mesh.i_face_family = Some(p.permute(family));
        }
        mesh.global_i_face_num = Some(permute_global_num(&mesh.global_i_face_num, p));
    }
    if let Some(p) = b_perm {
        mesh.b_face_cells = p.permute(&mesh.b_face_cells);
        if let Some(fv) = &mesh.b_face_vtx {
            mesh.b_face_vtx = Some(permute_face_vertices(fv, p));
        }
        if let Some(family) = &mesh.b_face_family {
            mesh.b_face_family = Some(p.permute(family));
        }
        mesh.global_b_face_num = Some(permute_global_num(&mesh.global_b_face_num, p));
    }

    if i_perm.is_some() || b_perm.is_some() {
        listener.faces_renumbered(
            i_perm.map(Permutation::new_to_old),
            b_perm.map(Permutation::new_to_old),
        );
    }
    Ok(())
}
