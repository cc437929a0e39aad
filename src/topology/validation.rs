//! Validation of face numberings against concurrent write conflicts.
//!
//! For thread numberings every group is replayed with one rayon task per
//! thread range, counting cell updates atomically; the total must equal the
//! number of face-cell incidences. When it does, a serial pass checks that
//! no cell is reached by two threads inside one group. For vectorized
//! numberings, a cell may appear at most once per vector register.

use std::sync::atomic::{AtomicU64, Ordering};

use rayon::prelude::*;

use crate::algs::communicator::Communicator;
use crate::data::numbering::{GroupIndex, Numbering, NumberingKind};
use crate::mesh_error::MeshRenumberError;
use crate::topology::mesh::FaceMesh;

/// Conflicts found on this rank.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct ConflictCounts {
    pub interior: u64,
    pub boundary: u64,
}

impl ConflictCounts {
    #[inline]
    pub fn is_clean(&self) -> bool {
        self.interior == 0 && self.boundary == 0
    }
}

/// Face → cells view shared by interior (two cells) and boundary (one) faces.
trait FaceCells: Sync {
    fn n_faces(&self) -> usize;
    fn cells(&self, f: usize) -> &[usize];
}

impl FaceCells for [[usize; 2]] {
    fn n_faces(&self) -> usize {
        self.len()
    }
    fn cells(&self, f: usize) -> &[usize] {
        &self[f]
    }
}

impl FaceCells for [usize] {
    fn n_faces(&self) -> usize {
        self.len()
    }
    fn cells(&self, f: usize) -> &[usize] {
        std::slice::from_ref(&self[f])
    }
}

/// Replay each group concurrently and compare the number of cell updates
/// with the expected incidence count.
fn coverage_errors<F: FaceCells + ?Sized>(
    faces: &F,
    n_cells: usize,
    cells_per_face: u64,
    index: &GroupIndex,
) -> u64 {
    let n_faces = faces.n_faces();
    let updates: Vec<AtomicU64> = (0..n_cells).map(|_| AtomicU64::new(0)).collect();
    let out_of_range = AtomicU64::new(0);
    for g in 0..index.n_groups() {
        (0..index.n_threads()).into_par_iter().for_each(|t| {
            let Some(range) = index.range(t, g) else {
                return;
            };
            for f in range {
                if f >= n_faces {
                    out_of_range.fetch_add(1, Ordering::Relaxed);
                    continue;
                }
                for &c in faces.cells(f) {
                    if c < n_cells {
                        updates[c].fetch_add(1, Ordering::Relaxed);
                    }
                }
            }
        });
    }
    let total: u64 = updates.iter().map(|u| u.load(Ordering::Relaxed)).sum();
    let expected = cells_per_face * n_faces as u64;
    expected.abs_diff(total) + out_of_range.into_inner()
}

/// Cells reached by more than one thread inside a group.
fn ownership_conflicts<F: FaceCells + ?Sized>(faces: &F, n_cells: usize, index: &GroupIndex) -> u64 {
    let mut owner: Vec<Option<(usize, usize)>> = vec![None; n_cells];
    let mut conflicts = 0;
    for (g, t, range) in index.iter() {
        for f in range {
            for &c in faces.cells(f) {
                if c >= n_cells {
                    continue;
                }
                match owner[c] {
                    Some((og, ot)) if og == g && ot != t => conflicts += 1,
                    _ => owner[c] = Some((g, t)),
                }
            }
        }
    }
    conflicts
}

/// Cells appearing twice within one register of `vector_size` faces.
fn register_conflicts<F: FaceCells + ?Sized>(faces: &F, n_cells: usize, vector_size: usize) -> u64 {
    let mut last_register: Vec<Option<usize>> = vec![None; n_cells];
    let mut conflicts = 0;
    for f in 0..faces.n_faces() {
        let reg = f / vector_size.max(1);
        for &c in faces.cells(f) {
            if c >= n_cells {
                continue;
            }
            if last_register[c] == Some(reg) {
                conflicts += 1;
            } else {
                last_register[c] = Some(reg);
            }
        }
    }
    conflicts
}

fn numbering_conflicts<F: FaceCells + ?Sized>(
    faces: &F,
    n_cells: usize,
    cells_per_face: u64,
    numbering: Option<&Numbering>,
) -> u64 {
    let Some(numbering) = numbering else {
        return 0;
    };
    match numbering.kind() {
        NumberingKind::Serial | NumberingKind::Threads => {
            let index = numbering.group_index();
            let errors = coverage_errors(faces, n_cells, cells_per_face, index);
            if errors > 0 {
                errors
            } else {
                ownership_conflicts(faces, n_cells, index)
            }
        }
        NumberingKind::Vectorized { vector_size } => register_conflicts(faces, n_cells, vector_size),
    }
}

/// Count conflicts of the interior and boundary face numberings of `mesh`.
pub fn count_renumbering_conflicts(mesh: &FaceMesh) -> ConflictCounts {
    ConflictCounts {
        interior: numbering_conflicts(
            mesh.i_face_cells.as_slice(),
            mesh.n_cells_with_ghosts,
            2,
            mesh.i_face_numbering.as_ref(),
        ),
        boundary: numbering_conflicts(
            mesh.b_face_cells.as_slice(),
            mesh.n_cells,
            1,
            mesh.b_face_numbering.as_ref(),
        ),
    }
}

/// Sum conflict counts over all ranks; any conflict is an error.
pub fn validate_renumbering<C: Communicator>(
    mesh: &FaceMesh,
    comm: &C,
) -> Result<ConflictCounts, MeshRenumberError> {
    let local = count_renumbering_conflicts(mesh);
    let global = comm.all_reduce_sum_u64(&[local.interior, local.boundary]);
    let (interior, boundary) = (global[0], global[1]);
    if interior > 0 || boundary > 0 {
        return Err(MeshRenumberError::ConflictsDetected { interior, boundary });
    }
    Ok(local)
}
