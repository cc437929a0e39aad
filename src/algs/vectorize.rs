//! Face renumbering for vector registers.
//!
//! A face loop processed `vector_size` faces at a time (one register per
//! chunk `[k * V, (k + 1) * V)`) is free of write conflicts when no cell
//! appears twice in a register. These orderings are an alternative to
//! thread groups and produce a [`NumberingKind::Vectorized`] descriptor.
//!
//! [`NumberingKind::Vectorized`]: crate::data::numbering::NumberingKind::Vectorized

use std::cmp::Reverse;

use crate::algs::renumber::Permutation;
use crate::mesh_error::MeshRenumberError;

/// Parameters of [`renumber_i_faces_for_vectorizing`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VectorizeOptions {
    pub vector_size: usize,
    /// Placement attempts before giving up.
    pub max_passes: usize,
    /// A shuffle is forced every this many passes.
    pub shuffle_period: usize,
}

impl VectorizeOptions {
    pub fn new(vector_size: usize) -> Self {
        Self {
            vector_size,
            max_passes: 100,
            shuffle_period: 10,
        }
    }
}

fn check_vector_size(entity: &'static str, vector_size: usize) -> Result<(), MeshRenumberError> {
    if vector_size < 2 {
        return Err(MeshRenumberError::VectorizationFailed {
            entity,
            vector_size,
            reason: "vector size must be at least 2".into(),
        });
    }
    Ok(())
}

/// Swap faces from both ends of the order.
fn shuffle(order: &mut [usize]) {
    let n = order.len();
    for i in (0..n.saturating_sub(4) / 2).step_by(2) {
        order.swap(i, n - 1 - i);
    }
}

/// One greedy placement pass: position `j` receives the first face at or
/// after `j` that touches no cell already in register `j / V`.
fn place_pass(
    order: &mut [usize],
    face_cells: &[[usize; 2]],
    cell_register: &mut [usize],
    vector_size: usize,
) -> bool {
    cell_register.fill(usize::MAX);
    for j in 0..order.len() {
        let reg = j / vector_size;
        let Some(s) = (j..order.len()).find(|&s| {
            let [c0, c1] = face_cells[order[s]];
            cell_register[c0] != reg && cell_register[c1] != reg
        }) else {
            return false;
        };
        order.swap(j, s);
        let [c0, c1] = face_cells[order[j]];
        cell_register[c0] = reg;
        cell_register[c1] = reg;
    }
    true
}

/// Order interior faces so that no register of `opts.vector_size` faces
/// touches a cell twice.
pub fn renumber_i_faces_for_vectorizing(
    n_cells_ext: usize,
    face_cells: &[[usize; 2]],
    opts: &VectorizeOptions,
) -> Result<Permutation, MeshRenumberError> {
    check_vector_size("interior faces", opts.vector_size)?;
    let mut order: Vec<usize> = (0..face_cells.len()).collect();
    let mut cell_register = vec![usize::MAX; n_cells_ext];
    let period = opts.shuffle_period.max(1);

    let mut failed = false;
    for pass in 0..opts.max_passes {
        if failed || (pass > 0 && pass % period == 0) {
            shuffle(&mut order);
        }
        if place_pass(&mut order, face_cells, &mut cell_register, opts.vector_size) {
            log::debug!(
                "interior faces vectorized for size {} after {} passes",
                opts.vector_size,
                pass + 1
            );
            return Permutation::from_new_to_old(order);
        }
        failed = true;
    }
    Err(MeshRenumberError::VectorizationFailed {
        entity: "interior faces",
        vector_size: opts.vector_size,
        reason: format!("no conflict-free order after {} passes", opts.max_passes),
    })
}

/// Order boundary faces so that no register of `vector_size` faces touches
/// a cell twice. Faces of the busiest cells are placed first and dealt
/// across registers column by column.
pub fn renumber_b_faces_for_vectorizing(
    n_cells: usize,
    b_face_cells: &[usize],
    vector_size: usize,
) -> Result<Permutation, MeshRenumberError> {
    check_vector_size("boundary faces", vector_size)?;
    let n_faces = b_face_cells.len();
    let n_full = n_faces / vector_size;
    let remainder = n_faces % vector_size;
    let n_registers = n_full + usize::from(remainder > 0);

    let mut count = vec![0usize; n_cells];
    for &c in b_face_cells {
        count[c] += 1;
    }
    let max_count = count.iter().copied().max().unwrap_or(0);
    let n_busiest = count.iter().filter(|&&c| c == max_count).count();
    if max_count > n_full + 1 || (max_count == n_full + 1 && n_busiest > remainder) {
        return Err(MeshRenumberError::VectorizationFailed {
            entity: "boundary faces",
            vector_size,
            reason: format!(
                "a cell owns {max_count} boundary faces for {n_registers} registers"
            ),
        });
    }

    let mut faces: Vec<usize> = (0..n_faces).collect();
    faces.sort_by_key(|&f| (Reverse(count[b_face_cells[f]]), b_face_cells[f], f));

    let slots = (0..vector_size)
        .flat_map(|lane| (0..n_registers).map(move |reg| reg * vector_size + lane))
        .filter(|&pos| pos < n_faces);
    let mut new_to_old = vec![0; n_faces];
    for (pos, f) in slots.zip(faces) {
        new_to_old[pos] = f;
    }

    for (reg, chunk) in new_to_old.chunks(vector_size).enumerate() {
        for (i, &a) in chunk.iter().enumerate() {
            if chunk[i + 1..].iter().any(|&b| b_face_cells[b] == b_face_cells[a]) {
                return Err(MeshRenumberError::VectorizationFailed {
                    entity: "boundary faces",
                    vector_size,
                    reason: format!("cell {} repeated in register {reg}", b_face_cells[a]),
                });
            }
        }
    }
    Permutation::from_new_to_old(new_to_old)
}
