//! Multipass interior face renumbering for threads.
//!
//! Each pass splits the (remaining) cells into contiguous blocks, one per
//! thread, and gives a thread every face whose two cells lie in its block.
//! Faces straddling two blocks are left for the next pass, whose cells are
//! first renumbered densely in visiting order. Once no more than
//! `min_subset_size` faces remain, they form a final single-thread group.
//!
//! Inside a pass, block boundaries are nudged once to even out face counts
//! (see [`ThreadBlocks::redistribute`]); the nudge is undone when it makes the
//! imbalance worse.

use rayon::prelude::*;

use crate::algs::lexical::{order_lexical, reorder_lexical};
use crate::algs::renumber::{Permutation, ThreadedFaceNumbering};
use crate::data::numbering::GroupIndex;
use crate::mesh_error::MeshRenumberError;

/// Parameters of [`renumber_multipass`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MultipassOptions {
    pub n_threads: usize,
    /// Passes stop once at most this many faces remain; a pass never uses
    /// more threads than `remaining / min_subset_size`.
    pub min_subset_size: usize,
    /// Fraction of a thread's surplus or deficit moved by redistribution.
    pub relaxation: f64,
}

impl MultipassOptions {
    pub fn new(n_threads: usize, min_subset_size: usize) -> Self {
        Self {
            n_threads,
            min_subset_size,
            relaxation: 0.5,
        }
    }
}

/// Cell blocks of one pass and the faces they captured.
#[derive(Debug, Clone)]
struct ThreadBlocks {
    /// Block boundaries, `n_active + 1` entries.
    cell_index: Vec<usize>,
    n_faces: Vec<usize>,
    /// Position (in the face list) of the last face of each thread.
    last_face: Vec<Option<usize>>,
}

impl ThreadBlocks {
    fn uniform(n_cells: usize, n_active: usize) -> Self {
        Self {
            cell_index: (0..=n_active).map(|t| t * n_cells / n_active).collect(),
            n_faces: vec![0; n_active],
            last_face: vec![None; n_active],
        }
    }

    #[inline]
    fn n_active(&self) -> usize {
        self.n_faces.len()
    }

    fn total(&self) -> usize {
        self.n_faces.iter().sum()
    }

    /// `max / mean - 1` over active threads.
    fn imbalance(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            return 0.0;
        }
        let max = self.n_faces.iter().copied().max().unwrap_or(0);
        let mean = total as f64 / self.n_active() as f64;
        max as f64 / mean - 1.0
    }

    /// Tag every face lying entirely inside one block with `tag0 + block`,
    /// clear the tag of the others. `faces` must be sorted by first cell.
    fn assign(
        &mut self,
        faces: &[usize],
        face_cells: &[[usize; 2]],
        face_thread: &mut [Option<usize>],
        tag0: usize,
    ) {
        self.n_faces.fill(0);
        self.last_face.fill(None);
        let mut t = 0;
        for (pos, &f) in faces.iter().enumerate() {
            let [c0, c1] = face_cells[f];
            while c0 >= self.cell_index[t + 1] {
                t += 1;
            }
            if c0 >= self.cell_index[t] && c1 < self.cell_index[t + 1] {
                face_thread[f] = Some(tag0 + t);
                self.n_faces[t] += 1;
                self.last_face[t] = Some(pos);
            } else {
                face_thread[f] = None;
            }
        }
    }

    /// Move each boundary between blocks `t` and `t + 1` by a relaxed share
    /// of thread `t`'s distance to the mean face count, whole cells at a
    /// time, then reassign. Reverted if the imbalance grows.
    fn redistribute(
        &mut self,
        faces: &[usize],
        face_cells: &[[usize; 2]],
        face_thread: &mut [Option<usize>],
        tag0: usize,
        relaxation: f64,
    ) {
        let n_active = self.n_active();
        if n_active < 2 || faces.is_empty() {
            return;
        }
        let saved = self.cell_index.clone();
        let before = self.imbalance();
        let mean = self.total() / n_active;
        let c0_at = |pos: usize| face_cells[faces[pos]][0];
        let last_pos = faces.len() - 1;

        for t in 0..n_active - 1 {
            let t0_start = self.cell_index[t];
            let t1_start = self.cell_index[t + 1];
            let t1_end = self.cell_index[t + 2];
            let mut n_move = ((self.n_faces[t] as f64 - mean as f64) * relaxation) as isize;

            if n_move > 0 {
                let Some(last) = self.last_face[t] else {
                    continue;
                };
                let mut pos = last as isize;
                while pos >= 0 && c0_at(pos as usize) >= t0_start && n_move > 0 {
                    if face_thread[faces[pos as usize]] == Some(tag0 + t) {
                        n_move -= 1;
                    }
                    pos -= 1;
                }
                let cut = pos.max(0) as usize;
                self.cell_index[t + 1] = (c0_at(cut) + 1).clamp(t0_start, t1_start);
            } else if n_move < 0 {
                let start = match self.last_face[t] {
                    Some(p) => p,
                    None => faces.partition_point(|&f| face_cells[f][0] < t0_start),
                };
                let limit = self.last_face[t + 1].unwrap_or(last_pos).min(last_pos);
                let mut pos = start;
                while pos <= limit && c0_at(pos) < t1_end && n_move < 0 {
                    if face_thread[faces[pos]] == Some(tag0 + t + 1) {
                        n_move += 1;
                    }
                    pos += 1;
                }
                self.cell_index[t + 1] = c0_at(pos.min(last_pos)).clamp(t0_start, t1_end);
            }
        }

        self.assign(faces, face_cells, face_thread, tag0);
        if self.imbalance() > before {
            self.cell_index = saved;
            self.assign(faces, face_cells, face_thread, tag0);
        }
    }
}

/// Renumber the cells of the remaining faces densely, in the order they are
/// first met along `faces`, and re-sort each face's pair. Returns the
/// number of cells still in play.
fn compact_remaining_cells(
    faces: &[usize],
    face_cells: &mut [[usize; 2]],
    n_cells: usize,
) -> usize {
    let mut new_id: Vec<Option<usize>> = vec![None; n_cells];
    let mut n_used = 0;
    for &f in faces {
        for c in face_cells[f] {
            if new_id[c].is_none() {
                new_id[c] = Some(n_used);
                n_used += 1;
            }
        }
    }
    for &f in faces {
        let [a, b] = face_cells[f];
        let (a, b) = (new_id[a].unwrap_or(a), new_id[b].unwrap_or(b));
        face_cells[f] = if a <= b { [a, b] } else { [b, a] };
    }
    n_used
}

#[inline]
fn ordered(pair: [usize; 2]) -> [usize; 2] {
    let [a, b] = pair;
    if a <= b { [a, b] } else { [b, a] }
}

/// Group interior faces for `opts.n_threads` threads by repeated cell-block
/// passes.
///
/// Fails with [`MeshRenumberError::TooFewFaces`] when there are no more than
/// `opts.min_subset_size` faces; the caller is expected to fall back.
pub fn renumber_multipass(
    n_cells_ext: usize,
    face_cells: &[[usize; 2]],
    opts: &MultipassOptions,
) -> Result<ThreadedFaceNumbering, MeshRenumberError> {
    let n_threads = opts.n_threads;
    let n_faces = face_cells.len();
    if n_threads == 0 {
        return Err(MeshRenumberError::NoThreads);
    }
    let min_subset = opts.min_subset_size.max(1);
    if n_faces <= min_subset {
        return Err(MeshRenumberError::TooFewFaces {
            n_faces,
            min_subset_size: min_subset,
        });
    }
    if let Some((face, &[c0, c1])) = face_cells
        .iter()
        .enumerate()
        .find(|(_, fc)| fc[0].max(fc[1]) >= n_cells_ext)
    {
        return Err(MeshRenumberError::CellOutOfRange {
            face,
            cell: c0.max(c1),
            n_cells: n_cells_ext,
        });
    }

    let mut l_face_cells: Vec<[usize; 2]> = face_cells.par_iter().map(|&fc| ordered(fc)).collect();
    let mut face_thread: Vec<Option<usize>> = vec![None; n_faces];
    let mut faces = order_lexical(&l_face_cells);
    let mut n_f_cells = n_cells_ext;
    let mut group = 0;

    while faces.len() > min_subset {
        let n_active = (faces.len() / min_subset).clamp(1, n_threads);
        let tag0 = group * n_threads;
        let mut blocks = ThreadBlocks::uniform(n_f_cells, n_active);
        blocks.assign(&faces, &l_face_cells, &mut face_thread, tag0);
        let before = blocks.imbalance();
        blocks.redistribute(
            &faces,
            &l_face_cells,
            &mut face_thread,
            tag0,
            opts.relaxation,
        );
        let assigned = blocks.total();
        log::debug!(
            "multipass group {}: {} threads, {} of {} faces assigned, imbalance {:.3} -> {:.3}",
            group,
            n_active,
            assigned,
            faces.len(),
            before,
            blocks.imbalance()
        );
        if assigned == 0 {
            break;
        }

        faces.retain(|&f| face_thread[f].is_none());
        group += 1;
        if !faces.is_empty() {
            n_f_cells = compact_remaining_cells(&faces, &mut l_face_cells, n_f_cells);
            reorder_lexical(&mut faces, &l_face_cells);
        }
    }

    if !faces.is_empty() {
        for &f in &faces {
            face_thread[f] = Some(group * n_threads);
        }
        group += 1;
    }
    let n_groups = group;

    let keys = face_thread
        .iter()
        .zip(face_cells)
        .enumerate()
        .map(|(f, (tag, &fc))| {
            let [a, b] = ordered(fc);
            tag.map(|tag| (tag, a, b)).ok_or_else(|| {
                MeshRenumberError::InvariantViolation(format!("face {f} left without a thread"))
            })
        })
        .collect::<Result<Vec<_>, _>>()?;
    let order = order_lexical(&keys);

    let mut group_end: Vec<Option<usize>> = vec![None; n_threads * n_groups];
    for (pos, &f) in order.iter().enumerate() {
        let tag = keys[f].0;
        group_end[(tag % n_threads) * n_groups + tag / n_threads] = Some(pos + 1);
    }
    let mut group_index = GroupIndex::new(n_threads, n_groups);
    let mut offset = 0;
    for g in 0..n_groups {
        for t in 0..n_threads {
            if let Some(end) = group_end[t * n_groups + g] {
                group_index.set_range(t, g, Some(offset..end));
                offset = end;
            }
        }
    }
    crate::debug_invariants!(
        crate::debug_invariants::DebugInvariants::validate_invariants(&group_index),
        "multipass group index"
    );

    Ok(ThreadedFaceNumbering {
        new_to_old: Permutation::from_new_to_old(order)?,
        group_index,
    })
}
