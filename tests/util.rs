#![allow(dead_code)]
use std::collections::HashMap;

use mesh_renumber::DebugInvariants;
use mesh_renumber::algs::communicator::RayonComm;
use mesh_renumber::data::numbering::{Numbering, NumberingKind};
use mesh_renumber::topology::mesh::{FaceMesh, FaceVertices};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

/// 1-D chain: cells `0..n_cells`, interior face `i` joins `i` and `i + 1`,
/// one boundary face at each end.
pub fn chain_mesh(n_cells: usize) -> FaceMesh {
    let faces = (0..n_cells - 1).map(|i| [i, i + 1]).collect();
    FaceMesh::new(n_cells, 0, faces, vec![0, n_cells - 1]).unwrap()
}

/// `nx * ny` structured grid of quads, cell `(i, j)` at `j * nx + i`.
///
/// With `ghost_column`, an extra column of ghost cells sits to the right of
/// the grid (as received from a neighbouring rank) instead of boundary
/// faces. Face vertices, families and global cell numbers are filled in.
pub fn grid_mesh(nx: usize, ny: usize, ghost_column: bool) -> FaceMesh {
    let n_cells = nx * ny;
    let n_ghosts = if ghost_column { ny } else { 0 };
    let cell = |i: usize, j: usize| j * nx + i;
    let vtx = |i: usize, j: usize| j * (nx + 1) + i;

    let mut i_faces = Vec::new();
    let mut i_vtx = Vec::new();
    let mut b_faces = Vec::new();
    let mut b_vtx = Vec::new();
    for j in 0..ny {
        for i in 0..nx {
            // face on the right side of (i, j)
            let right = vec![vtx(i + 1, j), vtx(i + 1, j + 1)];
            if i + 1 < nx {
                i_faces.push([cell(i, j), cell(i + 1, j)]);
                i_vtx.push(right);
            } else if ghost_column {
                i_faces.push([cell(i, j), n_cells + j]);
                i_vtx.push(right);
            } else {
                b_faces.push(cell(i, j));
                b_vtx.push(right);
            }
            // face on the top side of (i, j)
            let top = vec![vtx(i, j + 1), vtx(i + 1, j + 1)];
            if j + 1 < ny {
                i_faces.push([cell(i, j), cell(i, j + 1)]);
                i_vtx.push(top);
            } else {
                b_faces.push(cell(i, j));
                b_vtx.push(top);
            }
            if i == 0 {
                b_faces.push(cell(i, j));
                b_vtx.push(vec![vtx(i, j), vtx(i, j + 1)]);
            }
            if j == 0 {
                b_faces.push(cell(i, j));
                b_vtx.push(vec![vtx(i, j), vtx(i + 1, j)]);
            }
        }
    }

    let n_i = i_faces.len();
    let n_b = b_faces.len();
    let mut mesh = FaceMesh::new(n_cells, n_ghosts, i_faces, b_faces).unwrap();
    mesh.i_face_vtx = Some(FaceVertices::from_lists(i_vtx));
    mesh.b_face_vtx = Some(FaceVertices::from_lists(b_vtx));
    mesh.cell_family = Some((0..n_cells).map(|c| (c % 3) as i32).collect());
    mesh.i_face_family = Some((0..n_i).map(|f| (f % 2) as i32).collect());
    mesh.b_face_family = Some((0..n_b).map(|f| (f % 4) as i32).collect());
    mesh.global_cell_num = Some((0..n_cells as u64).map(|c| 1000 + c).collect());
    mesh.validate_invariants().unwrap();
    mesh
}

/// Random interior faces between distinct cells (ghosts included) and one
/// boundary face per local cell on average.
pub fn random_mesh(seed: u64, n_cells: usize, n_ghosts: usize, n_i_faces: usize) -> FaceMesh {
    let mut rng = SmallRng::seed_from_u64(seed);
    let n_ext = n_cells + n_ghosts;
    let i_faces = (0..n_i_faces)
        .map(|_| {
            let a = rng.gen_range(0..n_cells);
            let mut b = rng.gen_range(0..n_ext);
            while b == a {
                b = rng.gen_range(0..n_ext);
            }
            [a, b]
        })
        .collect();
    let b_faces = (0..n_cells).map(|_| rng.gen_range(0..n_cells)).collect();
    FaceMesh::new(n_cells, n_ghosts, i_faces, b_faces).unwrap()
}

/// Two-rank Rayon comms (ranks 0 and 1).
pub fn rayons() -> (RayonComm, RayonComm) {
    (RayonComm::new(0, 2), RayonComm::new(1, 2))
}

/// Assert vec is a permutation of another vec (order-agnostic).
pub fn assert_permutation<T: Ord + Copy + std::fmt::Debug>(got: &[T], want: &[T]) {
    let mut a = got.to_vec();
    a.sort_unstable();
    let mut b = want.to_vec();
    b.sort_unstable();
    assert_eq!(a, b, "not a permutation\n got={:?}\nwant={:?}", got, want);
}

/// Every face id appears in exactly one range of `numbering`.
pub fn assert_coverage(numbering: &Numbering, n_faces: usize) {
    let mut hits = vec![0usize; n_faces];
    for (_, _, range) in numbering.group_index().iter() {
        for f in range {
            hits[f] += 1;
        }
    }
    assert!(hits.iter().all(|&h| h == 1), "coverage: {hits:?}");
}

/// Straightforward re-check of the threading contract: inside a group, no
/// cell is reached from two threads.
pub fn assert_conflict_free(numbering: &Numbering, cells_of: impl Fn(usize) -> Vec<usize>) {
    match numbering.kind() {
        NumberingKind::Vectorized { vector_size } => {
            let n = numbering.n_elts();
            for start in (0..n).step_by(vector_size) {
                let mut seen = HashMap::new();
                for f in start..(start + vector_size).min(n) {
                    for c in cells_of(f) {
                        if let Some(other) = seen.insert(c, f) {
                            panic!("cell {c} in faces {other} and {f} of one register");
                        }
                    }
                }
            }
        }
        _ => {
            let gi = numbering.group_index();
            for g in 0..gi.n_groups() {
                let mut owner: HashMap<usize, usize> = HashMap::new();
                for t in 0..gi.n_threads() {
                    let Some(range) = gi.range(t, g) else { continue };
                    for f in range {
                        for c in cells_of(f) {
                            let o = *owner.entry(c).or_insert(t);
                            assert_eq!(o, t, "cell {c} shared by threads {o} and {t} in group {g}");
                        }
                    }
                }
            }
        }
    }
}

/// Both face numberings of `mesh` respect the threading contract.
pub fn assert_mesh_conflict_free(mesh: &FaceMesh) {
    let i = mesh.i_face_numbering.as_ref().expect("interior numbering");
    let b = mesh.b_face_numbering.as_ref().expect("boundary numbering");
    assert_coverage(i, mesh.n_i_faces());
    assert_coverage(b, mesh.n_b_faces());
    assert_conflict_free(i, |f| mesh.i_face_cells[f].to_vec());
    assert_conflict_free(b, |f| vec![mesh.b_face_cells[f]]);
}

/// Interior faces as unordered cell pairs, sorted; invariant under face
/// reordering.
pub fn face_pairs(mesh: &FaceMesh) -> Vec<[usize; 2]> {
    let mut pairs: Vec<[usize; 2]> = mesh
        .i_face_cells
        .iter()
        .map(|&[a, b]| [a.min(b), a.max(b)])
        .collect();
    pairs.sort_unstable();
    pairs
}
