//! Reverse Cuthill-McKee (RCM) pre-ordering of local cells.
//!
//! Works on the cell → cell graph restricted to local cells (ghost
//! neighbours are ignored, ghosts keep their ids). Each connected component
//! is rooted at a pseudo-peripheral cell; frontier cells are ordered by
//! `(parent label, degree, id)` and the final labels are reversed.

use crate::algs::csr_graph::CsrGraph;
use crate::algs::renumber::Permutation;
use crate::mesh_error::MeshRenumberError;
use crate::topology::mesh::FaceMesh;

/// Local cell adjacency: `n_cells` rows, ghost columns dropped.
struct LocalGraph {
    graph: CsrGraph,
    n_cells: usize,
}

impl LocalGraph {
    fn new(mesh: &FaceMesh) -> Self {
        Self {
            graph: CsrGraph::cell_cells(mesh.n_cells_with_ghosts, &mesh.i_face_cells),
            n_cells: mesh.n_cells,
        }
    }

    fn neighbors(&self, c: usize) -> impl Iterator<Item = usize> + '_ {
        self.graph.row(c).iter().copied().filter(|&n| n < self.n_cells)
    }

    fn degree(&self, c: usize) -> usize {
        self.neighbors(c).count()
    }

    /// BFS level structure from `root`.
    fn levels(&self, root: usize, visited: &mut [bool]) -> Vec<Vec<usize>> {
        let mut touched = vec![root];
        visited[root] = true;
        let mut levels = vec![vec![root]];
        loop {
            let mut next = Vec::new();
            for &u in levels.last().map(Vec::as_slice).unwrap_or(&[]) {
                for v in self.neighbors(u) {
                    if !visited[v] {
                        visited[v] = true;
                        next.push(v);
                    }
                }
            }
            if next.is_empty() {
                break;
            }
            touched.extend_from_slice(&next);
            levels.push(next);
        }
        for c in touched {
            visited[c] = false;
        }
        levels
    }
}

/// Pseudo-peripheral cell of the component containing `start`: repeatedly
/// jump to a minimum-degree cell of the deepest BFS level while the level
/// count keeps growing.
fn find_pseudo_peripheral_root(g: &LocalGraph, start: usize, scratch: &mut [bool]) -> usize {
    let mut root = start;
    let mut depth = 0;
    loop {
        let levels = g.levels(root, scratch);
        if levels.len() <= depth {
            return root;
        }
        depth = levels.len();
        let candidate = levels
            .last()
            .and_then(|l| l.iter().copied().min_by_key(|&v| (g.degree(v), v)))
            .unwrap_or(root);
        if candidate == root {
            return root;
        }
        root = candidate;
    }
}

/// RCM `new_to_old` permutation of the local cells of `mesh`.
pub fn rcm_cell_order(mesh: &FaceMesh) -> Result<Permutation, MeshRenumberError> {
    let n = mesh.n_cells;
    let g = LocalGraph::new(mesh);
    let mut label: Vec<Option<usize>> = vec![None; n];
    let mut scratch = vec![false; n];
    let mut order = Vec::with_capacity(n);

    for seed in 0..n {
        if label[seed].is_some() {
            continue;
        }
        let root = find_pseudo_peripheral_root(&g, seed, &mut scratch);
        label[root] = Some(order.len());
        order.push(root);
        let mut frontier = vec![root];
        while !frontier.is_empty() {
            let mut next: Vec<(usize, usize, usize)> = Vec::new();
            for &u in &frontier {
                let parent = label[u].unwrap_or(usize::MAX);
                for v in g.neighbors(u) {
                    if label[v].is_none() {
                        // placeholder so each cell is queued once, from its
                        // lowest-labelled parent
                        label[v] = Some(usize::MAX);
                        next.push((parent, g.degree(v), v));
                    }
                }
            }
            next.sort_unstable();
            frontier = next.into_iter().map(|(_, _, v)| v).collect();
            for &v in &frontier {
                label[v] = Some(order.len());
                order.push(v);
            }
        }
    }

    order.reverse();
    log::debug!("rcm cell ordering computed for {n} local cells");
    Permutation::from_new_to_old(order)
}
