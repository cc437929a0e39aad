//! Mesh renumbering entry point.
//!
//! [`renumber_mesh`] chains the pieces of this crate on a [`FaceMesh`]:
//! optional cell pre-ordering, face grouping for threads (or registers),
//! the connectivity rewrite, and the final conflict check. Infeasible
//! algorithms degrade one level at a time; interior faces fall back from
//! multipass to block to the native order, boundary faces to the serial
//! order.

use crate::algs::block::{BlockOptions, renumber_block};
use crate::algs::boundary::renumber_boundary_faces;
use crate::algs::communicator::Communicator;
use crate::algs::metrics::{
    BandwidthStats, ThreadingStats, bandwidth_stats, log_bandwidth_info, log_threading_info,
};
use crate::algs::multipass::{MultipassOptions, renumber_multipass};
use crate::algs::rcm::rcm_cell_order;
use crate::algs::renumber::{
    Permutation, RenumberListener, ThreadedFaceNumbering, apply_cell_renumbering,
    apply_face_renumbering,
};
use crate::algs::vectorize::{
    VectorizeOptions, renumber_b_faces_for_vectorizing, renumber_i_faces_for_vectorizing,
};
use crate::config::{CellOrdering, InteriorFaceAlgorithm, RenumberConfig};
use crate::data::numbering::Numbering;
use crate::debug_invariants::DebugInvariants;
use crate::mesh_error::MeshRenumberError;
use crate::topology::mesh::FaceMesh;
use crate::topology::validation::validate_renumbering;

/// Outcome of [`renumber_mesh`] on this rank.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct RenumberReport {
    pub interior: ThreadingStats,
    pub boundary: ThreadingStats,
    pub bandwidth: BandwidthStats,
}

/// Renumber the cells and faces of `mesh` for threaded (or vectorized)
/// face loops and attach the resulting numbering descriptors.
///
/// Every rank of `comm` must call this collectively: statistics and the
/// conflict check are reduced over ranks. The renumbering itself is local.
///
/// # Panics
///
/// Panics when the installed numberings would let two threads (or two lanes
/// of a register) write the same cell concurrently. This can only follow
/// from a defect in the renumbering algorithms.
pub fn renumber_mesh<C, L>(
    mesh: &mut FaceMesh,
    config: &RenumberConfig,
    comm: &C,
    listener: &mut L,
) -> Result<RenumberReport, MeshRenumberError>
where
    C: Communicator,
    L: RenumberListener + ?Sized,
{
    config.validate()?;
    mesh.validate_invariants()?;

    mesh.i_face_numbering = None;
    mesh.b_face_numbering = None;

    if !config.enabled {
        log::info!("Mesh renumbering disabled; faces keep their native order");
    } else {
        if config.cell_ordering == CellOrdering::ReverseCuthillMcKee {
            let perm = rcm_cell_order(mesh)?;
            apply_cell_renumbering(mesh, &perm, listener)?;
        }
        let n_threads = config.effective_n_threads();
        if config.vector_size > 1 {
            renumber_faces_for_vectorizing(mesh, config, listener)?;
        } else if n_threads > 1 {
            renumber_faces_for_threads(mesh, config, n_threads, listener)?;
        } else {
            log::debug!("single thread, faces keep their native order");
        }
    }

    if mesh.i_face_numbering.is_none() {
        mesh.i_face_numbering = Some(Numbering::serial(mesh.n_i_faces()));
    }
    if mesh.b_face_numbering.is_none() {
        mesh.b_face_numbering = Some(Numbering::serial(mesh.n_b_faces()));
    }
    mesh.debug_assert_invariants();

    let interior = ThreadingStats::of(mesh.i_face_numbering.as_ref());
    let boundary = ThreadingStats::of(mesh.b_face_numbering.as_ref());
    log_threading_info("interior faces", &interior, comm);
    log_threading_info("boundary faces", &boundary, comm);

    if let Err(err) = validate_renumbering(mesh, comm) {
        log::error!("{err}");
        panic!("{err}");
    }

    let bandwidth = bandwidth_stats(mesh);
    if mesh.verbosity > 0 {
        log_bandwidth_info("cell", &bandwidth, comm);
    }

    Ok(RenumberReport {
        interior,
        boundary,
        bandwidth,
    })
}

/// Algorithm tried after `algorithm` proved infeasible.
fn fallback(algorithm: InteriorFaceAlgorithm) -> InteriorFaceAlgorithm {
    match algorithm {
        InteriorFaceAlgorithm::Multipass => InteriorFaceAlgorithm::Block,
        InteriorFaceAlgorithm::Block | InteriorFaceAlgorithm::None => InteriorFaceAlgorithm::None,
    }
}

/// Threaded interior face numbering, or `None` when every algorithm down
/// the fallback chain is infeasible.
fn renumber_i_faces_for_threads(
    mesh: &FaceMesh,
    config: &RenumberConfig,
    n_threads: usize,
) -> Result<Option<ThreadedFaceNumbering>, MeshRenumberError> {
    let mut algorithm = config.i_face_algorithm();
    loop {
        let result = match algorithm {
            InteriorFaceAlgorithm::None => return Ok(None),
            InteriorFaceAlgorithm::Multipass => {
                let mut opts = MultipassOptions::new(n_threads, config.min_i_subset_size);
                opts.relaxation = config.redistribution_relaxation;
                renumber_multipass(mesh.n_cells_with_ghosts, &mesh.i_face_cells, &opts)
            }
            InteriorFaceAlgorithm::Block => {
                let opts = BlockOptions {
                    n_threads,
                    min_subset_size: config.min_i_subset_size,
                    max_group_size: config.block_max_group_size,
                    size_step: config.block_size_step,
                    serial_threshold: config.block_serial_threshold,
                };
                renumber_block(mesh.n_cells_with_ghosts, &mesh.i_face_cells, &opts)
            }
        };
        match result {
            Ok(numbering) => {
                log::info!("Interior faces renumbered for threads with the {algorithm:?} algorithm");
                return Ok(Some(numbering));
            }
            Err(err) if err.is_infeasible() => {
                let next = fallback(algorithm);
                log::warn!("{algorithm:?} interior face renumbering not applied ({err}); trying {next:?}");
                algorithm = next;
            }
            Err(err) => return Err(err),
        }
    }
}

fn renumber_faces_for_threads<L>(
    mesh: &mut FaceMesh,
    config: &RenumberConfig,
    n_threads: usize,
    listener: &mut L,
) -> Result<(), MeshRenumberError>
where
    L: RenumberListener + ?Sized,
{
    let (i_perm, i_numbering) = match renumber_i_faces_for_threads(mesh, config, n_threads)? {
        Some(t) => {
            let (perm, numbering) = t.into_parts()?;
            (Some(perm), Some(numbering))
        }
        None => (None, None),
    };

    let (b_perm, b_numbering) =
        match renumber_boundary_faces(&mesh.b_face_cells, n_threads, config.min_b_subset_size) {
            Ok(t) => {
                let (perm, numbering) = t.into_parts()?;
                (Some(perm), Some(numbering))
            }
            Err(err) if err.is_infeasible() => {
                log::warn!("boundary face renumbering not applied ({err}); keeping serial order");
                (None, None)
            }
            Err(err) => return Err(err),
        };

    apply_face_renumbering(mesh, i_perm.as_ref(), b_perm.as_ref(), listener)?;
    mesh.i_face_numbering = i_numbering;
    mesh.b_face_numbering = b_numbering;
    Ok(())
}

/// Declined vectorizations leave the face kind to the serial default.
fn vectorized_or_warn(
    result: Result<Permutation, MeshRenumberError>,
) -> Result<Option<Permutation>, MeshRenumberError> {
    match result {
        Ok(perm) => Ok(Some(perm)),
        Err(err) if err.is_infeasible() => {
            log::warn!("{err}; keeping serial order");
            Ok(None)
        }
        Err(err) => Err(err),
    }
}

fn renumber_faces_for_vectorizing<L>(
    mesh: &mut FaceMesh,
    config: &RenumberConfig,
    listener: &mut L,
) -> Result<(), MeshRenumberError>
where
    L: RenumberListener + ?Sized,
{
    let vector_size = config.vector_size;
    let opts = VectorizeOptions {
        vector_size,
        max_passes: config.vector_max_passes,
        shuffle_period: config.vector_shuffle_period,
    };
    let i_perm = vectorized_or_warn(renumber_i_faces_for_vectorizing(
        mesh.n_cells_with_ghosts,
        &mesh.i_face_cells,
        &opts,
    ))?;
    let b_perm = vectorized_or_warn(renumber_b_faces_for_vectorizing(
        mesh.n_cells,
        &mesh.b_face_cells,
        vector_size,
    ))?;

    apply_face_renumbering(mesh, i_perm.as_ref(), b_perm.as_ref(), listener)?;
    if i_perm.is_some() {
        mesh.i_face_numbering = Some(Numbering::vectorized(mesh.n_i_faces(), vector_size));
    }
    if b_perm.is_some() {
        mesh.b_face_numbering = Some(Numbering::vectorized(mesh.n_b_faces(), vector_size));
    }
    log::info!(
        "Faces renumbered for vector size {vector_size} (interior: {}, boundary: {})",
        i_perm.is_some(),
        b_perm.is_some()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algs::communicator::NoComm;
    use crate::algs::renumber::NoListener;
    use crate::data::numbering::NumberingKind;

    fn chain(n_cells: usize) -> FaceMesh {
        let faces = (0..n_cells - 1).map(|i| [i, i + 1]).collect();
        FaceMesh::new(n_cells, 0, faces, vec![0, n_cells - 1]).unwrap()
    }

    fn config(n_threads: usize, min_subset: usize) -> RenumberConfig {
        let mut cfg = RenumberConfig::default();
        cfg.set_n_threads(n_threads)
            .set_min_subset_size(min_subset, 1);
        cfg
    }

    #[test]
    fn fallback_chain_ends_at_none() {
        use InteriorFaceAlgorithm::*;
        assert_eq!(fallback(Multipass), Block);
        assert_eq!(fallback(Block), None);
        assert_eq!(fallback(None), None);
    }

    #[test]
    fn multipass_numbering_is_installed() {
        let mut mesh = chain(100);
        let report = renumber_mesh(&mut mesh, &config(4, 8), &NoComm, &mut NoListener).unwrap();
        let i = mesh.i_face_numbering.as_ref().unwrap();
        assert_eq!(i.kind(), NumberingKind::Threads);
        assert_eq!(report.interior.n_threads, 4);
        assert!(report.interior.n_groups >= 1);
        assert_eq!(i.group_index().total_faces(), 99);
    }

    #[test]
    fn too_few_faces_falls_back_to_serial() {
        let mut mesh = chain(6);
        let report = renumber_mesh(&mut mesh, &config(4, 64), &NoComm, &mut NoListener).unwrap();
        assert_eq!(mesh.i_face_numbering, Some(Numbering::serial(5)));
        assert_eq!((report.interior.n_threads, report.interior.n_groups), (1, 1));
    }

    #[test]
    fn single_thread_keeps_native_order() {
        let mut mesh = chain(50);
        let before = mesh.i_face_cells.clone();
        renumber_mesh(&mut mesh, &config(1, 8), &NoComm, &mut NoListener).unwrap();
        assert_eq!(mesh.i_face_cells, before);
        assert_eq!(mesh.i_face_numbering, Some(Numbering::serial(49)));
        assert_eq!(mesh.b_face_numbering, Some(Numbering::serial(2)));
    }

    #[test]
    fn vectorized_numbering_is_installed() {
        let mut mesh = chain(41);
        let mut cfg = config(1, 8);
        cfg.vector_size = 4;
        renumber_mesh(&mut mesh, &cfg, &NoComm, &mut NoListener).unwrap();
        assert_eq!(
            mesh.i_face_numbering.as_ref().map(Numbering::kind),
            Some(NumberingKind::Vectorized { vector_size: 4 })
        );
    }

    #[test]
    fn invalid_config_is_rejected_before_touching_the_mesh() {
        let mut mesh = chain(10);
        let mut cfg = config(2, 1);
        cfg.vector_size = 0;
        let err = renumber_mesh(&mut mesh, &cfg, &NoComm, &mut NoListener).unwrap_err();
        assert!(matches!(err, MeshRenumberError::InvalidConfig(_)));
        assert!(mesh.i_face_numbering.is_none());
    }
}
