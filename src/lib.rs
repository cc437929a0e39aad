#![cfg_attr(docsrs, feature(doc_cfg))]
//! # mesh-renumber
//!
//! mesh-renumber reorders the cells and faces of a finite-volume mesh so
//! that face loops can run on several threads (or vector lanes) without
//! write conflicts, while leaving the physical connectivity untouched.
//!
//! ## Features
//! - CSR cell graphs and lexical face orderings built from face → cell arrays
//! - Interior face grouping by a multipass cell-block heuristic or by
//!   independent sets split uniformly over threads
//! - Boundary face partitioning that never splits a cell across threads
//! - Vector-register face orderings and optional RCM cell pre-ordering
//! - A connectivity rewriter that keeps vertices, families, neighbours and
//!   global numbers consistent, with a listener hook for cached views
//! - A conflict validator and bandwidth/imbalance diagnostics reduced over
//!   ranks through pluggable communicators (serial, Rayon, MPI)
//!
//! ## Correctness contract
//!
//! Inside one group, no two threads may reach the same cell. Every call to
//! [`renumber_mesh`](algs::pipeline::renumber_mesh) re-checks this on the
//! installed numberings and panics on violation.
//!
//! ## Usage
//!
//! ```toml
//! [dependencies]
//! mesh-renumber = "0.1"
//! # Optional features:
//! # features = ["mpi-support"]
//! ```
//!
//! ```
//! use mesh_renumber::prelude::*;
//!
//! let faces = (0..99).map(|i| [i, i + 1]).collect();
//! let mut mesh = FaceMesh::new(100, 0, faces, vec![0, 99]).unwrap();
//! let mut config = RenumberConfig::default();
//! config.set_n_threads(4).set_min_subset_size(8, 1);
//! let report = renumber_mesh(&mut mesh, &config, &NoComm, &mut NoListener).unwrap();
//! assert_eq!(report.interior.n_threads, 4);
//! ```

pub mod algs;
pub mod config;
pub mod data;
pub mod debug_invariants;
pub mod mesh_error;
pub mod topology;

pub use debug_invariants::DebugInvariants;

/// A convenient prelude to import the most-used traits & types:
pub mod prelude {
    pub use crate::algs::communicator::{Communicator, NoComm, RayonComm};
    #[cfg(feature = "mpi-support")]
    pub use crate::algs::communicator::MpiComm;
    pub use crate::algs::pipeline::{RenumberReport, renumber_mesh};
    pub use crate::algs::renumber::{
        NoListener, Permutation, RenumberListener, apply_cell_renumbering,
        apply_face_renumbering,
    };
    pub use crate::config::{CellOrdering, InteriorFaceAlgorithm, RenumberConfig};
    pub use crate::data::numbering::{GroupIndex, Numbering, NumberingKind};
    pub use crate::debug_invariants::DebugInvariants;
    pub use crate::mesh_error::MeshRenumberError;
    pub use crate::topology::mesh::FaceMesh;
    pub use crate::topology::validation::{ConflictCounts, validate_renumbering};
}
