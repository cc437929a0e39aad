//! MeshRenumberError: Unified error type for mesh-renumber public APIs
//!
//! Every algorithm in this crate reports failure through this enum. The
//! "infeasible" family (see [`MeshRenumberError::is_infeasible`]) is the
//! recoverable kind: the pipeline falls back one level and keeps going.
//! Everything else points at inconsistent input or a logic error.

use thiserror::Error;

/// Unified error type for mesh-renumber operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MeshRenumberError {
    /// A `new_to_old` array is not a bijection on `[0, n)`.
    #[error("Invalid permutation: {0}")]
    InvalidPermutation(String),
    /// A permutation does not match the entity count it is applied to.
    #[error("Permutation length mismatch for {entity}: expected {expected}, found {found}")]
    PermutationLength {
        entity: &'static str,
        expected: usize,
        found: usize,
    },
    /// A face references a cell outside the admissible id range.
    #[error("Face {face} references cell {cell}, but only {n_cells} cells are admissible")]
    CellOutOfRange {
        face: usize,
        cell: usize,
        n_cells: usize,
    },
    /// An interior face joins a cell to itself.
    #[error("Interior face {face} joins cell {cell} to itself")]
    DegenerateFace { face: usize, cell: usize },
    /// Index/list arrays (CSR style) disagree in length or monotonicity.
    #[error("Inconsistent connectivity for {entity}: {reason}")]
    ConnectivityMismatch { entity: &'static str, reason: String },
    /// Too few faces to make thread renumbering worthwhile.
    #[error("Too few faces for thread renumbering: {n_faces} faces, minimum subset size {min_subset_size}")]
    TooFewFaces {
        n_faces: usize,
        min_subset_size: usize,
    },
    /// Boundary renumbering requested on a mesh without boundary faces.
    #[error("No boundary faces to renumber")]
    NoBoundaryFaces,
    /// Thread renumbering requested with fewer than one thread.
    #[error("Thread renumbering requires at least one thread")]
    NoThreads,
    /// The per-thread ranges built from group sizes do not tile the faces.
    #[error("Inconsistent group index: ranges cover {found} faces, expected {expected}")]
    InconsistentGroupIndex { expected: usize, found: usize },
    /// No vector-register-safe ordering was found.
    #[error("Vectorization of {entity} failed for vector size {vector_size}: {reason}")]
    VectorizationFailed {
        entity: &'static str,
        vector_size: usize,
        reason: String,
    },
    /// A configuration value is out of range or unparsable.
    #[error("Invalid renumbering configuration: {0}")]
    InvalidConfig(String),
    /// A structural invariant of a renumbering data structure is broken.
    #[error("Invariant violated: {0}")]
    InvariantViolation(String),
    /// Face groups let two threads write the same cell concurrently.
    #[error("Conflicts detected using renumbering numbering; interior: {interior} boundary: {boundary}")]
    ConflictsDetected { interior: u64, boundary: u64 },
}

impl MeshRenumberError {
    /// True when the error only means "this algorithm cannot help here";
    /// callers are expected to fall back to a simpler numbering.
    pub fn is_infeasible(&self) -> bool {
        matches!(
            self,
            MeshRenumberError::TooFewFaces { .. }
                | MeshRenumberError::NoBoundaryFaces
                | MeshRenumberError::NoThreads
                | MeshRenumberError::InconsistentGroupIndex { .. }
                | MeshRenumberError::VectorizationFailed { .. }
        )
    }
}
