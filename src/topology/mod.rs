//! Mesh connectivity consumed and rewritten by the renumbering, and the
//! checks run on its numberings.
//!
//! - [`mesh::FaceMesh`]: face → cell arrays with ghosts, optional face
//!   vertices, cell neighbours, families and global numbers
//! - [`validation`]: write-conflict detection on installed numberings

pub mod mesh;
pub mod validation;

pub use mesh::{CellCells, FaceMesh, FaceVertices};
pub use validation::{ConflictCounts, count_renumbering_conflicts, validate_renumbering};
