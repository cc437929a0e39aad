//! Data module: numbering descriptors attached to a mesh.

pub mod numbering;

pub use numbering::{GroupIndex, Numbering, NumberingKind};
