//! Renumbering algorithms, the connectivity rewrite and their drivers.

pub mod block;
pub mod boundary;
pub mod communicator;
pub mod csr_graph;
pub mod independent_groups;
pub mod lexical;
pub mod metrics;
pub mod multipass;
pub mod pipeline;
pub mod rcm;
pub mod renumber;
pub mod vectorize;

pub use pipeline::{RenumberReport, renumber_mesh};
pub use renumber::{Permutation, RenumberListener, ThreadedFaceNumbering};
