//! Pure data types for run-z — manifests, task specs, attributes, job status.
//!
//! This crate is a leaf dependency with no async runtime, no parser, no I/O.
//! It exists so that consumers can work with the runner's type system without
//! pulling runz-kernel's transitive deps.

pub mod attrs;
pub mod error;
pub mod job;
pub mod manifest;
pub mod spec;

// Flat re-exports for convenience
pub use attrs::*;
pub use error::*;
pub use job::*;
pub use manifest::*;
pub use spec::*;
