//! # nv-core
//!
//! Shared error type and the dataset boundary for nemoval.
//!
//! Everything that reads event data (the JSON adapter here, or any external
//! reader) implements [`Dataset`]; the engine only ever sees ordered named
//! branches and their per-event [`FieldValue`]s.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod dataset;
pub mod error;

pub use dataset::{Branch, Dataset, FieldValue, JsonDataset};
pub use error::{Error, Result};

/// Crate version, stamped into report artifacts.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
