//! # nv-validate
//!
//! Branch-by-branch validation of a sample dataset against a reference.
//!
//! Every branch of the sample is classified by its name prefix
//! ([`classify`]), turned into grids for both datasets ([`maps`],
//! [`binning`]), compared ([`nv_stats`]) and collected into a
//! [`ValidationReport`]. Nothing here is fatal: undecodable hits are skipped,
//! missing branches skip their variable, and the report always covers
//! everything that could be processed.
//!
//! ```no_run
//! use nv_config::NoConfig;
//! use nv_core::JsonDataset;
//! use nv_validate::{EngineOptions, validate};
//!
//! let sample = JsonDataset::open("sample.json").unwrap();
//! let reference = JsonDataset::open("reference.json").unwrap();
//! let report = validate(&sample, Some(&reference), &NoConfig, &EngineOptions::default()).unwrap();
//! for v in &report.variables {
//!     if let Some(c) = &v.chi_square {
//!         println!("{}: chi2/ndf = {:.1}/{}", v.name, c.chi2, c.ndf);
//!     }
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod binning;
pub mod classify;
pub mod engine;
pub mod maps;
pub mod report;

pub use classify::{Detector, Variable, VariableKind, classify};
pub use engine::{EngineOptions, compare_variable, validate};
pub use maps::FillStats;
pub use report::{
    ReportMeta, ReportSummary, SCHEMA_VERSION, SkippedVariable, ValidationReport, VariableReport,
    ZoneChiSquare,
};
