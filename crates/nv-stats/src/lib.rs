//! # nv-stats
//!
//! Sample-vs-reference comparison of finalised grids:
//! - per-cell pulls ([`pull`]),
//! - chi-square / ndf / p-value ([`chi_square`], summed over zones with
//!   [`ChiSquare::combine`]),
//! - binned two-sample Kolmogorov-Smirnov for 1-D distributions ([`ks_test`]),
//! - pull diagnostics with a Gaussian fit of the pull distribution
//!   ([`check_pulls`]).
//!
//! Cells without enough information (zero or NaN uncertainty, empty
//! reference in average mode) never raise errors: they become NaN pulls and
//! are left out of the chi-square ndf.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod compare;
pub mod gauss_fit;
pub mod ks;
pub mod pulls;

pub use compare::{ChiSquare, PullGrid, chi_square, pull};
pub use gauss_fit::{GaussianFit, fit_gaussian};
pub use ks::{KsResult, kolmogorov_prob, ks_test};
pub use pulls::{
    DEFAULT_PULL_THRESHOLD, FlaggedCell, PULL_HIST_BINS, PullOutcome, PullReport, check_pulls,
};
