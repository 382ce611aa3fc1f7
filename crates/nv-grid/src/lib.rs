//! # nv-grid
//!
//! Detector maps and 1-D distributions as fixed-axis grids.
//!
//! A [`GridAccumulator`] is filled in one pass over the events (or in chunks
//! that are [merged](GridAccumulator::merge) afterwards) and then finalised
//! into an immutable [`Grid`] holding per-cell values and uncertainties:
//! - count mode: value = hit count, error = sqrt(count), floored at 1;
//! - average mode: value = mean of a per-hit quantity, error = standard
//!   error of that mean (0 when fewer than two values were seen).

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod accumulator;
pub mod axis;
pub mod grid;
pub mod zones;

pub use accumulator::GridAccumulator;
pub use axis::Axis;
pub use grid::{Grid, GridMode, GridSpec};
pub use zones::ZoneSet;
