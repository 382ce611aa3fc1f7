//! Uniform binned axis.

use nv_core::{Error, Result};
use serde::{Deserialize, Serialize};

/// A uniformly binned axis over `[low, high)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Axis {
    /// Number of bins (excluding under/overflow).
    pub bins: usize,
    /// Lower edge of first bin.
    pub low: f64,
    /// Upper edge of last bin.
    pub high: f64,
}

impl Axis {
    /// Uniform axis; requires `bins > 0` and a finite `low < high`.
    pub fn uniform(bins: usize, low: f64, high: f64) -> Result<Self> {
        if bins == 0 {
            return Err(Error::Validation("axis must have at least one bin".to_string()));
        }
        if !(low.is_finite() && high.is_finite() && low < high) {
            return Err(Error::Validation(format!("invalid axis range [{low}, {high})")));
        }
        Ok(Self { bins, low, high })
    }

    /// One bin per integer in `min..=max`, with half-integer edges.
    pub fn integer(min: i32, max: i32) -> Self {
        debug_assert!(min <= max);
        let bins = (i64::from(max) - i64::from(min) + 1) as usize;
        Self { bins, low: f64::from(min) - 0.5, high: f64::from(max) + 0.5 }
    }

    /// A single bin centred on zero (the y axis of a 1-D distribution).
    pub fn single() -> Self {
        Self::integer(0, 0)
    }

    /// Bin width.
    pub fn width(&self) -> f64 {
        (self.high - self.low) / self.bins as f64
    }

    /// Bin index for `v`, or `None` for underflow/overflow/NaN.
    pub fn find_bin(&self, v: f64) -> Option<usize> {
        if !(v >= self.low && v < self.high) {
            return None;
        }
        let i = ((v - self.low) / self.width()) as usize;
        // Guard against rounding pushing v just below `high` into bin `bins`.
        Some(i.min(self.bins - 1))
    }

    /// Lower edge of bin `i`.
    pub fn bin_low(&self, i: usize) -> f64 {
        self.low + i as f64 * self.width()
    }

    /// Centre of bin `i`.
    pub fn bin_center(&self, i: usize) -> f64 {
        self.low + (i as f64 + 0.5) * self.width()
    }

    /// Integer coordinate of bin `i` on an integer axis.
    pub fn bin_coordinate(&self, i: usize) -> i32 {
        self.bin_center(i).round() as i32
    }

    /// All bin edges (length `bins + 1`).
    pub fn edges(&self) -> Vec<f64> {
        (0..=self.bins).map(|i| self.bin_low(i)).collect()
    }
}
