//! Pull diagnostics: flag significant cells and summarise the pull distribution.

use nv_grid::Axis;
use serde::Serialize;

use crate::compare::PullGrid;
use crate::gauss_fit::{GaussianFit, fit_gaussian};

/// Default significance threshold for flagging a cell.
pub const DEFAULT_PULL_THRESHOLD: f64 = 3.0;

/// Bins of the pull histogram on `[PULL_HIST_LOW, PULL_HIST_HIGH)`.
pub const PULL_HIST_BINS: usize = 40;
const PULL_HIST_LOW: f64 = -10.0;
const PULL_HIST_HIGH: f64 = 10.0;

/// A cell whose pull exceeded the threshold or could not be computed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlaggedCell {
    /// Pull grid the cell belongs to.
    pub grid: String,
    /// Physical location.
    pub label: String,
    /// Pull value; `None` when there was not enough information.
    pub pull: Option<f64>,
}

/// How the pull distribution was summarised.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum PullOutcome {
    /// Every finite pull is exactly zero; no fit performed.
    Identical,
    /// No finite pull at all.
    NoData,
    /// Gaussian fit of the pull histogram.
    Fit(GaussianFit),
    /// Fit not possible; sample moments of the finite pulls.
    Moments {
        /// Mean pull.
        mean: f64,
        /// `std_dev / sqrt(n)`.
        mean_error: f64,
        /// Standard deviation of the pulls.
        rms: f64,
        /// `std_dev / sqrt(2n)`.
        rms_error: f64,
        /// Why the fit was not used.
        reason: String,
    },
}

/// Summary of one or more pull grids.
#[derive(Debug, Clone, Serialize)]
pub struct PullReport {
    /// Threshold used for flagging.
    pub threshold: f64,
    /// Cells with `|pull| > threshold` or NaN pull.
    pub flagged_cells: Vec<FlaggedCell>,
    /// Sum of finite pulls.
    pub total_pull: f64,
    /// Number of finite pulls.
    pub cell_count: usize,
    /// Mean of finite pulls (NaN if none).
    pub mean: f64,
    /// Standard deviation of finite pulls (NaN if none).
    pub std_dev: f64,
    /// Pull histogram contents (`PULL_HIST_BINS` bins on [-10, 10)).
    pub histogram: Vec<f64>,
    /// Distribution summary.
    pub outcome: PullOutcome,
}

impl PullReport {
    /// `true` when the compared grids agree cell for cell.
    pub fn is_identical(&self) -> bool {
        self.outcome == PullOutcome::Identical
    }

    /// Mean and RMS of the pull distribution with their errors, from the fit
    /// or the moment fallback.
    pub fn mean_rms(&self) -> Option<(f64, f64, f64, f64)> {
        match &self.outcome {
            PullOutcome::Fit(f) => Some((f.mean, f.mean_error, f.sigma, f.sigma_error)),
            PullOutcome::Moments { mean, mean_error, rms, rms_error, .. } => {
                Some((*mean, *mean_error, *rms, *rms_error))
            }
            PullOutcome::Identical | PullOutcome::NoData => None,
        }
    }

    /// One-line operator summary.
    pub fn summary(&self) -> String {
        match &self.outcome {
            PullOutcome::Identical => "plots are identical".to_string(),
            PullOutcome::NoData => "no comparable cells".to_string(),
            PullOutcome::Fit(f) => format!(
                "pull mean {:.3} ± {:.3}, RMS {:.3} ± {:.3} ({} cells flagged)",
                f.mean,
                f.mean_error,
                f.sigma,
                f.sigma_error,
                self.flagged_cells.len()
            ),
            PullOutcome::Moments { mean, mean_error, rms, rms_error, .. } => format!(
                "pull mean {mean:.3} ± {mean_error:.3}, RMS {rms:.3} ± {rms_error:.3} \
                 (moments; {} cells flagged)",
                self.flagged_cells.len()
            ),
        }
    }
}

fn pull_axis() -> Axis {
    Axis { bins: PULL_HIST_BINS, low: PULL_HIST_LOW, high: PULL_HIST_HIGH }
}

/// Scan pull grids (e.g. the six calorimeter zones together), flag cells and
/// summarise the distribution of finite pulls.
pub fn check_pulls<'a>(
    grids: impl IntoIterator<Item = &'a PullGrid>,
    threshold: f64,
) -> PullReport {
    let axis = pull_axis();
    let mut histogram = vec![0.0; axis.bins];
    let mut flagged_cells = Vec::new();
    let mut total_pull = 0.0;
    let mut sum_sq = 0.0;
    let mut cell_count = 0usize;
    let mut all_zero = true;

    for grid in grids {
        for (idx, &p) in grid.values.iter().enumerate() {
            if p.is_nan() {
                flagged_cells.push(FlaggedCell {
                    grid: grid.name().to_string(),
                    label: grid.cell_label(idx),
                    pull: None,
                });
                continue;
            }
            if p.is_infinite() {
                continue;
            }
            total_pull += p;
            sum_sq += p * p;
            cell_count += 1;
            all_zero &= p == 0.0;
            if let Some(bin) = axis.find_bin(p) {
                histogram[bin] += 1.0;
            }
            if p.abs() > threshold {
                tracing::debug!(grid = grid.name(), cell = idx, pull = p, "significant pull");
                flagged_cells.push(FlaggedCell {
                    grid: grid.name().to_string(),
                    label: grid.cell_label(idx),
                    pull: Some(p),
                });
            }
        }
    }

    let (mean, std_dev) = if cell_count == 0 {
        (f64::NAN, f64::NAN)
    } else {
        let n = cell_count as f64;
        let mean = total_pull / n;
        (mean, (sum_sq / n - mean * mean).max(0.0).sqrt())
    };

    let outcome = if cell_count == 0 {
        PullOutcome::NoData
    } else if all_zero {
        PullOutcome::Identical
    } else {
        let centers: Vec<f64> = (0..axis.bins).map(|i| axis.bin_center(i)).collect();
        match fit_gaussian(&centers, &histogram) {
            Ok(fit) => PullOutcome::Fit(fit),
            Err(e) => {
                tracing::debug!(error = %e, "pull fit unavailable, using moments");
                let n = cell_count as f64;
                PullOutcome::Moments {
                    mean,
                    mean_error: std_dev / n.sqrt(),
                    rms: std_dev,
                    rms_error: std_dev / (2.0 * n).sqrt(),
                    reason: e.to_string(),
                }
            }
        }
    };

    PullReport {
        threshold,
        flagged_cells,
        total_pull,
        cell_count,
        mean,
        std_dev,
        histogram,
        outcome,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nv_geom::CaloZone;
    use nv_grid::{GridMode, GridSpec};
    use statrs::distribution::{ContinuousCDF, Normal};

    fn pull_grid(zone: CaloZone, fill: impl Fn(usize) -> f64) -> PullGrid {
        let spec = GridSpec::calo("c", zone, GridMode::Count);
        let values = (0..spec.n_cells()).map(fill).collect();
        PullGrid { spec, values }
    }

    #[test]
    fn test_all_zero_is_identical_without_fit() {
        let g = pull_grid(CaloZone::France, |_| 0.0);
        let r = check_pulls([&g], DEFAULT_PULL_THRESHOLD);
        assert!(r.is_identical());
        assert_eq!(r.summary(), "plots are identical");
        assert!(r.flagged_cells.is_empty());
        assert_eq!(r.cell_count, 260);
        assert_eq!(r.total_pull, 0.0);
        assert!(r.mean_rms().is_none());
    }

    #[test]
    fn test_flags_large_and_nan_pulls() {
        let g = pull_grid(CaloZone::Italy, |i| match i {
            0 => 4.5,
            1 => f64::NAN,
            2 => -3.01,
            3 => 3.0,
            _ => 0.0,
        });
        let r = check_pulls([&g], 3.0);
        assert_eq!(r.flagged_cells.len(), 3);
        assert_eq!(r.flagged_cells[0].pull, Some(4.5));
        assert_eq!(r.flagged_cells[0].label, "Italy main wall: column 19, row 0");
        assert_eq!(r.flagged_cells[1].pull, None);
        assert_eq!(r.flagged_cells[1].grid, "c_italy");
        assert_eq!(r.cell_count, 259);
        assert!((r.total_pull - (4.5 - 3.01 + 3.0)).abs() < 1e-12);
        assert!(!r.is_identical());
    }

    #[test]
    fn test_gaussian_like_pulls_are_fitted() {
        // Deterministic pulls spread like a unit normal (inverse-CDF grid).
        let spec = GridSpec::tracker("t", GridMode::Count);
        let n = spec.n_cells();
        let normal = Normal::new(0.0, 1.0).unwrap();
        let values =
            (0..n).map(|i| normal.inverse_cdf((i as f64 + 0.5) / n as f64)).collect::<Vec<_>>();
        let g = PullGrid { spec, values };
        let r = check_pulls([&g], DEFAULT_PULL_THRESHOLD);
        let (mean, _, rms, _) = r.mean_rms().unwrap();
        assert!(mean.abs() < 0.05, "mean={mean}");
        assert!((rms - 1.0).abs() < 0.1, "rms={rms}");
        assert!(matches!(r.outcome, PullOutcome::Fit(_)));
        assert!(r.std_dev > 0.9 && r.std_dev < 1.1);
    }

    #[test]
    fn test_sparse_pulls_fall_back_to_moments() {
        let g = pull_grid(CaloZone::Top, |i| if i == 0 { 1.0 } else { f64::NAN });
        let r = check_pulls([&g], DEFAULT_PULL_THRESHOLD);
        assert_eq!(r.cell_count, 1);
        assert!(matches!(r.outcome, PullOutcome::Moments { .. }));
        assert_eq!(r.flagged_cells.len(), 31);
    }

    #[test]
    fn test_no_finite_pulls() {
        let g = pull_grid(CaloZone::Bottom, |_| f64::NAN);
        let r = check_pulls([&g], DEFAULT_PULL_THRESHOLD);
        assert_eq!(r.outcome, PullOutcome::NoData);
        assert!(r.mean.is_nan());
    }

    #[test]
    fn test_zones_are_aggregated() {
        let a = pull_grid(CaloZone::Top, |i| if i == 0 { 5.0 } else { 0.0 });
        let b = pull_grid(CaloZone::Bottom, |i| if i == 1 { -5.0 } else { 0.0 });
        let r = check_pulls([&a, &b], DEFAULT_PULL_THRESHOLD);
        assert_eq!(r.cell_count, 64);
        assert_eq!(r.flagged_cells.len(), 2);
        assert_eq!(r.flagged_cells[1].label, "Bottom veto wall: Italy side, column 1");
        assert_eq!(r.total_pull, 0.0);
    }
}
