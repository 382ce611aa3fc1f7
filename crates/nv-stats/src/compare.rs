//! Per-cell pulls and chi-square between two grids.

use nv_core::{Error, Result};
use nv_grid::{Grid, GridMode, GridSpec};
use serde::Serialize;
use statrs::distribution::{ChiSquared, ContinuousCDF};

/// Standardised residuals of a sample grid against a reference grid.
///
/// Same shape as its sources; NaN marks cells without enough information.
#[derive(Debug, Clone, Serialize)]
pub struct PullGrid {
    /// Shape and labelling of the source grids (name suffixed with `_pull`).
    pub spec: GridSpec,
    /// One pull per cell, row-major.
    pub values: Vec<f64>,
}

impl PullGrid {
    /// Grid name.
    pub fn name(&self) -> &str {
        &self.spec.name
    }

    /// Human-readable location of a cell.
    pub fn cell_label(&self, idx: usize) -> String {
        self.spec.cell_label(idx)
    }

    /// Cells with a finite pull.
    pub fn finite(&self) -> impl Iterator<Item = f64> + '_ {
        self.values.iter().copied().filter(|p| p.is_finite())
    }
}

fn check_shapes(h1: &Grid, h2: &Grid) -> Result<()> {
    if h1.same_shape(h2) {
        Ok(())
    } else {
        Err(Error::Validation(format!(
            "grids '{}' and '{}' have different axes",
            h1.name(),
            h2.name()
        )))
    }
}

/// Cell pull `(s − r) / sqrt(σs² + σr²)`.
///
/// NaN when either uncertainty is zero or not finite, or when the reference
/// is an average-mode grid with an empty cell.
pub fn pull(sample: &Grid, reference: &Grid) -> Result<PullGrid> {
    check_shapes(sample, reference)?;
    let ref_is_average = reference.mode() == GridMode::Average;

    let values = (0..sample.n_cells())
        .map(|i| {
            let (s, es) = (sample.values[i], sample.errors[i]);
            let (r, er) = (reference.values[i], reference.errors[i]);
            let usable = es.is_finite() && er.is_finite() && es != 0.0 && er != 0.0;
            if !usable || (ref_is_average && reference.counts[i] == 0) {
                f64::NAN
            } else {
                (s - r) / (es * es + er * er).sqrt()
            }
        })
        .collect();

    let mut spec = sample.spec.clone();
    spec.name = format!("{}_pull", sample.name());
    Ok(PullGrid { spec, values })
}

/// Chi-square goodness-of-fit summary.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ChiSquare {
    /// Sum of squared standardised residuals.
    pub chi2: f64,
    /// Number of cells that contributed.
    pub ndf: u64,
    /// Upper-tail probability of `chi2` for `ndf` degrees of freedom (NaN if `ndf == 0`).
    pub p_value: f64,
}

impl ChiSquare {
    /// Build from a sum and its ndf, computing the p-value.
    pub fn new(chi2: f64, ndf: u64) -> Self {
        Self { chi2, ndf, p_value: chi2_survival(chi2, ndf) }
    }

    /// `chi2 / ndf` (NaN if `ndf == 0`).
    pub fn reduced(&self) -> f64 {
        if self.ndf == 0 { f64::NAN } else { self.chi2 / self.ndf as f64 }
    }

    /// Sum independent chi-squares (e.g. the six calorimeter zones) into one
    /// global figure with a single p-value.
    pub fn combine<'a>(parts: impl IntoIterator<Item = &'a ChiSquare>) -> Self {
        let (chi2, ndf) = parts.into_iter().fold((0.0, 0), |(c, n), p| (c + p.chi2, n + p.ndf));
        Self::new(chi2, ndf)
    }
}

fn chi2_survival(chi2: f64, ndf: u64) -> f64 {
    if ndf == 0 || chi2.is_nan() {
        return f64::NAN;
    }
    if chi2 <= 0.0 {
        return 1.0;
    }
    match ChiSquared::new(ndf as f64) {
        Ok(dist) => dist.sf(chi2),
        Err(e) => {
            tracing::warn!(ndf, error = %e, "chi-square distribution unavailable");
            f64::NAN
        }
    }
}

/// Chi-square between two grids of identical shape.
///
/// A cell is skipped (and does not count toward ndf) if any value or
/// uncertainty is NaN or either uncertainty is exactly zero.
pub fn chi_square(h1: &Grid, h2: &Grid) -> Result<ChiSquare> {
    check_shapes(h1, h2)?;
    let mut chi2 = 0.0;
    let mut ndf = 0u64;
    for i in 0..h1.n_cells() {
        let (v1, e1) = (h1.values[i], h1.errors[i]);
        let (v2, e2) = (h2.values[i], h2.errors[i]);
        if v1.is_nan() || v2.is_nan() || e1.is_nan() || e2.is_nan() {
            continue;
        }
        if e1 == 0.0 || e2 == 0.0 {
            continue;
        }
        let d = v1 - v2;
        chi2 += d * d / (e1 * e1 + e2 * e2);
        ndf += 1;
    }
    Ok(ChiSquare::new(chi2, ndf))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nv_geom::CaloZone;
    use nv_grid::{Axis, GridAccumulator};

    fn count_grid(cells: &[(i32, i32, usize)]) -> Grid {
        let mut acc = GridAccumulator::new(GridSpec::calo("c", CaloZone::France, GridMode::Count));
        for &(x, y, n) in cells {
            for _ in 0..n {
                acc.add_count(x, y);
            }
        }
        acc.finalize_count()
    }

    fn avg_grid(cells: &[(i32, i32, &[f64])]) -> Grid {
        let mut acc = GridAccumulator::new(GridSpec::tracker("t", GridMode::Average));
        for &(x, y, vs) in cells {
            for &v in vs {
                acc.add_count(x, y);
                acc.add_weighted(x, y, v);
            }
        }
        acc.finalize_average()
    }

    #[test]
    fn test_pull_of_identical_grids_is_zero() {
        let g = count_grid(&[(0, 0, 3), (5, 7, 12), (19, 12, 1)]);
        let p = pull(&g, &g).unwrap();
        assert_eq!(p.name(), "c_france_pull");
        assert_eq!(p.values.len(), g.n_cells());
        assert!(p.values.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_pull_value() {
        let s = count_grid(&[(1, 1, 9)]);
        let r = count_grid(&[(1, 1, 16)]);
        let p = pull(&s, &r).unwrap();
        let idx = s.index(1, 1);
        assert_relative_eq!(p.values[idx], (9.0 - 16.0) / 25f64.sqrt());
    }

    #[test]
    fn test_pull_nan_on_zero_error_or_empty_reference() {
        let s = avg_grid(&[(0, 0, &[1.0, 2.0]), (1, 1, &[5.0]), (2, 2, &[1.0, 3.0])]);
        let r = avg_grid(&[(0, 0, &[1.0, 3.0]), (1, 1, &[4.0, 6.0])]);
        let p = pull(&s, &r).unwrap();
        let at = |x: i32, y: i32| {
            let ix = s.spec.x_axis.find_bin(f64::from(x)).unwrap();
            let iy = s.spec.y_axis.find_bin(f64::from(y)).unwrap();
            p.values[s.index(ix, iy)]
        };
        assert!(at(0, 0).is_finite());
        // Sample has a single value: zero error.
        assert!(at(1, 1).is_nan());
        // Reference cell is empty.
        assert!(at(2, 2).is_nan());
        // Both empty.
        assert!(at(3, 3).is_nan());
    }

    #[test]
    fn test_pull_shape_mismatch() {
        let a = count_grid(&[]);
        let b = avg_grid(&[]);
        assert!(pull(&a, &b).is_err());
        assert!(chi_square(&a, &b).is_err());
    }

    #[test]
    fn test_chi_square_self_is_zero_with_unit_p_value() {
        let g = count_grid(&[(0, 0, 3), (5, 7, 12)]);
        let c = chi_square(&g, &g).unwrap();
        assert_eq!(c.chi2, 0.0);
        assert_eq!(c.p_value, 1.0);
        assert_eq!(c.ndf, g.n_cells() as u64);
    }

    #[test]
    fn test_chi_square_scaled_reference_cancels() {
        let s = count_grid(&[(3, 3, 10)]);
        let r = count_grid(&[(3, 3, 5)]).scaled(2.0);
        assert_relative_eq!(r.value_at(3, 3).unwrap(), 10.0);
        let c = chi_square(&s, &r).unwrap();
        assert_relative_eq!(c.chi2, 0.0);
    }

    #[test]
    fn test_chi_square_skips_insufficient_cells() {
        let s = avg_grid(&[(0, 0, &[1.0, 2.0]), (1, 1, &[5.0])]);
        let r = avg_grid(&[(0, 0, &[2.0, 3.0]), (1, 1, &[4.0, 6.0])]);
        let c = chi_square(&s, &r).unwrap();
        assert_eq!(c.ndf, 1);
        // means 1.5 vs 2.5, errors 0.5 each
        assert_relative_eq!(c.chi2, 1.0 / 0.5, epsilon = 1e-12);
        let expected = ChiSquared::new(1.0).unwrap().sf(2.0);
        assert_relative_eq!(c.p_value, expected, epsilon = 1e-12);
    }

    #[test]
    fn test_chi_square_no_cells() {
        let s = avg_grid(&[]);
        let c = chi_square(&s, &s).unwrap();
        assert_eq!(c.ndf, 0);
        assert!(c.p_value.is_nan());
        assert!(c.reduced().is_nan());
    }

    #[test]
    fn test_combine_sums_before_p_value() {
        let a = ChiSquare::new(4.0, 3);
        let b = ChiSquare::new(6.0, 5);
        let c = ChiSquare::combine([&a, &b]);
        assert_eq!(c.ndf, 8);
        assert_relative_eq!(c.chi2, 10.0);
        let expected = ChiSquared::new(8.0).unwrap().sf(10.0);
        assert_relative_eq!(c.p_value, expected, epsilon = 1e-12);
        assert_relative_eq!(c.reduced(), 1.25);
    }

    #[test]
    fn test_chi_square_on_distribution() {
        let axis = Axis::uniform(4, 0.0, 4.0).unwrap();
        let mut a = GridAccumulator::new(GridSpec::distribution("h", axis));
        let mut b = GridAccumulator::new(GridSpec::distribution("h", axis));
        for v in [0.5, 1.5, 1.5, 2.5] {
            a.fill_value(v);
        }
        for v in [0.5, 1.5, 2.5, 2.5] {
            b.fill_value(v);
        }
        let c = chi_square(&a.finalize_count(), &b.finalize_count()).unwrap();
        // bins: (1,1) (2,1) (1,2) (0,0): 0 + 1/3 + 1/3 + 0
        assert_eq!(c.ndf, 4);
        assert_relative_eq!(c.chi2, 2.0 / 3.0, epsilon = 1e-12);
    }
}
