//! Single-pass cell accumulation with two-moment tracking.

use nv_core::{Error, Result};

use crate::grid::{Grid, GridMode, GridSpec};

/// Mutable per-cell counters for one grid.
///
/// In average mode every hit is recorded twice: [`add_count`](Self::add_count)
/// bumps the cell count and [`add_weighted`](Self::add_weighted) adds the
/// hit's quantity to the running `Σv` and `Σv²`.
#[derive(Debug, Clone)]
pub struct GridAccumulator {
    spec: GridSpec,
    counts: Vec<u64>,
    sum: Vec<f64>,
    sum_sq: Vec<f64>,
    entries: u64,
    out_of_range: u64,
}

impl GridAccumulator {
    /// Allocate an empty accumulator.
    pub fn new(spec: GridSpec) -> Self {
        let n = spec.n_cells();
        Self {
            spec,
            counts: vec![0; n],
            sum: vec![0.0; n],
            sum_sq: vec![0.0; n],
            entries: 0,
            out_of_range: 0,
        }
    }

    /// Construction parameters.
    pub fn spec(&self) -> &GridSpec {
        &self.spec
    }

    /// Fills recorded inside the grid so far.
    pub fn entries(&self) -> u64 {
        self.entries
    }

    /// Fills rejected as outside the axes so far.
    pub fn out_of_range(&self) -> u64 {
        self.out_of_range
    }

    fn cell_index(&self, x: f64, y: f64) -> Option<usize> {
        let ix = self.spec.x_axis.find_bin(x)?;
        let iy = self.spec.y_axis.find_bin(y)?;
        Some(iy * self.spec.x_axis.bins + ix)
    }

    /// Increment the count of map cell `(x, y)`. Returns `false` (and records
    /// an out-of-range fill) when the cell is outside the grid.
    pub fn add_count(&mut self, x: i32, y: i32) -> bool {
        match self.cell_index(f64::from(x), f64::from(y)) {
            Some(i) => {
                self.counts[i] += 1;
                self.entries += 1;
                true
            }
            None => {
                self.out_of_range += 1;
                false
            }
        }
    }

    /// Add `value` to the running sums of map cell `(x, y)`.
    pub fn add_weighted(&mut self, x: i32, y: i32, value: f64) -> bool {
        match self.cell_index(f64::from(x), f64::from(y)) {
            Some(i) => {
                self.sum[i] += value;
                self.sum_sq[i] += value * value;
                true
            }
            None => false,
        }
    }

    /// Count one entry of a 1-D distribution at `v`.
    pub fn fill_value(&mut self, v: f64) -> bool {
        match self.cell_index(v, 0.0) {
            Some(i) => {
                self.counts[i] += 1;
                self.entries += 1;
                true
            }
            None => {
                self.out_of_range += 1;
                false
            }
        }
    }

    /// Add another accumulator of identical shape into this one.
    pub fn merge(&mut self, other: &GridAccumulator) -> Result<()> {
        if self.spec.x_axis != other.spec.x_axis || self.spec.y_axis != other.spec.y_axis {
            return Err(Error::Validation(format!(
                "cannot merge grid '{}' into '{}': axes differ",
                other.spec.name, self.spec.name
            )));
        }
        for (a, b) in self.counts.iter_mut().zip(&other.counts) {
            *a += b;
        }
        for (a, b) in self.sum.iter_mut().zip(&other.sum) {
            *a += b;
        }
        for (a, b) in self.sum_sq.iter_mut().zip(&other.sum_sq) {
            *a += b;
        }
        self.entries += other.entries;
        self.out_of_range += other.out_of_range;
        Ok(())
    }

    /// Finalise according to the grid's fill mode.
    pub fn finalize(self) -> Grid {
        match self.spec.mode {
            GridMode::Count => self.finalize_count(),
            GridMode::Average => self.finalize_average(),
        }
    }

    /// Count-mode finalisation: value = count, error = sqrt(count); empty
    /// cells get error 1 so later pull/chi-square steps never divide by zero.
    pub fn finalize_count(self) -> Grid {
        let values: Vec<f64> = self.counts.iter().map(|&c| c as f64).collect();
        let errors = values.iter().map(|&v| if v == 0.0 { 1.0 } else { v.sqrt() }).collect();
        self.into_grid(values, errors)
    }

    /// Average-mode finalisation.
    ///
    /// `mean = Σv / n`. For `n > 1` the unbiased sample variance is
    /// `(Σv²/n − mean²) · n/(n−1)` and the error is the standard error of the
    /// mean, `sqrt(variance / n)`. Cells with zero or one value get error 0,
    /// which downstream comparisons treat as "unknown".
    pub fn finalize_average(self) -> Grid {
        let n_cells = self.counts.len();
        let mut values = vec![0.0; n_cells];
        let mut errors = vec![0.0; n_cells];
        for i in 0..n_cells {
            let n = self.counts[i];
            if n == 0 {
                continue;
            }
            let nf = n as f64;
            let mean = self.sum[i] / nf;
            values[i] = mean;
            if n > 1 {
                let mean_sq = self.sum_sq[i] / nf;
                // Rounding can leave a tiny negative for constant inputs.
                let variance = ((mean_sq - mean * mean) * nf / (nf - 1.0)).max(0.0);
                errors[i] = (variance / nf).sqrt();
            }
        }
        self.into_grid(values, errors)
    }

    fn into_grid(self, values: Vec<f64>, errors: Vec<f64>) -> Grid {
        if self.out_of_range > 0 {
            tracing::debug!(
                grid = %self.spec.name,
                out_of_range = self.out_of_range,
                "fills outside grid axes"
            );
        }
        Grid {
            spec: self.spec,
            counts: self.counts,
            values,
            errors,
            entries: self.entries,
            out_of_range: self.out_of_range,
            scale: 1.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::axis::Axis;
    use approx::assert_relative_eq;
    use nv_geom::CaloZone;

    fn avg_grid(values: &[f64]) -> Grid {
        let spec = GridSpec::calo("e", CaloZone::France, GridMode::Average);
        let mut acc = GridAccumulator::new(spec);
        for &v in values {
            acc.add_count(4, 4);
            acc.add_weighted(4, 4, v);
        }
        acc.finalize_average()
    }

    #[test]
    fn test_average_single_value_has_zero_error() {
        let g = avg_grid(&[7.5]);
        assert_relative_eq!(g.value_at(4, 4).unwrap(), 7.5);
        assert_eq!(g.error_at(4, 4).unwrap(), 0.0);
    }

    #[test]
    fn test_average_two_values_unbiased() {
        let g = avg_grid(&[2.0, 4.0]);
        assert_eq!(g.value_at(4, 4).unwrap(), 3.0);
        // (10 - 9) * 2/1 = 2 → sqrt(2/2) = 1
        assert_eq!(g.error_at(4, 4).unwrap(), 1.0);
    }

    #[test]
    fn test_average_matches_textbook_standard_error() {
        let xs = [1.0, 2.0, 4.0, 7.0, 11.0];
        let g = avg_grid(&xs);
        let n = xs.len() as f64;
        let mean = xs.iter().sum::<f64>() / n;
        let var = xs.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1.0);
        assert_relative_eq!(g.value_at(4, 4).unwrap(), mean, epsilon = 1e-12);
        assert_relative_eq!(g.error_at(4, 4).unwrap(), (var / n).sqrt(), epsilon = 1e-12);
    }

    #[test]
    fn test_average_constant_values_zero_error() {
        let g = avg_grid(&[0.1, 0.1, 0.1]);
        assert!(g.error_at(4, 4).unwrap() >= 0.0);
        assert!(g.error_at(4, 4).unwrap() < 1e-6);
    }

    #[test]
    fn test_empty_average_cell() {
        let g = avg_grid(&[]);
        assert_eq!(g.value_at(0, 0).unwrap(), 0.0);
        assert_eq!(g.error_at(0, 0).unwrap(), 0.0);
        assert_eq!(g.count_at(0, 0).unwrap(), 0);
    }

    #[test]
    fn test_count_mode_errors() {
        let mut acc = GridAccumulator::new(GridSpec::calo("c", CaloZone::Bottom, GridMode::Count));
        for _ in 0..4 {
            acc.add_count(3, 1);
        }
        let g = acc.finalize_count();
        assert_eq!(g.value_at(3, 1).unwrap(), 4.0);
        assert_eq!(g.error_at(3, 1).unwrap(), 2.0);
        assert_eq!(g.error_at(3, 0).unwrap(), 1.0);
        assert_eq!(g.entries, 4);
    }

    #[test]
    fn test_out_of_range_fills_are_counted() {
        let mut acc = GridAccumulator::new(GridSpec::calo("c", CaloZone::Top, GridMode::Count));
        assert!(!acc.add_count(16, 0));
        assert!(!acc.add_count(0, 2));
        assert!(acc.add_count(15, 1));
        assert_eq!(acc.out_of_range(), 2);
        assert_eq!(acc.entries(), 1);
    }

    #[test]
    fn test_merge_equals_single_pass() {
        let spec = GridSpec::tracker("t", GridMode::Average);
        let hits = [(0, 5, 1.0), (0, 5, 3.0), (-3, 17, 2.5), (0, 5, 8.0)];

        let mut single = GridAccumulator::new(spec.clone());
        for &(x, y, v) in &hits {
            single.add_count(x, y);
            single.add_weighted(x, y, v);
        }

        let mut a = GridAccumulator::new(spec.clone());
        let mut b = GridAccumulator::new(spec);
        for (i, &(x, y, v)) in hits.iter().enumerate() {
            let acc = if i % 2 == 0 { &mut a } else { &mut b };
            acc.add_count(x, y);
            acc.add_weighted(x, y, v);
        }
        a.merge(&b).unwrap();

        assert_eq!(a.finalize_average(), single.finalize_average());
    }

    #[test]
    fn test_merge_shape_mismatch() {
        let mut a = GridAccumulator::new(GridSpec::tracker("t", GridMode::Count));
        let b = GridAccumulator::new(GridSpec::calo("c", CaloZone::France, GridMode::Count));
        assert!(a.merge(&b).is_err());
    }

    #[test]
    fn test_fill_value_distribution() {
        let axis = Axis::uniform(10, 0.0, 10.0).unwrap();
        let mut acc = GridAccumulator::new(GridSpec::distribution("h", axis));
        for v in [0.0, 0.5, 9.99, 10.0, -1.0] {
            acc.fill_value(v);
        }
        let g = acc.finalize_count();
        assert_eq!(g.counts[0], 2);
        assert_eq!(g.counts[9], 1);
        assert_eq!(g.out_of_range, 2);
    }
}
