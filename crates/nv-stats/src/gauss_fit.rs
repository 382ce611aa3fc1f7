//! Gaussian fit of a binned distribution.
//!
//! Model: `f(x) = A · exp(-½ ((x − μ) / σ)²)` evaluated at bin centres,
//! least squares over non-empty bins with Poisson errors `sqrt(n)`.
//! The weighted chi-square is minimised with argmin's L-BFGS; parameter
//! errors come from the inverted normal matrix at the minimum.

use argmin::core::{
    CostFunction, Executor, Gradient, State, TerminationReason, TerminationStatus,
};
use argmin::solver::linesearch::MoreThuenteLineSearch;
use argmin::solver::quasinewton::LBFGS;
use nalgebra::{Matrix3, Vector3};
use nv_core::{Error, Result};
use serde::Serialize;

const MAX_ITER: u64 = 500;
const TOL_GRAD: f64 = 1e-6;
const TOL_COST: f64 = 1e-9;
const LBFGS_HISTORY: usize = 7;

/// Fitted Gaussian parameters and their uncertainties.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GaussianFit {
    /// Peak height.
    pub amplitude: f64,
    /// Fitted mean.
    pub mean: f64,
    /// Uncertainty on the mean.
    pub mean_error: f64,
    /// Fitted width (RMS of the Gaussian).
    pub sigma: f64,
    /// Uncertainty on the width.
    pub sigma_error: f64,
    /// Final chi-square.
    pub chi2: f64,
    /// Non-empty bins minus three.
    pub ndf: usize,
    /// Iterations used.
    pub iterations: usize,
}

fn model(p: &Vector3<f64>, x: f64) -> (f64, Vector3<f64>) {
    let (a, mu, sigma) = (p[0], p[1], p[2]);
    let t = (x - mu) / sigma;
    let g = (-0.5 * t * t).exp();
    let f = a * g;
    // ∂f/∂A, ∂f/∂μ, ∂f/∂σ
    let grad = Vector3::new(g, f * t / sigma, f * t * t / sigma);
    (f, grad)
}

struct Point {
    x: f64,
    y: f64,
    w: f64,
}

/// Weighted chi-square of the binned points.
///
/// The optimiser works on `(A / peak, μ, σ)` so all three parameters are of
/// order one; `amplitude_scale` is `peak`.
struct ChiSquareProblem<'a> {
    points: &'a [Point],
    amplitude_scale: f64,
}

impl ChiSquareProblem<'_> {
    fn unscale(&self, p: &[f64]) -> Vector3<f64> {
        Vector3::new(p[0] * self.amplitude_scale, p[1], p[2])
    }

    fn chi2(&self, p: &Vector3<f64>) -> f64 {
        self.points
            .iter()
            .map(|pt| {
                let r = pt.y - model(p, pt.x).0;
                r * r * pt.w
            })
            .sum()
    }
}

fn check_params(p: &[f64]) -> std::result::Result<(), argmin::core::Error> {
    if p.len() != 3 || p[2] == 0.0 || p.iter().any(|v| !v.is_finite()) {
        return Err(argmin::core::Error::msg(format!("invalid Gaussian parameters {p:?}")));
    }
    Ok(())
}

impl CostFunction for ChiSquareProblem<'_> {
    type Param = Vec<f64>;
    type Output = f64;

    fn cost(&self, p: &Self::Param) -> std::result::Result<Self::Output, argmin::core::Error> {
        check_params(p)?;
        Ok(self.chi2(&self.unscale(p)))
    }
}

impl Gradient for ChiSquareProblem<'_> {
    type Param = Vec<f64>;
    type Gradient = Vec<f64>;

    fn gradient(
        &self,
        p: &Self::Param,
    ) -> std::result::Result<Self::Gradient, argmin::core::Error> {
        check_params(p)?;
        let q = self.unscale(p);
        let mut g = Vector3::zeros();
        for pt in self.points {
            let (f, df) = model(&q, pt.x);
            g -= df * (2.0 * pt.w * (pt.y - f));
        }
        Ok(vec![g[0] * self.amplitude_scale, g[1], g[2]])
    }
}

/// Normal matrix `JᵀWJ` at `p`.
fn normal_matrix(points: &[Point], p: &Vector3<f64>) -> Matrix3<f64> {
    let mut jtj = Matrix3::zeros();
    for pt in points {
        let (_, grad) = model(p, pt.x);
        jtj += grad * grad.transpose() * pt.w;
    }
    jtj
}

/// Fit a Gaussian to bin contents `counts` with centres `centers`.
///
/// Fails if fewer than three bins are populated, the minimiser stops
/// without converging, or the result has a singular covariance or a
/// non-positive width.
pub fn fit_gaussian(centers: &[f64], counts: &[f64]) -> Result<GaussianFit> {
    fit_gaussian_with(centers, counts, MAX_ITER)
}

fn fit_gaussian_with(centers: &[f64], counts: &[f64], max_iter: u64) -> Result<GaussianFit> {
    if centers.len() != counts.len() {
        return Err(Error::Validation(format!(
            "centers/counts length mismatch: {} vs {}",
            centers.len(),
            counts.len()
        )));
    }
    let points: Vec<Point> = centers
        .iter()
        .zip(counts)
        .filter(|&(_, &n)| n > 0.0 && n.is_finite())
        .map(|(&x, &n)| Point { x, y: n, w: 1.0 / n })
        .collect();
    if points.len() < 3 {
        return Err(Error::Computation(format!(
            "Gaussian fit needs at least 3 populated bins, got {}",
            points.len()
        )));
    }

    // Moments of the histogram as the starting point.
    let total: f64 = points.iter().map(|p| p.y).sum();
    let mean = points.iter().map(|p| p.x * p.y).sum::<f64>() / total;
    let var = points.iter().map(|p| (p.x - mean).powi(2) * p.y).sum::<f64>() / total;
    let min_width = centers.windows(2).map(|w| (w[1] - w[0]).abs()).fold(f64::INFINITY, f64::min);
    let sigma0 = var.sqrt().max(0.5 * min_width.min(1.0));
    let peak = points.iter().map(|p| p.y).fold(0.0, f64::max);

    let problem = ChiSquareProblem { points: &points, amplitude_scale: peak };
    let solver = LBFGS::new(MoreThuenteLineSearch::new(), LBFGS_HISTORY)
        .with_tolerance_grad(TOL_GRAD)
        .and_then(|s| s.with_tolerance_cost(TOL_COST))
        .map_err(|e| Error::Validation(format!("invalid fit configuration: {e}")))?;

    let res = Executor::new(problem, solver)
        .configure(|state| state.param(vec![1.0, mean, sigma0]).max_iters(max_iter))
        .run()
        .map_err(|e| Error::Computation(format!("Gaussian fit failed: {e}")))?;

    let state = res.state();
    let status = state.get_termination_status();
    if !matches!(
        status,
        TerminationStatus::Terminated(TerminationReason::SolverConverged)
            | TerminationStatus::Terminated(TerminationReason::TargetCostReached)
    ) {
        return Err(Error::Computation(format!("Gaussian fit did not converge: {status}")));
    }
    let best = state
        .get_best_param()
        .ok_or_else(|| Error::Computation("Gaussian fit produced no parameters".to_string()))?;
    let p = Vector3::new(best[0] * peak, best[1], best[2].abs());
    let iterations = state.get_iter() as usize;

    let cov = normal_matrix(&points, &p)
        .try_inverse()
        .ok_or_else(|| Error::Computation("singular Gaussian fit covariance".to_string()))?;
    let sigma = p[2];
    if !(sigma.is_finite() && sigma > 0.0 && p[1].is_finite()) {
        return Err(Error::Computation(format!("Gaussian fit diverged (sigma={sigma})")));
    }

    let problem = ChiSquareProblem { points: &points, amplitude_scale: peak };
    Ok(GaussianFit {
        amplitude: p[0],
        mean: p[1],
        mean_error: cov[(1, 1)].max(0.0).sqrt(),
        sigma,
        sigma_error: cov[(2, 2)].max(0.0).sqrt(),
        chi2: problem.chi2(&p),
        ndf: points.len() - 3,
        iterations,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn binned_gaussian(a: f64, mu: f64, sigma: f64) -> (Vec<f64>, Vec<f64>) {
        let centers: Vec<f64> = (0..40).map(|i| -10.0 + (i as f64 + 0.5) * 0.5).collect();
        let counts = centers
            .iter()
            .map(|&x| (a * (-0.5 * ((x - mu) / sigma).powi(2)).exp()).round())
            .collect();
        (centers, counts)
    }

    #[test]
    fn test_recovers_parameters() {
        let (x, y) = binned_gaussian(1000.0, 0.7, 1.6);
        let fit = fit_gaussian(&x, &y).unwrap();
        assert_relative_eq!(fit.mean, 0.7, epsilon = 0.02);
        assert_relative_eq!(fit.sigma, 1.6, epsilon = 0.02);
        assert_relative_eq!(fit.amplitude, 1000.0, epsilon = 10.0);
        assert!(fit.mean_error > 0.0 && fit.mean_error < 0.1);
        assert!(fit.sigma_error > 0.0 && fit.sigma_error < 0.1);
        assert!(fit.iterations > 0);
    }

    #[test]
    fn test_chi2_gradient_matches_finite_differences() {
        let (x, y) = binned_gaussian(200.0, -0.4, 2.1);
        let points: Vec<Point> = x
            .iter()
            .zip(&y)
            .filter(|&(_, &n)| n > 0.0)
            .map(|(&x, &n)| Point { x, y: n, w: 1.0 / n })
            .collect();
        let problem = ChiSquareProblem { points: &points, amplitude_scale: 200.0 };
        let p = vec![0.9, 0.1, 1.7];
        let g = problem.gradient(&p).unwrap();
        for i in 0..3 {
            let h = 1e-6;
            let mut up = p.clone();
            up[i] += h;
            let mut down = p.clone();
            down[i] -= h;
            let numeric = (problem.cost(&up).unwrap() - problem.cost(&down).unwrap()) / (2.0 * h);
            assert_relative_eq!(g[i], numeric, max_relative = 1e-5, epsilon = 1e-4);
        }
    }

    #[test]
    fn test_unconverged_fit_is_an_error() {
        let (x, y) = binned_gaussian(1000.0, 0.7, 1.6);
        assert!(fit_gaussian_with(&x, &y, 1).is_err());
    }

    #[test]
    fn test_too_few_bins() {
        let x = [0.0, 1.0, 2.0, 3.0];
        let y = [0.0, 5.0, 3.0, 0.0];
        assert!(fit_gaussian(&x, &y).is_err());
    }

    #[test]
    fn test_length_mismatch() {
        assert!(fit_gaussian(&[0.0, 1.0], &[1.0]).is_err());
    }
}
