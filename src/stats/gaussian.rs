//! Multi-Gaussian peak model and fitting.
//!
//! Height histograms of layered samples show one Gaussian peak per exposed
//! surface; fitting a sum of Gaussians to the histogram separates the
//! levels. Parameters are `(c, mu, sigma)` triples, one per peak, where `c`
//! scales a unit-area normal density.

use serde::Serialize;
use tracing::debug;

use crate::linalg;
use crate::stats::StatsError;

/// 1 / sqrt(2 * pi)
const INV_SQRT_TAU: f64 = 0.398_942_280_401_432_7;

const MAX_ITERATIONS: usize = 200;
const LAMBDA_INIT: f64 = 1e-3;
const LAMBDA_MAX: f64 = 1e12;
const COST_TOLERANCE: f64 = 1e-14;

/// Check `(c, mu, sigma)` triples: length a multiple of 3 and positive
/// sigmas.
fn check_params(params: &[f64]) -> Result<(), StatsError> {
    if params.is_empty() || params.len() % 3 != 0 {
        return Err(StatsError::BadParameterCount(params.len()));
    }
    for triple in params.chunks_exact(3) {
        if !(triple[2] > 0.0) {
            return Err(StatsError::InvalidSigma(triple[2]));
        }
    }
    Ok(())
}

/// Sum of Gaussians evaluated at each `x`.
///
/// Each `(c, mu, sigma)` triple contributes `c * pdf(x; mu, sigma)`.
pub fn multi_gaussian(x: &[f64], params: &[f64]) -> Result<Vec<f64>, StatsError> {
    check_params(params)?;
    let mut out = vec![0.0; x.len()];
    for triple in params.chunks_exact(3) {
        let (c, mu, sigma) = (triple[0], triple[1], triple[2]);
        for (value, &xi) in out.iter_mut().zip(x) {
            let t = (xi - mu) / sigma;
            *value += c * INV_SQRT_TAU / sigma * (-0.5 * t * t).exp();
        }
    }
    Ok(out)
}

/// Elementwise `model(x) - y`.
pub fn multi_gaussian_residual(
    params: &[f64],
    x: &[f64],
    y: &[f64],
) -> Result<Vec<f64>, StatsError> {
    if x.len() != y.len() {
        return Err(StatsError::LengthMismatch {
            x: x.len(),
            y: y.len(),
        });
    }
    let fit = multi_gaussian(x, params)?;
    Ok(fit.iter().zip(y).map(|(f, yi)| f - yi).collect())
}

/// Result of a Gaussian fit.
#[derive(Debug, Clone, Serialize)]
pub struct FitReport {
    /// Fitted `(c, mu, sigma)` triples, flattened.
    pub params: Vec<f64>,

    /// Euclidean norm of the final residual.
    pub residual_norm: f64,

    /// Iterations consumed.
    pub iterations: usize,
}

/// Fit a sum of Gaussians to `(x, y)` by Levenberg-Marquardt from an
/// initial `(c, mu, sigma)` guess.
///
/// The Jacobian is numerical (central differences). Steps that would drive
/// a sigma non-positive are rejected like cost increases.
pub fn fit_multi_gaussian(x: &[f64], y: &[f64], initial: &[f64]) -> Result<FitReport, StatsError> {
    check_params(initial)?;
    if x.len() != y.len() {
        return Err(StatsError::LengthMismatch {
            x: x.len(),
            y: y.len(),
        });
    }
    if x.len() < initial.len() {
        return Err(StatsError::EmptyInput);
    }

    let n_params = initial.len();
    let mut params = initial.to_vec();
    let mut residual = multi_gaussian_residual(&params, x, y)?;
    let mut cost = dot(&residual, &residual);
    let mut lambda = LAMBDA_INIT;

    for iteration in 1..=MAX_ITERATIONS {
        let jacobian = numeric_jacobian(&params, x, y)?;

        // JᵀJ and Jᵀr.
        let mut jtj = vec![0.0; n_params * n_params];
        let mut jtr = vec![0.0; n_params];
        for (row, r) in residual.iter().enumerate() {
            for p in 0..n_params {
                let jp = jacobian[row * n_params + p];
                jtr[p] += jp * r;
                for q in 0..n_params {
                    jtj[p * n_params + q] += jp * jacobian[row * n_params + q];
                }
            }
        }

        // Damped step: (JᵀJ + λ diag(JᵀJ)) δ = -Jᵀr.
        loop {
            let mut damped = jtj.clone();
            for p in 0..n_params {
                let d = damped[p * n_params + p];
                damped[p * n_params + p] = d + lambda * d.max(1e-12);
            }
            let rhs: Vec<f64> = jtr.iter().map(|v| -v).collect();
            let step = match linalg::solve(damped, rhs) {
                Ok(step) => step,
                Err(_) => {
                    lambda *= 10.0;
                    if lambda > LAMBDA_MAX {
                        return Err(StatsError::DidNotConverge {
                            iterations: iteration,
                        });
                    }
                    continue;
                }
            };

            let trial: Vec<f64> = params.iter().zip(&step).map(|(p, s)| p + s).collect();
            let trial_ok = trial.chunks_exact(3).all(|t| t[2] > 0.0);
            if trial_ok {
                if let Ok(trial_residual) = multi_gaussian_residual(&trial, x, y) {
                    let trial_cost = dot(&trial_residual, &trial_residual);
                    if trial_cost <= cost {
                        let improvement = cost - trial_cost;
                        params = trial;
                        residual = trial_residual;
                        cost = trial_cost;
                        lambda = (lambda / 10.0).max(1e-12);

                        if improvement <= COST_TOLERANCE * (1.0 + cost) {
                            debug!(iteration, cost, "Gaussian fit converged");
                            return Ok(FitReport {
                                params,
                                residual_norm: cost.sqrt(),
                                iterations: iteration,
                            });
                        }
                        break;
                    }
                }
            }

            lambda *= 10.0;
            if lambda > LAMBDA_MAX {
                // No direction improves the fit any further; treat the
                // current point as converged.
                debug!(iteration, cost, "Gaussian fit stalled at minimum");
                return Ok(FitReport {
                    params,
                    residual_norm: cost.sqrt(),
                    iterations: iteration,
                });
            }
        }
    }

    Err(StatsError::DidNotConverge {
        iterations: MAX_ITERATIONS,
    })
}

/// Central-difference Jacobian of the residual, row-major
/// `(x.len()) x (params.len())`.
fn numeric_jacobian(params: &[f64], x: &[f64], y: &[f64]) -> Result<Vec<f64>, StatsError> {
    let n_params = params.len();
    let mut jacobian = vec![0.0; x.len() * n_params];
    for p in 0..n_params {
        // Sigmas stay positive: their step is a fraction of their value.
        let h = if p % 3 == 2 {
            1e-6 * params[p]
        } else {
            1e-6 * params[p].abs().max(1.0)
        };
        let mut plus = params.to_vec();
        plus[p] += h;
        let mut minus = params.to_vec();
        minus[p] -= h;
        let r_plus = multi_gaussian_residual(&plus, x, y)?;
        let r_minus = multi_gaussian_residual(&minus, x, y)?;
        for (row, (rp, rm)) in r_plus.iter().zip(&r_minus).enumerate() {
            jacobian[row * n_params + p] = (rp - rm) / (2.0 * h);
        }
    }
    Ok(jacobian)
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}
