// ============================================================================
// Levenberg-Marquardt Solver
// Damped Gauss-Newton iteration on weighted residuals
// ============================================================================
//
// Residuals are r_i = sqrt(w_i)·(y_i - f(x_i, p)). Each iteration solves
//
//     (JᵀJ + λ·diag(JᵀJ)) δ = Jᵀr
//
// with J the forward-difference Jacobian of sqrt(w)·f. A step that lowers
// the cost is accepted and λ shrinks; otherwise λ grows and the step is
// retried from the same point.

use nalgebra::{DMatrix, DVector};
use tracing::debug;

use crate::domain::FitConfig;
use crate::interfaces::{FitEvent, FitObserver, Model};
use crate::numeric::FitError;

/// Lower bound on a diagonal entry before damping, so parameters with a
/// zero Jacobian column still get a finite step.
const DIAGONAL_FLOOR: f64 = 1e-12;

/// Damping above this means no descent direction is left. The point counts
/// as stationary only if some rejected trial evaluated finitely.
const MAX_DAMPING: f64 = 1e16;

const MIN_DAMPING: f64 = 1e-15;

const DAMPING_FACTOR: f64 = 10.0;

/// Data and weights for one least-squares problem.
pub(crate) struct Problem<'a> {
    pub model: &'a dyn Model,
    pub x: &'a [f64],
    pub y: &'a [f64],
    pub sqrt_weights: Vec<f64>,
}

/// Converged parameters and their unscaled covariance `(JᵀWJ)⁻¹`.
#[derive(Debug, Clone)]
pub(crate) struct Solution {
    pub parameters: Vec<f64>,
    pub covariance: DMatrix<f64>,
    pub cost: f64,
    pub iterations: usize,
}

impl Problem<'_> {
    fn residuals(&self, p: &DVector<f64>) -> Result<DVector<f64>, FitError> {
        let params = p.as_slice();
        let mut r = DVector::zeros(self.x.len());
        for (i, (&xi, &yi)) in self.x.iter().zip(self.y).enumerate() {
            let f = self.model.eval(xi, params);
            if !f.is_finite() {
                return Err(FitError::NonFiniteModel { x: xi });
            }
            r[i] = self.sqrt_weights[i] * (yi - f);
        }
        Ok(r)
    }

    /// `J[i][j] = ∂(sqrt(w_i)·f(x_i))/∂p_j` by forward differences.
    fn jacobian(&self, p: &DVector<f64>, r: &DVector<f64>) -> Result<DMatrix<f64>, FitError> {
        let step_scale = f64::EPSILON.sqrt();
        let mut jacobian = DMatrix::zeros(r.len(), p.len());
        for j in 0..p.len() {
            let mut shifted = p.clone();
            shifted[j] += step_scale * p[j].abs().max(1.0);
            let h = shifted[j] - p[j];
            let shifted_r = self.residuals(&shifted)?;
            for i in 0..r.len() {
                jacobian[(i, j)] = (r[i] - shifted_r[i]) / h;
            }
        }
        Ok(jacobian)
    }
}

/// Minimise the weighted squared residuals of `problem` from `initial`.
pub(crate) fn levenberg_marquardt(
    problem: &Problem<'_>,
    initial: &[f64],
    config: &FitConfig,
    observer: &dyn FitObserver,
) -> Result<Solution, FitError> {
    let mut p = DVector::from_column_slice(initial);
    let mut r = problem.residuals(&p)?;
    let mut cost = r.norm_squared();
    let mut jacobian = problem.jacobian(&p, &r)?;
    let mut damping = config.initial_damping;
    // Any rejected trial since the last accepted step that evaluated finitely
    let mut finite_rejection = false;

    let mut converged_at = None;
    for iteration in 1..=config.max_iterations {
        if cost == 0.0 {
            converged_at = Some(iteration - 1);
            break;
        }

        let normal = jacobian.transpose() * &jacobian;
        let gradient = jacobian.transpose() * &r;
        let mut damped = normal.clone();
        for j in 0..p.len() {
            damped[(j, j)] += damping * normal[(j, j)].max(DIAGONAL_FLOOR);
        }

        let trial = damped
            .lu()
            .solve(&gradient)
            .filter(|step| step.iter().all(|s| s.is_finite()))
            .map(|step| {
                let candidate = &p + &step;
                let candidate_r = problem.residuals(&candidate);
                (step, candidate, candidate_r)
            });

        match trial {
            Some((step, candidate, Ok(candidate_r))) if candidate_r.norm_squared() < cost => {
                let new_cost = candidate_r.norm_squared();
                let improvement = (cost - new_cost) / cost;
                let small_step = step.norm()
                    <= config.parameter_tolerance * (p.norm() + config.parameter_tolerance);

                p = candidate;
                r = candidate_r;
                cost = new_cost;
                damping = (damping / DAMPING_FACTOR).max(MIN_DAMPING);
                finite_rejection = false;
                observer.on_event(&FitEvent::StepAccepted {
                    iteration,
                    cost,
                    damping,
                });

                if improvement < config.tolerance || small_step {
                    converged_at = Some(iteration);
                    break;
                }
                jacobian = problem.jacobian(&p, &r)?;
            }
            rejected => {
                finite_rejection |= matches!(rejected, Some((_, _, Ok(_))));
                damping *= DAMPING_FACTOR;
                observer.on_event(&FitEvent::StepRejected {
                    iteration,
                    cost,
                    damping,
                });
                if damping > MAX_DAMPING {
                    if !finite_rejection {
                        let error = FitError::Stalled {
                            iterations: iteration,
                            cost,
                        };
                        observer.on_event(&FitEvent::Failed {
                            iterations: iteration,
                            reason: error.to_string(),
                        });
                        return Err(error);
                    }
                    debug!(iteration, cost, "damping limit reached at a stationary point");
                    converged_at = Some(iteration);
                    break;
                }
            }
        }
    }

    let Some(iterations) = converged_at else {
        let error = FitError::DidNotConverge {
            iterations: config.max_iterations,
            cost,
        };
        observer.on_event(&FitEvent::Failed {
            iterations: config.max_iterations,
            reason: error.to_string(),
        });
        return Err(error);
    };

    let jacobian = problem.jacobian(&p, &r)?;
    let covariance = match (jacobian.transpose() * &jacobian).try_inverse() {
        Some(inverse) if inverse.iter().all(|v| v.is_finite()) => inverse,
        _ => {
            let error = FitError::SingularMatrix;
            observer.on_event(&FitEvent::Failed {
                iterations,
                reason: error.to_string(),
            });
            return Err(error);
        }
    };

    debug!(iterations, cost, "levenberg-marquardt converged");
    observer.on_event(&FitEvent::Converged { iterations, cost });

    Ok(Solution {
        parameters: p.iter().copied().collect(),
        covariance,
        cost,
        iterations,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interfaces::{FnModel, NoOpFitObserver};

    fn problem<'a>(model: &'a dyn Model, x: &'a [f64], y: &'a [f64]) -> Problem<'a> {
        Problem {
            model,
            x,
            y,
            sqrt_weights: vec![1.0; x.len()],
        }
    }

    #[test]
    fn test_recovers_exponential_decay() {
        let model = FnModel::new(2, |x: f64, p: &[f64]| p[0] * (-x / p[1]).exp());
        let x: Vec<f64> = (0..20).map(|i| i as f64 * 0.5).collect();
        let y: Vec<f64> = x.iter().map(|x| 5.0 * (-x / 2.0).exp()).collect();

        let solution = levenberg_marquardt(
            &problem(&model, &x, &y),
            &[1.0, 1.0],
            &FitConfig::default(),
            &NoOpFitObserver,
        )
        .unwrap();

        assert!((solution.parameters[0] - 5.0).abs() < 1e-6);
        assert!((solution.parameters[1] - 2.0).abs() < 1e-6);
        assert!(solution.cost < 1e-12);
    }

    #[test]
    fn test_linear_problem_covariance() {
        let model = FnModel::new(2, |x: f64, p: &[f64]| p[0] * x + p[1]);
        let x = [0.0, 1.0, 2.0, 3.0];
        let y = [1.1, 2.9, 5.2, 6.8];

        let solution = levenberg_marquardt(
            &problem(&model, &x, &y),
            &[0.0, 0.0],
            &FitConfig::default(),
            &NoOpFitObserver,
        )
        .unwrap();

        // (XᵀX)⁻¹ for unit weights: Sxx = 14, Sx = 6, n = 4, Δ = 20
        let expected = [[4.0 / 20.0, -6.0 / 20.0], [-6.0 / 20.0, 14.0 / 20.0]];
        for (i, row) in expected.iter().enumerate() {
            for (j, value) in row.iter().enumerate() {
                assert!((solution.covariance[(i, j)] - value).abs() < 1e-5);
            }
        }
    }

    #[test]
    fn test_non_finite_model() {
        let model = FnModel::new(1, |_x: f64, _p: &[f64]| f64::NAN);
        let x = [1.0, 2.0];
        let y = [1.0, 2.0];
        let err = levenberg_marquardt(
            &problem(&model, &x, &y),
            &[1.0],
            &FitConfig::default(),
            &NoOpFitObserver,
        )
        .unwrap_err();
        assert_eq!(err, FitError::NonFiniteModel { x: 1.0 });
    }

    #[test]
    fn test_unidentifiable_parameter_is_singular() {
        let model = FnModel::new(2, |_x: f64, p: &[f64]| p[0] + 0.0 * p[1]);
        let x = [1.0, 2.0, 3.0];
        let y = [2.0, 2.5, 3.0];
        let err = levenberg_marquardt(
            &problem(&model, &x, &y),
            &[1.0, 1.0],
            &FitConfig::default(),
            &NoOpFitObserver,
        )
        .unwrap_err();
        assert_eq!(err, FitError::SingularMatrix);
    }

    #[test]
    fn test_non_finite_trials_stall_instead_of_converging() {
        // finite only while one parameter keeps its starting value, which the
        // Jacobian columns respect but every damped step leaves behind
        let model = FnModel::new(2, |x: f64, p: &[f64]| {
            if p[0] != 1.0 && p[1] != 1.0 {
                f64::NAN
            } else {
                p[0] * x + p[1]
            }
        });
        let x = [0.0, 1.0, 2.0, 3.0];
        let y: Vec<f64> = x.iter().map(|x| 3e6 * x + 2e6).collect();

        let err = levenberg_marquardt(
            &problem(&model, &x, &y),
            &[1.0, 1.0],
            &FitConfig::default(),
            &NoOpFitObserver,
        )
        .unwrap_err();
        assert!(matches!(err, FitError::Stalled { .. }), "{:?}", err);
    }

    #[test]
    fn test_start_at_minimum_is_stationary() {
        // least-squares line through these points is 1.94·x + 1.09
        let model = FnModel::new(2, |x: f64, p: &[f64]| p[0] * x + p[1]);
        let x = [0.0, 1.0, 2.0, 3.0];
        let y = [1.1, 2.9, 5.2, 6.8];

        let solution = levenberg_marquardt(
            &problem(&model, &x, &y),
            &[1.94, 1.09],
            &FitConfig::default(),
            &NoOpFitObserver,
        )
        .unwrap();
        assert!((solution.parameters[0] - 1.94).abs() < 1e-6);
        assert!((solution.parameters[1] - 1.09).abs() < 1e-6);
    }

    #[test]
    fn test_iteration_limit() {
        let model = FnModel::new(2, |x: f64, p: &[f64]| p[0] * (-x / p[1]).exp());
        let x: Vec<f64> = (0..20).map(|i| i as f64 * 0.5).collect();
        let y: Vec<f64> = x.iter().map(|x| 5.0 * (-x / 2.0).exp()).collect();
        let config = FitConfig::default().with_max_iterations(1);

        let err = levenberg_marquardt(
            &problem(&model, &x, &y),
            &[1.0, 1.0],
            &config,
            &NoOpFitObserver,
        )
        .unwrap_err();
        assert!(matches!(err, FitError::DidNotConverge { iterations: 1, .. }));
    }
}
