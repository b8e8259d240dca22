// ============================================================================
// Nonlinear Regression
// Weighted least-squares fit of an arbitrary model y = f(x; p)
// ============================================================================

use std::fmt;
use std::sync::Arc;

use tracing::{debug, info};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::domain::{FitConfig, Measurement, MeasurementList};
use crate::interfaces::{FitEvent, FitObserver, FittedParameter, Model, Regression};
use crate::numeric::{FitError, MeasureError, MeasureResult};
use crate::units::Unit;

use super::linear::value_range;
use super::solver::{levenberg_marquardt, Problem};
use super::weighting::resolve_weights;

/// Summary of a finished nonlinear fit.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FitReport {
    pub model: String,
    pub parameters: Vec<FittedParameter>,
    pub iterations: usize,
    pub chi_squared: f64,
    /// χ² per degree of freedom, when there are any
    pub reduced_chi_squared: Option<f64>,
    pub weighted: bool,
    pub points: usize,
}

#[cfg(feature = "serde")]
impl FitReport {
    /// Pretty-printed JSON, for persisting fit results next to a report.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Parameters of a model fitted to measured points.
///
/// Estimates are dimensionless measurements whose uncertainties are the
/// square roots of the covariance diagonal. Build one with
/// [`NonlinearFitBuilder`](super::NonlinearFitBuilder) or [`NonlinearRegression::fit`].
#[derive(Clone)]
pub struct NonlinearRegression {
    model: Arc<dyn Model>,
    estimates: Vec<f64>,
    uncertainties: Vec<f64>,
    names: Vec<String>,
    x_unit: Unit,
    y_unit: Unit,
    x_range: (f64, f64),
    iterations: usize,
    chi_squared: f64,
    weighted: bool,
    points: usize,
    max_band_parameters: usize,
}

impl NonlinearRegression {
    /// Fit `model` to `(x, y)`, starting from `initial_guess` or all ones.
    pub fn fit(
        model: Arc<dyn Model>,
        x: &MeasurementList,
        y: &MeasurementList,
        initial_guess: Option<&[f64]>,
        config: &FitConfig,
        observer: &dyn FitObserver,
    ) -> MeasureResult<Self> {
        config.validate()?;
        if x.len() != y.len() {
            return Err(MeasureError::Length {
                left: x.len(),
                right: y.len(),
            });
        }

        let k = model.parameter_count();
        let guess = match initial_guess {
            Some(guess) if guess.len() != k => {
                return Err(FitError::InitialGuessLength {
                    expected: k,
                    got: guess.len(),
                }
                .into());
            }
            Some(guess) => guess.to_vec(),
            None => vec![1.0; k],
        };

        let n = x.len();
        if n == 0 || n < k {
            return Err(FitError::InsufficientData {
                points: n,
                required: k.max(1),
            }
            .into());
        }

        let weights = resolve_weights(&y.uncertainties(), config.weighting)?;
        if !weights.absolute && n <= k {
            return Err(FitError::InsufficientData {
                points: n,
                required: k + 1,
            }
            .into());
        }

        let xs = x.values();
        let ys = y.values();
        let problem = Problem {
            model: model.as_ref(),
            x: &xs,
            y: &ys,
            sqrt_weights: weights.values.iter().map(|w| w.sqrt()).collect(),
        };

        observer.on_event(&FitEvent::Started {
            model: model.name().to_string(),
            points: n,
            parameters: k,
        });
        let solution = levenberg_marquardt(&problem, &guess, config, observer)?;

        let mut covariance = solution.covariance;
        if !weights.absolute {
            covariance *= solution.cost / (n - k) as f64;
        }
        let uncertainties = (0..k).map(|j| covariance[(j, j)].max(0.0).sqrt()).collect();

        info!(
            model = model.name(),
            points = n,
            iterations = solution.iterations,
            chi_squared = solution.cost,
            "nonlinear regression fitted"
        );

        let mut names = model.parameter_names();
        names.truncate(k);
        names.extend((names.len()..k).map(|i| format!("p{}", i)));

        Ok(Self {
            names,
            estimates: solution.parameters,
            uncertainties,
            x_unit: x.unit().clone(),
            y_unit: y.unit().clone(),
            x_range: value_range(&xs),
            iterations: solution.iterations,
            chi_squared: solution.cost,
            weighted: weights.absolute,
            points: n,
            max_band_parameters: config.max_band_parameters,
            model,
        })
    }

    /// Raw best-fit parameter values.
    pub fn estimates(&self) -> &[f64] {
        &self.estimates
    }

    pub fn uncertainties(&self) -> &[f64] {
        &self.uncertainties
    }

    /// Estimate of the parameter called `name`.
    pub fn parameter(&self, name: &str) -> Option<Measurement> {
        let index = self.names.iter().position(|n| n == name)?;
        Some(self.estimate(index))
    }

    pub fn iterations(&self) -> usize {
        self.iterations
    }

    /// Weighted sum of squared residuals at the optimum.
    pub fn chi_squared(&self) -> f64 {
        self.chi_squared
    }

    pub fn is_weighted(&self) -> bool {
        self.weighted
    }

    pub fn x_unit(&self) -> &Unit {
        &self.x_unit
    }

    pub fn y_unit(&self) -> &Unit {
        &self.y_unit
    }

    /// Model value at `x`, in the y unit, with the band half-width as
    /// uncertainty.
    ///
    /// The uncertainty is the larger of the two one-sided band widths, so
    /// asymmetric bands are covered. The uncertainty of `x` is not propagated.
    pub fn predict(&self, x: &Measurement) -> MeasureResult<Measurement> {
        let x = x.to(&self.x_unit)?;
        let value = self.predict_value(x.value());
        let (lower, upper) = self.band_value(x.value())?;
        let uncertainty = (upper - value).max(value - lower);
        Ok(Measurement::with_unit(value, uncertainty, self.y_unit.clone()))
    }

    pub fn report(&self) -> FitReport {
        let dof = self.points.saturating_sub(self.estimates.len());
        FitReport {
            model: self.model.name().to_string(),
            parameters: self.parameters(),
            iterations: self.iterations,
            chi_squared: self.chi_squared,
            reduced_chi_squared: (dof > 0).then(|| self.chi_squared / dof as f64),
            weighted: self.weighted,
            points: self.points,
        }
    }

    fn estimate(&self, index: usize) -> Measurement {
        Measurement::dimensionless(self.estimates[index], self.uncertainties[index])
    }
}

impl Regression for NonlinearRegression {
    fn parameters(&self) -> Vec<FittedParameter> {
        self.names
            .iter()
            .enumerate()
            .map(|(i, name)| FittedParameter {
                name: name.clone(),
                estimate: self.estimate(i),
            })
            .collect()
    }

    fn predict_value(&self, x: f64) -> f64 {
        self.model.eval(x, &self.estimates)
    }

    /// Extremes of the model over every corner `p ± σ` of the parameter box
    /// and the optimum itself. Costs `2^k` model evaluations.
    fn band_value(&self, x: f64) -> MeasureResult<(f64, f64)> {
        let k = self.estimates.len();
        if k > self.max_band_parameters {
            return Err(FitError::BandTooLarge {
                parameters: k,
                limit: self.max_band_parameters,
            }
            .into());
        }

        let best = self.predict_value(x);
        let mut bounds = (best, best);
        let mut corner = vec![0.0; k];
        for mask in 0u32..(1u32 << k) {
            for (i, slot) in corner.iter_mut().enumerate() {
                let sign = if (mask >> i) & 1 == 1 { 1.0 } else { -1.0 };
                *slot = self.estimates[i] + sign * self.uncertainties[i];
            }
            let value = self.model.eval(x, &corner);
            if value.is_finite() {
                bounds = (bounds.0.min(value), bounds.1.max(value));
            }
        }
        debug!(x, lower = bounds.0, upper = bounds.1, "band evaluated");
        Ok(bounds)
    }

    fn x_range(&self) -> (f64, f64) {
        self.x_range
    }

    fn name(&self) -> &str {
        self.model.name()
    }
}

impl fmt::Debug for NonlinearRegression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NonlinearRegression")
            .field("model", &self.model.name())
            .field("names", &self.names)
            .field("estimates", &self.estimates)
            .field("uncertainties", &self.uncertainties)
            .field("iterations", &self.iterations)
            .field("chi_squared", &self.chi_squared)
            .finish()
    }
}

impl fmt::Display for NonlinearRegression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, name) in self.names.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{} = {}", name, self.estimate(i))?;
        }
        Ok(())
    }
}
