// ============================================================================
// Regression Interface
// Read-only surface shared by fitted linear and nonlinear models
// ============================================================================

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::domain::Measurement;
use crate::numeric::{FitError, MeasureResult};
use crate::utils::linspace;

/// Fraction of the data span added on each side of a plotted curve.
const CURVE_MARGIN: f64 = 0.1;

/// A named parameter estimate.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FittedParameter {
    pub name: String,
    pub estimate: Measurement,
}

/// Sampled best-fit curve with its uncertainty band, ready for plotting.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FitCurve {
    pub x: Vec<f64>,
    pub prediction: Vec<f64>,
    pub lower: Vec<f64>,
    pub upper: Vec<f64>,
}

impl FitCurve {
    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }
}

/// Common interface of fitted models.
///
/// Values passed to `predict_value` and `band_value` are plain numbers in the
/// unit of the fitted x data.
pub trait Regression {
    /// Parameter estimates in declaration order.
    fn parameters(&self) -> Vec<FittedParameter>;

    /// Best-fit value at `x`.
    fn predict_value(&self, x: f64) -> f64;

    /// Lower and upper edge of the uncertainty band at `x`.
    fn band_value(&self, x: f64) -> MeasureResult<(f64, f64)>;

    /// Smallest and largest fitted x value.
    fn x_range(&self) -> (f64, f64);

    fn name(&self) -> &str;

    /// Curve and band sampled at `samples` evenly spaced points spanning the
    /// data range widened by a tenth on each side.
    fn curve(&self, samples: usize) -> MeasureResult<FitCurve> {
        if samples < 2 {
            return Err(FitError::InsufficientData {
                points: samples,
                required: 2,
            }
            .into());
        }

        let (min, max) = self.x_range();
        let margin = (max - min) * CURVE_MARGIN;
        let x = linspace(min - margin, max + margin, samples);

        let mut curve = FitCurve {
            prediction: Vec::with_capacity(samples),
            lower: Vec::with_capacity(samples),
            upper: Vec::with_capacity(samples),
            x: Vec::new(),
        };
        for &xi in &x {
            let (lower, upper) = self.band_value(xi)?;
            curve.prediction.push(self.predict_value(xi));
            curve.lower.push(lower);
            curve.upper.push(upper);
        }
        curve.x = x;
        Ok(curve)
    }
}
