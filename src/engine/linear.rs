// ============================================================================
// Linear Regression
// Weighted least-squares straight line through measured points
// ============================================================================

use std::fmt;

use tracing::debug;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::domain::{Measurement, MeasurementList, Weighting};
use crate::interfaces::{FittedParameter, Regression};
use crate::numeric::{FitError, MeasureError, MeasureResult};
use crate::units::Unit;
use crate::utils::{weighted_mean, weighted_sum};

use super::weighting::resolve_weights;

/// Fewest points for which the scatter-based uncertainties are defined.
const MIN_POINTS: usize = 3;

/// Straight line `y = m·x + c` fitted with weights `1/σ_y²`.
///
/// The x uncertainties are ignored. Parameter uncertainties come from the
/// weighted residual scatter, so they stay meaningful when every σ_y is zero
/// and the fit falls back to uniform weights.
///
/// ```
/// use lab_measure::{LinearRegression, MeasurementList};
///
/// let x = MeasurementList::new(&[1.0, 2.0, 3.0], 0.1, "s").unwrap();
/// let y = MeasurementList::new(&[3.0, 5.0, 7.0], 0.2, "m").unwrap();
/// let fit = LinearRegression::fit(&x, &y).unwrap();
/// assert!((fit.slope().value() - 2.0).abs() < 1e-12);
/// assert_eq!(fit.slope().unit().to_string(), "m s^{-1}");
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LinearRegression {
    slope: Measurement,
    intercept: Measurement,
    x_unit: Unit,
    /// Raw x values times this factor are in the slope's denominator unit.
    x_scale: f64,
    x_range: (f64, f64),
    points: usize,
    weighted: bool,
    chi_squared: f64,
}

impl LinearRegression {
    pub fn fit(x: &MeasurementList, y: &MeasurementList) -> MeasureResult<Self> {
        if x.len() != y.len() {
            return Err(MeasureError::Length {
                left: x.len(),
                right: y.len(),
            });
        }
        let n = x.len();
        if n < MIN_POINTS {
            return Err(FitError::InsufficientData {
                points: n,
                required: MIN_POINTS,
            }
            .into());
        }

        let xs = x.values();
        let ys = y.values();
        let weights = resolve_weights(&y.uncertainties(), Weighting::Auto)?;
        let w = &weights.values;

        let weight_total: f64 = w.iter().sum();
        let x_mean = weighted_mean(&xs, w);
        let y_mean = weighted_mean(&ys, w);

        let dx: Vec<f64> = xs.iter().map(|xi| xi - x_mean).collect();
        let spread = weighted_sum(&dx.iter().map(|d| d * d).collect::<Vec<_>>(), w);
        let all_equal = xs.iter().all(|&xi| xi == xs[0]);
        if all_equal || !(spread > 0.0 && spread.is_finite()) {
            return Err(FitError::DegenerateAbscissa.into());
        }

        let products: Vec<f64> = dx.iter().zip(&ys).map(|(d, yi)| d * yi).collect();
        let slope = weighted_sum(&products, w) / spread;
        let intercept = y_mean - slope * x_mean;

        let squared_residuals: Vec<f64> = xs
            .iter()
            .zip(&ys)
            .map(|(xi, yi)| (yi - slope * xi - intercept).powi(2))
            .collect();
        let chi_squared = weighted_sum(&squared_residuals, w);
        let dof = (n - 2) as f64;

        let slope_sigma = (chi_squared / (spread * dof)).sqrt();
        let intercept_sigma =
            ((1.0 / weight_total + x_mean * x_mean / spread) * chi_squared / dof).sqrt();

        let (x_scale, slope_unit) = y.unit().multiply_reconciled(x.unit(), -1)?;

        debug!(
            points = n,
            slope,
            intercept,
            chi_squared,
            weighted = weights.absolute,
            "linear regression fitted"
        );

        Ok(Self {
            slope: Measurement::with_unit(slope / x_scale, slope_sigma / x_scale.abs(), slope_unit),
            intercept: Measurement::with_unit(intercept, intercept_sigma, y.unit().clone()),
            x_unit: x.unit().clone(),
            x_scale,
            x_range: value_range(&xs),
            points: n,
            weighted: weights.absolute,
            chi_squared,
        })
    }

    /// Slope in `unit(y)/unit(x)`.
    pub fn slope(&self) -> &Measurement {
        &self.slope
    }

    pub fn intercept(&self) -> &Measurement {
        &self.intercept
    }

    /// Unit of the x data the line was fitted to.
    pub fn x_unit(&self) -> &Unit {
        &self.x_unit
    }

    pub fn points(&self) -> usize {
        self.points
    }

    /// True when the y uncertainties were used as weights.
    pub fn is_weighted(&self) -> bool {
        self.weighted
    }

    /// Weighted sum of squared residuals.
    pub fn chi_squared(&self) -> f64 {
        self.chi_squared
    }

    /// `m·x + c` evaluated with full uncertainty propagation.
    ///
    /// `x` is first converted to the fitted x unit.
    pub fn predict(&self, x: &Measurement) -> MeasureResult<Measurement> {
        let x = x.to(&self.x_unit)?;
        self.intercept.checked_add(&(&self.slope * &x))
    }

    fn raw_slope(&self) -> (f64, f64) {
        (
            self.slope.value() * self.x_scale,
            self.slope.uncertainty() * self.x_scale.abs(),
        )
    }
}

impl Regression for LinearRegression {
    fn parameters(&self) -> Vec<FittedParameter> {
        vec![
            FittedParameter {
                name: "m".to_string(),
                estimate: self.slope.clone(),
            },
            FittedParameter {
                name: "c".to_string(),
                estimate: self.intercept.clone(),
            },
        ]
    }

    fn predict_value(&self, x: f64) -> f64 {
        self.raw_slope().0 * x + self.intercept.value()
    }

    fn band_value(&self, x: f64) -> MeasureResult<(f64, f64)> {
        let centre = self.predict_value(x);
        let width = (self.raw_slope().1 * x).hypot(self.intercept.uncertainty());
        Ok((centre - width, centre + width))
    }

    fn x_range(&self) -> (f64, f64) {
        self.x_range
    }

    fn name(&self) -> &str {
        "linear"
    }
}

impl fmt::Display for LinearRegression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "m = {}\nc = {}", self.slope, self.intercept)
    }
}

pub(crate) fn value_range(values: &[f64]) -> (f64, f64) {
    values
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn voltage_data() -> (MeasurementList, MeasurementList) {
        let x = MeasurementList::new(&[1.3, 3.0, 5.0, 7.0, 8.5, 10.0], 1.0, "V").unwrap();
        let y = MeasurementList::new(
            &[23.0, 55.0, 67.0, 82.0, 88.0, 96.0],
            vec![5.0, 3.0, 7.0, 10.0, 5.0, 6.0],
            "K",
        )
        .unwrap();
        (x, y)
    }

    /// Closed-form weighted fit computed independently of the engine.
    fn reference_fit(x: &[f64], y: &[f64], sigma: &[f64]) -> (f64, f64, f64, f64) {
        let w: Vec<f64> = sigma.iter().map(|s| 1.0 / (s * s)).collect();
        let sw: f64 = w.iter().sum();
        let sx: f64 = w.iter().zip(x).map(|(w, x)| w * x).sum();
        let sy: f64 = w.iter().zip(y).map(|(w, y)| w * y).sum();
        let sxx: f64 = w.iter().zip(x).map(|(w, x)| w * x * x).sum();
        let sxy: f64 = w.iter().zip(x.iter().zip(y)).map(|(w, (x, y))| w * x * y).sum();
        let delta = sw * sxx - sx * sx;
        let m = (sw * sxy - sx * sy) / delta;
        let c = (sxx * sy - sx * sxy) / delta;
        let s: f64 = w
            .iter()
            .zip(x.iter().zip(y))
            .map(|(w, (x, y))| w * (y - m * x - c).powi(2))
            .sum();
        let dof = (x.len() - 2) as f64;
        let d = delta / sw;
        let x_mean = sx / sw;
        let dm = (s / (d * dof)).sqrt();
        let dc = ((1.0 / sw + x_mean * x_mean / d) * s / dof).sqrt();
        (m, c, dm, dc)
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() <= 1e-9 * b.abs().max(1.0)
    }

    #[test]
    fn test_weighted_fit_matches_closed_form() {
        let (x, y) = voltage_data();
        let fit = LinearRegression::fit(&x, &y).unwrap();
        let (m, c, dm, dc) = reference_fit(&x.values(), &y.values(), &y.uncertainties());

        assert!(close(fit.slope().value(), m));
        assert!(close(fit.intercept().value(), c));
        assert!(close(fit.slope().uncertainty(), dm));
        assert!(close(fit.intercept().uncertainty(), dc));
        assert!(fit.is_weighted());
        assert_eq!(fit.points(), 6);
    }

    #[test]
    fn test_fit_units() {
        let (x, y) = voltage_data();
        let fit = LinearRegression::fit(&x, &y).unwrap();
        assert_eq!(fit.slope().unit().to_string(), "V^{-1} K");
        assert_eq!(fit.intercept().unit().to_string(), "K");
    }

    #[test]
    fn test_exact_line_has_zero_uncertainty() {
        let x = MeasurementList::new(&[0.0, 1.0, 2.0, 3.0], 0.0, "s").unwrap();
        let y = MeasurementList::new(&[1.0, 3.0, 5.0, 7.0], 0.5, "m").unwrap();
        let fit = LinearRegression::fit(&x, &y).unwrap();
        assert!(close(fit.slope().value(), 2.0));
        assert!(close(fit.intercept().value(), 1.0));
        assert!(fit.slope().uncertainty() < 1e-12);
        assert!(fit.chi_squared() < 1e-20);
    }

    #[test]
    fn test_zero_uncertainties_fall_back_to_uniform_weights() {
        let xs = [1.0, 2.0, 3.0, 4.0, 5.0];
        let ys = [2.1, 3.9, 6.2, 7.8, 10.1];
        let x = MeasurementList::new(&xs, 0.0, "").unwrap();
        let y = MeasurementList::new(&ys, 0.0, "").unwrap();
        let fit = LinearRegression::fit(&x, &y).unwrap();
        let (m, c, dm, dc) = reference_fit(&xs, &ys, &[1.0; 5]);

        assert!(!fit.is_weighted());
        assert!(close(fit.slope().value(), m));
        assert!(close(fit.intercept().value(), c));
        assert!(close(fit.slope().uncertainty(), dm));
        assert!(close(fit.intercept().uncertainty(), dc));
    }

    #[test]
    fn test_fit_errors() {
        let two = MeasurementList::new(&[1.0, 2.0], 0.1, "").unwrap();
        assert!(matches!(
            LinearRegression::fit(&two, &two),
            Err(MeasureError::Fit(FitError::InsufficientData {
                points: 2,
                required: 3
            }))
        ));

        let flat = MeasurementList::new(&[2.0, 2.0, 2.0], 0.1, "").unwrap();
        let y = MeasurementList::new(&[1.0, 2.0, 3.0], 0.1, "").unwrap();
        assert!(matches!(
            LinearRegression::fit(&flat, &y),
            Err(MeasureError::Fit(FitError::DegenerateAbscissa))
        ));

        let mixed = MeasurementList::new(&[1.0, 2.0, 3.0], vec![0.1, 0.0, 0.1], "").unwrap();
        assert!(matches!(
            LinearRegression::fit(&y, &mixed),
            Err(MeasureError::Fit(FitError::ZeroUncertainty { index: 1 }))
        ));

        let four = MeasurementList::new(&[1.0, 2.0, 3.0, 4.0], 0.1, "").unwrap();
        assert!(matches!(
            LinearRegression::fit(&four, &y),
            Err(MeasureError::Length { left: 4, right: 3 })
        ));
    }

    #[test]
    fn test_prefixed_units_fold_into_slope() {
        let x = MeasurementList::new(&[100.0, 200.0, 300.0], 1.0, "cm").unwrap();
        let y = MeasurementList::new(&[2.0, 4.0, 6.0], 0.1, "m").unwrap();
        let fit = LinearRegression::fit(&x, &y).unwrap();

        assert!(fit.slope().unit().is_empty());
        assert!(close(fit.slope().value(), 2.0));
        assert!(close(fit.predict_value(150.0), 3.0));

        let at = Measurement::new(1.5, 0.0, "m").unwrap();
        let predicted = fit.predict(&at).unwrap();
        assert_eq!(predicted.unit().to_string(), "m");
        assert!(close(predicted.value(), 3.0));
    }

    #[test]
    fn test_predict_propagates_uncertainty() {
        let (x, y) = voltage_data();
        let fit = LinearRegression::fit(&x, &y).unwrap();
        let at = Measurement::new(4.0, 0.0, "V").unwrap();
        let predicted = fit.predict(&at).unwrap();

        assert!(close(predicted.value(), fit.predict_value(4.0)));
        let (lower, upper) = fit.band_value(4.0).unwrap();
        assert!(close(predicted.uncertainty(), (upper - lower) / 2.0));

        let wrong = Measurement::new(4.0, 0.0, "s").unwrap();
        assert!(fit.predict(&wrong).unwrap_err().is_dimension());
    }

    #[test]
    fn test_regression_surface() {
        let (x, y) = voltage_data();
        let fit = LinearRegression::fit(&x, &y).unwrap();
        let names: Vec<String> = fit.parameters().into_iter().map(|p| p.name).collect();
        assert_eq!(names, vec!["m", "c"]);
        assert_eq!(fit.x_range(), (1.3, 10.0));

        let curve = fit.curve(100).unwrap();
        assert_eq!(curve.len(), 100);
        assert!(curve.x[0] < 1.3 && curve.x[99] > 10.0);
        for i in 0..curve.len() {
            assert!(curve.lower[i] <= curve.prediction[i]);
            assert!(curve.prediction[i] <= curve.upper[i]);
        }
    }

    #[test]
    fn test_display() {
        let x = MeasurementList::new(&[0.0, 1.0, 2.0, 3.0], 0.0, "s").unwrap();
        let y = MeasurementList::from_measurements(vec![
            Measurement::new(1.0, 0.5, "m").unwrap(),
            Measurement::new(3.0, 0.5, "m").unwrap(),
            Measurement::new(5.0, 0.5, "m").unwrap(),
            Measurement::new(7.0, 0.5, "m").unwrap(),
        ])
        .unwrap();
        let fit = LinearRegression::fit(&x, &y).unwrap();
        let text = fit.to_string();
        assert!(text.starts_with("m = "));
        assert!(text.contains("\nc = "));
    }
}
