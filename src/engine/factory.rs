// ============================================================================
// Fit Factory
// Builds nonlinear regressions from a model, configuration and observer
// ============================================================================

use std::sync::Arc;

use crate::domain::{FitConfig, MeasurementList};
use crate::engine::NonlinearRegression;
use crate::interfaces::{FitObserver, Model, NoOpFitObserver};
use crate::numeric::{FitError, MeasureResult};

// ============================================================================
// Builder
// ============================================================================

/// Step-by-step setup of a nonlinear fit.
///
/// # Example
/// ```
/// use lab_measure::prelude::*;
/// use std::sync::Arc;
///
/// let t = MeasurementList::new(&[0.0, 1.0, 2.0, 3.0, 4.0], 0.0, "s").unwrap();
/// let v = MeasurementList::new(&[8.0, 4.0, 2.0, 1.0, 0.5], 0.05, "V").unwrap();
///
/// let fit = NonlinearFitBuilder::new()
///     .model(FnModel::new(2, |t: f64, p: &[f64]| p[0] * (-t / p[1]).exp()))
///     .initial_guess(vec![5.0, 1.0])
///     .config(FitConfig::precise())
///     .observer(Arc::new(LoggingFitObserver))
///     .fit(&t, &v)
///     .unwrap();
/// assert!((fit.estimates()[0] - 8.0).abs() < 1e-6);
/// ```
#[derive(Clone, Default)]
pub struct NonlinearFitBuilder {
    model: Option<Arc<dyn Model>>,
    initial_guess: Option<Vec<f64>>,
    config: FitConfig,
    observer: Option<Arc<dyn FitObserver>>,
}

impl NonlinearFitBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn model(mut self, model: impl Model + 'static) -> Self {
        self.model = Some(Arc::new(model));
        self
    }

    /// Use an already shared model.
    pub fn shared_model(mut self, model: Arc<dyn Model>) -> Self {
        self.model = Some(model);
        self
    }

    pub fn initial_guess(mut self, guess: impl Into<Vec<f64>>) -> Self {
        self.initial_guess = Some(guess.into());
        self
    }

    pub fn config(mut self, config: FitConfig) -> Self {
        self.config = config;
        self
    }

    pub fn observer(mut self, observer: Arc<dyn FitObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Run the fit. Fails with an invalid-config error when no model was set.
    pub fn fit(&self, x: &MeasurementList, y: &MeasurementList) -> MeasureResult<NonlinearRegression> {
        let model = self
            .model
            .clone()
            .ok_or_else(|| FitError::InvalidConfig("no model set".to_string()))?;
        self.config.validate()?;

        let observer: &dyn FitObserver = match &self.observer {
            Some(observer) => observer.as_ref(),
            None => &NoOpFitObserver,
        };
        NonlinearRegression::fit(
            model,
            x,
            y,
            self.initial_guess.as_deref(),
            &self.config,
            observer,
        )
    }
}

// ============================================================================
// Shortcuts
// ============================================================================

/// Fit with default configuration and no observer.
pub fn fit_model(
    model: impl Model + 'static,
    x: &MeasurementList,
    y: &MeasurementList,
    initial_guess: Option<&[f64]>,
) -> MeasureResult<NonlinearRegression> {
    NonlinearRegression::fit(
        Arc::new(model),
        x,
        y,
        initial_guess,
        &FitConfig::default(),
        &NoOpFitObserver,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interfaces::{FitEvent, FnModel};
    use crate::numeric::MeasureError;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Counter(Mutex<usize>);

    impl FitObserver for Counter {
        fn on_event(&self, _event: &FitEvent) {
            *self.0.lock() += 1;
        }
    }

    fn data() -> (MeasurementList, MeasurementList) {
        let x = MeasurementList::new(&[0.0, 1.0, 2.0, 3.0], 0.0, "m").unwrap();
        let y = MeasurementList::new(&[1.0, 3.0, 9.0, 19.0], 0.5, "s").unwrap();
        (x, y)
    }

    #[test]
    fn test_builder_requires_model() {
        let (x, y) = data();
        let err = NonlinearFitBuilder::new().fit(&x, &y).unwrap_err();
        assert!(matches!(err, MeasureError::Fit(FitError::InvalidConfig(_))));
    }

    #[test]
    fn test_builder_fits_quadratic() {
        let (x, y) = data();
        let counter = Arc::new(Counter::default());
        let fit = NonlinearFitBuilder::new()
            .model(FnModel::new(2, |x: f64, p: &[f64]| p[0] * x * x + p[1]))
            .observer(counter.clone())
            .fit(&x, &y)
            .unwrap();

        assert!((fit.estimates()[0] - 2.0).abs() < 1e-6);
        assert!((fit.estimates()[1] - 1.0).abs() < 1e-6);
        assert!(*counter.0.lock() >= 2);
    }

    #[test]
    fn test_builder_validates_config() {
        let (x, y) = data();
        let err = NonlinearFitBuilder::new()
            .model(FnModel::new(1, |x: f64, p: &[f64]| p[0] * x))
            .config(FitConfig::default().with_tolerance(-1.0))
            .fit(&x, &y)
            .unwrap_err();
        assert!(matches!(err, MeasureError::Fit(FitError::InvalidConfig(_))));
    }

    #[test]
    fn test_fit_model_shortcut() {
        let (x, y) = data();
        let fit = fit_model(
            FnModel::new(2, |x: f64, p: &[f64]| p[0] * x * x + p[1]),
            &x,
            &y,
            Some(&[1.0, 0.0]),
        )
        .unwrap();
        assert!((fit.estimates()[0] - 2.0).abs() < 1e-6);
    }
}
