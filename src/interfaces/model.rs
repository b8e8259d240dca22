// ============================================================================
// Model Interface
// Functional form y = f(x; p) fitted by nonlinear regression
// ============================================================================

use std::fmt;
use std::sync::Arc;

/// A model function with a fixed number of parameters.
///
/// Parameters are plain numbers; the fitted estimates come back as
/// dimensionless measurements.
pub trait Model: Send + Sync {
    /// Evaluate the model at `x`.
    fn eval(&self, x: f64, params: &[f64]) -> f64;

    fn parameter_count(&self) -> usize;

    /// Names used in reports, `p0, p1, ...` unless overridden.
    fn parameter_names(&self) -> Vec<String> {
        (0..self.parameter_count()).map(|i| format!("p{}", i)).collect()
    }

    fn name(&self) -> &str {
        "model"
    }
}

/// Wraps a closure as a [`Model`].
///
/// ```
/// use lab_measure::interfaces::{FnModel, Model};
///
/// let decay = FnModel::new(2, |t: f64, p: &[f64]| p[0] * (-t / p[1]).exp())
///     .with_name("decay")
///     .with_parameter_names(["amplitude", "tau"]);
/// assert_eq!(decay.parameter_names(), vec!["amplitude", "tau"]);
/// assert_eq!(decay.eval(0.0, &[3.0, 1.0]), 3.0);
/// ```
pub struct FnModel<F> {
    function: F,
    parameter_count: usize,
    names: Option<Vec<String>>,
    name: String,
}

impl<F> FnModel<F>
where
    F: Fn(f64, &[f64]) -> f64 + Send + Sync,
{
    pub fn new(parameter_count: usize, function: F) -> Self {
        Self {
            function,
            parameter_count,
            names: None,
            name: "model".to_string(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Names beyond the parameter count are ignored; missing ones fall back to `pN`.
    pub fn with_parameter_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.names = Some(names.into_iter().map(Into::into).collect());
        self
    }
}

impl<F> Model for FnModel<F>
where
    F: Fn(f64, &[f64]) -> f64 + Send + Sync,
{
    fn eval(&self, x: f64, params: &[f64]) -> f64 {
        (self.function)(x, params)
    }

    fn parameter_count(&self) -> usize {
        self.parameter_count
    }

    fn parameter_names(&self) -> Vec<String> {
        let given = self.names.as_deref().unwrap_or(&[]);
        (0..self.parameter_count)
            .map(|i| given.get(i).cloned().unwrap_or_else(|| format!("p{}", i)))
            .collect()
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl<F> fmt::Debug for FnModel<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnModel")
            .field("name", &self.name)
            .field("parameter_count", &self.parameter_count)
            .field("names", &self.names)
            .finish()
    }
}

impl<M: Model + ?Sized> Model for Box<M> {
    fn eval(&self, x: f64, params: &[f64]) -> f64 {
        (**self).eval(x, params)
    }

    fn parameter_count(&self) -> usize {
        (**self).parameter_count()
    }

    fn parameter_names(&self) -> Vec<String> {
        (**self).parameter_names()
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

impl<M: Model + ?Sized> Model for Arc<M> {
    fn eval(&self, x: f64, params: &[f64]) -> f64 {
        (**self).eval(x, params)
    }

    fn parameter_count(&self) -> usize {
        (**self).parameter_count()
    }

    fn parameter_names(&self) -> Vec<String> {
        (**self).parameter_names()
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}
