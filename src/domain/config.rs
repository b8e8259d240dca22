// ============================================================================
// Fit Configuration
// Solver settings for nonlinear regression, with builders and presets
// ============================================================================

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::numeric::FitError;

/// Band evaluation is 2^k model calls; this is the largest k ever allowed.
pub const BAND_PARAMETER_HARD_LIMIT: usize = 24;

// ============================================================================
// Weighting Mode
// ============================================================================

/// How y uncertainties turn into least-squares weights.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Weighting {
    /// Absolute σ when every point has one, unweighted when none has,
    /// error when the data mixes the two
    #[default]
    Auto,

    /// Weights 1/σ², covariance taken as is
    Absolute,

    /// Unit weights, covariance scaled by the residual variance
    Unweighted,
}

// ============================================================================
// Fit Configuration
// ============================================================================

/// Settings for the Levenberg–Marquardt solver.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FitConfig {
    /// Iteration cap before giving up
    pub max_iterations: usize,

    /// Relative decrease in χ² below which the fit counts as converged
    pub tolerance: f64,

    /// Relative parameter step below which the fit counts as converged
    pub parameter_tolerance: f64,

    /// Starting damping factor λ
    pub initial_damping: f64,

    /// Largest parameter count for which uncertainty bands are evaluated
    pub max_band_parameters: usize,

    pub weighting: Weighting,
}

impl FitConfig {
    pub fn new() -> Self {
        Self {
            max_iterations: 200,
            tolerance: 1e-10,
            parameter_tolerance: 1e-10,
            initial_damping: 1e-3,
            max_band_parameters: 16,
            weighting: Weighting::Auto,
        }
    }

    pub fn with_max_iterations(mut self, iterations: usize) -> Self {
        self.max_iterations = iterations;
        self
    }

    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn with_parameter_tolerance(mut self, tolerance: f64) -> Self {
        self.parameter_tolerance = tolerance;
        self
    }

    pub fn with_initial_damping(mut self, damping: f64) -> Self {
        self.initial_damping = damping;
        self
    }

    pub fn with_max_band_parameters(mut self, parameters: usize) -> Self {
        self.max_band_parameters = parameters;
        self
    }

    pub fn with_weighting(mut self, weighting: Weighting) -> Self {
        self.weighting = weighting;
        self
    }

    pub fn validate(&self) -> Result<(), FitError> {
        if self.max_iterations == 0 {
            return Err(FitError::InvalidConfig(
                "max_iterations must be at least 1".to_string(),
            ));
        }

        if !(self.tolerance.is_finite() && self.tolerance > 0.0) {
            return Err(FitError::InvalidConfig(
                "tolerance must be positive".to_string(),
            ));
        }

        if !(self.parameter_tolerance.is_finite() && self.parameter_tolerance > 0.0) {
            return Err(FitError::InvalidConfig(
                "parameter_tolerance must be positive".to_string(),
            ));
        }

        if !(self.initial_damping.is_finite() && self.initial_damping > 0.0) {
            return Err(FitError::InvalidConfig(
                "initial_damping must be positive".to_string(),
            ));
        }

        if self.max_band_parameters > BAND_PARAMETER_HARD_LIMIT {
            return Err(FitError::InvalidConfig(format!(
                "max_band_parameters cannot exceed {}",
                BAND_PARAMETER_HARD_LIMIT
            )));
        }

        Ok(())
    }
}

impl Default for FitConfig {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Presets
// ============================================================================

impl FitConfig {
    /// Tight tolerances and a long iteration budget.
    pub fn precise() -> Self {
        Self::new()
            .with_max_iterations(2000)
            .with_tolerance(1e-14)
            .with_parameter_tolerance(1e-14)
    }

    /// Loose tolerances for quick exploratory fits.
    pub fn fast() -> Self {
        Self::new()
            .with_max_iterations(50)
            .with_tolerance(1e-6)
            .with_parameter_tolerance(1e-6)
            .with_max_band_parameters(8)
    }
}
