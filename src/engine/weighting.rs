// ============================================================================
// Least-Squares Weights
// ============================================================================

use tracing::warn;

use crate::domain::Weighting;
use crate::numeric::FitError;

/// Per-point weights and whether they came from absolute uncertainties.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Weights {
    pub values: Vec<f64>,
    pub absolute: bool,
}

impl Weights {
    fn uniform(n: usize) -> Self {
        Self {
            values: vec![1.0; n],
            absolute: false,
        }
    }

    fn inverse_variance(sigmas: &[f64]) -> Self {
        Self {
            values: sigmas.iter().map(|s| 1.0 / (s * s)).collect(),
            absolute: true,
        }
    }
}

/// Turn y uncertainties into weights `1/σ²` according to `mode`.
pub(crate) fn resolve_weights(sigmas: &[f64], mode: Weighting) -> Result<Weights, FitError> {
    let first_zero = sigmas.iter().position(|&s| s == 0.0);

    match mode {
        Weighting::Unweighted => Ok(Weights::uniform(sigmas.len())),
        Weighting::Absolute => match first_zero {
            Some(index) => Err(FitError::ZeroUncertainty { index }),
            None => Ok(Weights::inverse_variance(sigmas)),
        },
        Weighting::Auto => match first_zero {
            None => Ok(Weights::inverse_variance(sigmas)),
            Some(_) if sigmas.iter().all(|&s| s == 0.0) => {
                warn!(
                    points = sigmas.len(),
                    "all y uncertainties are zero, falling back to unweighted least squares"
                );
                Ok(Weights::uniform(sigmas.len()))
            }
            Some(index) => Err(FitError::ZeroUncertainty { index }),
        },
    }
}
