// ============================================================================
// Interfaces Module
// Trait seams between user models, fitted regressions and solver observers
// ============================================================================

mod model;
mod observer;
mod regression;

pub use model::{FnModel, Model};
pub use observer::{FitEvent, FitObserver, LoggingFitObserver, NoOpFitObserver};
pub use regression::{FitCurve, FittedParameter, Regression};
