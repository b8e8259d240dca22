// ============================================================================
// Engine Module
// Linear and nonlinear regression over measurement lists
// ============================================================================

mod linear;
mod nonlinear;
mod solver;
mod weighting;

pub mod factory;

pub use factory::{fit_model, NonlinearFitBuilder};
pub use linear::LinearRegression;
pub use nonlinear::{FitReport, NonlinearRegression};
