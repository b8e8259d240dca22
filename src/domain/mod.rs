// ============================================================================
// Domain Models Module
// Measurements, measurement lists and fitting configuration
// ============================================================================

pub mod config;
mod measurement;
mod measurement_list;

pub use config::{FitConfig, Weighting, BAND_PARAMETER_HARD_LIMIT};
pub use measurement::{Measurement, QuantityId};
pub use measurement_list::{ListUncertainty, MeasurementList, TableParts};
