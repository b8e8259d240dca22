// ============================================================================
// Lab Measure Library
// Physical measurements with units, uncertainty propagation and regression
// ============================================================================

//! # Lab Measure
//!
//! Arithmetic on measured quantities for laboratory reports.
//!
//! ## Features
//!
//! - **Units** parsed from strings like `"kg m^2 / s^2"`, with SI prefixes,
//!   derived units and a process-wide registry for custom symbols
//! - **Measurements** that carry an absolute uncertainty through every
//!   operation and print with the significant-figure convention
//! - **Measurement lists** with elementwise arithmetic and LaTeX table rows
//! - **Regression**: weighted linear least squares and Levenberg–Marquardt
//!   nonlinear fits whose parameters come back as measurements
//!
//! ## Example
//!
//! ```rust
//! use lab_measure::prelude::*;
//!
//! let voltage = MeasurementList::new(&[1.3, 3.0, 5.0, 7.0, 8.5, 10.0], 1.0, "V").unwrap();
//! let temperature = MeasurementList::new(
//!     &[23.0, 55.0, 67.0, 82.0, 88.0, 96.0],
//!     vec![5.0, 3.0, 7.0, 10.0, 5.0, 6.0],
//!     "K",
//! )
//! .unwrap();
//!
//! let fit = LinearRegression::fit(&voltage, &temperature).unwrap();
//! println!("{}", fit);
//! assert_eq!(fit.slope().unit().to_string(), "V^{-1} K");
//!
//! let x = Measurement::new(1.1, 0.3, "m").unwrap();
//! let y = Measurement::new(2.22, 0.4, "m").unwrap();
//! assert_eq!((&x * &y).to_string(), "2.4 ± 0.8 m^2");
//! ```

pub mod domain;
pub mod engine;
pub mod interfaces;
pub mod numeric;
pub mod units;
pub mod utils;

pub use domain::{ListUncertainty, Measurement, MeasurementList, TableParts};
pub use engine::{LinearRegression, NonlinearFitBuilder, NonlinearRegression};
pub use numeric::{MeasureError, MeasureResult};
pub use units::{register_unit, Unit};

// Re-exports for convenience
pub mod prelude {
    pub use crate::domain::{
        FitConfig, ListUncertainty, Measurement, MeasurementList, QuantityId, TableParts,
        Weighting,
    };
    pub use crate::engine::{
        fit_model, FitReport, LinearRegression, NonlinearFitBuilder, NonlinearRegression,
    };
    pub use crate::interfaces::{
        FitCurve, FitEvent, FitObserver, FittedParameter, FnModel, LoggingFitObserver, Model,
        NoOpFitObserver, Regression,
    };
    pub use crate::numeric::{FitError, MeasureError, MeasureResult, ParseError, UnitError};
    pub use crate::units::{register_unit, Prefix, Unit};
}
