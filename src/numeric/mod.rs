// ============================================================================
// Numeric Module
// Error taxonomy and decimal rounding shared by every layer
// ============================================================================
//
// This module provides:
// - MeasureError and its families (parse, unit, dimension, length, fit)
// - Round-half-even decimal rounding on the exact binary value of a float
// - The significant-figure rule that drives every measurement display

mod errors;
mod rounding;

pub use errors::{FitError, MeasureError, MeasureResult, ParseError, UnitError};
pub use rounding::{
    format_float, format_rounded, format_rounded_integer, format_with_uncertainty,
    latex_operators, round_half_even, significant_decimals,
};
