// ============================================================================
// Significant-Figure Rounding
// Decimal rounding and the uncertainty-driven display rule
// ============================================================================
//
// Rounding is round-half-even on the exact binary value of the float, which
// rust_decimal gives us by retaining every bit of the f64 before rounding.
// Floats are printed in their shortest round-trip form, with a trailing ".0"
// when integral and exponent notation outside [1e-4, 1e16).

use rust_decimal::{Decimal, RoundingStrategy};

/// Largest power of ten we rescale through `Decimal` for negative digit counts.
const MAX_DECIMAL_SHIFT: u32 = 18;

/// `Decimal` cannot hold more fractional digits than this.
const MAX_DECIMAL_SCALE: i32 = 28;

/// Round `x` to `ndigits` decimal places (negative counts round to tens,
/// hundreds, ...), ties to even.
pub fn round_half_even(x: f64, ndigits: i32) -> f64 {
    if !x.is_finite() {
        return x;
    }
    match round_decimal(x, ndigits) {
        Some(rounded) => {
            let parsed = rounded.normalize().to_string().parse::<f64>();
            match parsed {
                // Keep the sign of a value that rounded to zero
                Ok(value) if value == 0.0 => 0.0f64.copysign(x),
                Ok(value) => value,
                Err(_) => round_binary(x, ndigits),
            }
        }
        None => round_binary(x, ndigits),
    }
}

fn round_decimal(x: f64, ndigits: i32) -> Option<Decimal> {
    if ndigits > MAX_DECIMAL_SCALE {
        return None;
    }
    let exact = Decimal::from_f64_retain(x)?;
    // Values below the Decimal resolution collapse to zero
    if exact.is_zero() && x != 0.0 {
        return None;
    }
    if ndigits >= 0 {
        return Some(
            exact.round_dp_with_strategy(ndigits as u32, RoundingStrategy::MidpointNearestEven),
        );
    }

    let shift = ndigits.unsigned_abs();
    if shift > MAX_DECIMAL_SHIFT {
        return None;
    }
    let scale = Decimal::new(10i64.pow(shift), 0);
    exact
        .checked_div(scale)?
        .round_dp_with_strategy(0, RoundingStrategy::MidpointNearestEven)
        .checked_mul(scale)
}

fn round_binary(x: f64, ndigits: i32) -> f64 {
    let scale = 10f64.powi(ndigits);
    (x * scale).round_ties_even() / scale
}

/// Number of decimal places implied by an uncertainty's leading digit.
///
/// Computed twice so that an uncertainty which rounds up to the next power
/// of ten (98 -> 100) lands on the shifted digit.
pub fn significant_decimals(uncertainty: f64) -> i32 {
    let first = leading_decimals(uncertainty);
    let rounded = round_half_even(uncertainty, first);
    if rounded == 0.0 || !rounded.is_finite() {
        return first;
    }
    leading_decimals(rounded)
}

fn leading_decimals(x: f64) -> i32 {
    let exponent = x.abs().log10().floor();
    if !exponent.is_finite() {
        return 0;
    }
    (exponent as i32).saturating_neg()
}

/// Shortest round-trip representation of a float.
pub fn format_float(x: f64) -> String {
    if x.is_nan() {
        return "nan".to_string();
    }
    if x.is_infinite() {
        return if x > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    if x == 0.0 {
        return if x.is_sign_negative() { "-0.0" } else { "0.0" }.to_string();
    }

    let scientific = format!("{:e}", x);
    let (mantissa, exponent) = match scientific.split_once('e') {
        Some((m, e)) => (m, e.parse::<i32>().unwrap_or(0)),
        None => (scientific.as_str(), 0),
    };

    if (-4..16).contains(&exponent) {
        let plain = format!("{}", x);
        if plain.contains('.') {
            plain
        } else {
            format!("{}.0", plain)
        }
    } else {
        let sign = if exponent < 0 { '-' } else { '+' };
        format!("{}e{}{:02}", mantissa, sign, exponent.unsigned_abs())
    }
}

/// Round to `ndigits` decimal places and print as a float.
pub fn format_rounded(x: f64, ndigits: i32) -> String {
    format_float(round_half_even(x, ndigits))
}

/// Round to the nearest integer (ties to even) and print without a decimal point.
pub fn format_rounded_integer(x: f64) -> String {
    let rounded = round_half_even(x, 0);
    if rounded == 0.0 {
        "0".to_string()
    } else {
        format!("{:.0}", rounded)
    }
}

/// Render a value with its uncertainty using the uncertainty's significant decimals.
///
/// - `d >= 3` or `d < 0`: `(v ± u) × 10^{-d}` with integer mantissas
/// - `0 < d < 3`: decimals rounded to `d` places
/// - `d == 0`: integers
///
/// A zero (or non-finite) uncertainty prints the bare value.
pub fn format_with_uncertainty(value: f64, uncertainty: f64) -> String {
    if uncertainty == 0.0 || !uncertainty.is_finite() {
        return format_float(value);
    }

    let digits = significant_decimals(uncertainty);
    if digits >= 3 || digits < 0 {
        let scale = 10f64.powi(digits);
        format!(
            "({} ± {}) × 10^{{{}}}",
            format_rounded_integer(value * scale),
            format_rounded_integer(uncertainty * scale),
            -digits
        )
    } else if digits > 0 {
        format!(
            "{} ± {}",
            format_rounded(value, digits),
            format_rounded(uncertainty, digits)
        )
    } else {
        format!(
            "{} ± {}",
            format_rounded_integer(value),
            format_rounded_integer(uncertainty)
        )
    }
}

/// Swap the plain-text operators for their LaTeX commands.
pub fn latex_operators(text: &str) -> String {
    text.replace('±', "\\pm").replace('×', "\\times")
}
