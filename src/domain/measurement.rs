// ============================================================================
// Measurement Domain Model
// A value with an absolute uncertainty and a unit
// ============================================================================

use std::fmt;
use std::ops::{Add, Div, Mul, Neg, Sub};

use tracing::trace;
use uuid::Uuid;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::numeric::{format_with_uncertainty, latex_operators, MeasureError, MeasureResult};
use crate::units::Unit;

// ============================================================================
// Value Objects
// ============================================================================

/// Identity of the physical quantity a measurement stands for.
///
/// Two operands with the same id are treated as fully correlated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct QuantityId(Uuid);

impl QuantityId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for QuantityId {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Measurement
// ============================================================================

/// A physical quantity: value ± absolute uncertainty, in a unit.
///
/// Measurements are immutable. Cloning (and negating) keeps the quantity
/// identity, so `&x + &x` is propagated as fully correlated while two
/// separately built equal measurements combine in quadrature.
///
/// ```
/// use lab_measure::Measurement;
///
/// let x = Measurement::new(1.1, 0.3, "m").unwrap();
/// let y = Measurement::new(2.22, 0.4, "m").unwrap();
/// assert_eq!((&x + &y).unwrap().to_string(), "3.3 ± 0.5 m");
/// assert_eq!((&x * &y).to_string(), "2.4 ± 0.8 m^2");
/// ```
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Measurement {
    value: f64,
    uncertainty: f64,
    unit: Unit,
    #[cfg_attr(feature = "serde", serde(skip))]
    id: QuantityId,
}

impl Measurement {
    /// Parse `unit` and build a measurement. The sign of `uncertainty` is dropped.
    pub fn new(value: f64, uncertainty: f64, unit: &str) -> MeasureResult<Self> {
        Ok(Self::with_unit(value, uncertainty, Unit::parse(unit)?))
    }

    pub fn with_unit(value: f64, uncertainty: f64, unit: Unit) -> Self {
        Self {
            value,
            uncertainty: uncertainty.abs(),
            unit,
            id: QuantityId::new(),
        }
    }

    /// A value known without uncertainty.
    pub fn exact(value: f64, unit: Unit) -> Self {
        Self::with_unit(value, 0.0, unit)
    }

    pub fn dimensionless(value: f64, uncertainty: f64) -> Self {
        Self::with_unit(value, uncertainty, Unit::dimensionless())
    }

    #[inline]
    pub fn value(&self) -> f64 {
        self.value
    }

    #[inline]
    pub fn uncertainty(&self) -> f64 {
        self.uncertainty
    }

    #[inline]
    pub fn unit(&self) -> &Unit {
        &self.unit
    }

    #[inline]
    pub fn id(&self) -> QuantityId {
        self.id
    }

    /// `uncertainty / |value|`, zero for a zero value.
    pub fn relative_uncertainty(&self) -> f64 {
        if self.value == 0.0 {
            0.0
        } else {
            self.uncertainty / self.value.abs()
        }
    }

    pub fn is_same_quantity(&self, other: &Measurement) -> bool {
        self.id == other.id
    }

    /// Copy that no longer correlates with `self`.
    pub fn independent(&self) -> Measurement {
        Measurement {
            id: QuantityId::new(),
            ..self.clone()
        }
    }

    // ------------------------------------------------------------------------
    // Addition and subtraction
    // ------------------------------------------------------------------------

    /// Sum; the other operand is converted into this unit when compatible.
    pub fn checked_add(&self, other: &Measurement) -> MeasureResult<Measurement> {
        self.sum(other, self.is_same_quantity(other), "add")
    }

    pub fn checked_sub(&self, other: &Measurement) -> MeasureResult<Measurement> {
        self.sum(&-other, self.is_same_quantity(other), "subtract")
    }

    /// Sum with uncertainties added linearly, whatever the identities.
    pub fn add_correlated(&self, other: &Measurement) -> MeasureResult<Measurement> {
        self.sum(other, true, "add")
    }

    pub fn sub_correlated(&self, other: &Measurement) -> MeasureResult<Measurement> {
        self.sum(&-other, true, "subtract")
    }

    fn sum(
        &self,
        other: &Measurement,
        correlated: bool,
        operation: &'static str,
    ) -> MeasureResult<Measurement> {
        let (value, uncertainty) = if self.unit == other.unit {
            (other.value, other.uncertainty)
        } else {
            let factor = other
                .unit
                .conversion_factor(&self.unit)
                .map_err(|_| MeasureError::dimension(operation, &self.unit, &other.unit))?;
            (other.value * factor, other.uncertainty * factor.abs())
        };

        let uncertainty = if correlated {
            self.uncertainty + uncertainty
        } else {
            self.uncertainty.hypot(uncertainty)
        };
        Ok(Measurement::with_unit(
            self.value + value,
            uncertainty,
            self.unit.clone(),
        ))
    }

    // ------------------------------------------------------------------------
    // Multiplication and division
    // ------------------------------------------------------------------------

    /// Product; fails only when a unit exponent overflows.
    pub fn checked_mul(&self, other: &Measurement) -> MeasureResult<Measurement> {
        self.product(other, self.is_same_quantity(other))
    }

    pub fn checked_div(&self, other: &Measurement) -> MeasureResult<Measurement> {
        self.quotient(other, self.is_same_quantity(other))
    }

    /// Product with relative uncertainties added linearly.
    pub fn mul_correlated(&self, other: &Measurement) -> MeasureResult<Measurement> {
        self.product(other, true)
    }

    /// Quotient with relative uncertainties subtracted.
    pub fn div_correlated(&self, other: &Measurement) -> MeasureResult<Measurement> {
        self.quotient(other, true)
    }

    // Relative uncertainties do not depend on the prefix rescaling of `other`,
    // and an exact zero contributes none.
    fn product(&self, other: &Measurement, correlated: bool) -> MeasureResult<Measurement> {
        let (factor, unit) = self.unit.multiply_reconciled(&other.unit, 1)?;
        let value = self.value * other.value * factor;
        let (r1, r2) = (self.relative_uncertainty(), other.relative_uncertainty());

        let relative = if correlated { r1 + r2 } else { r1.hypot(r2) };
        Ok(Measurement::with_unit(value, value.abs() * relative, unit))
    }

    fn quotient(&self, other: &Measurement, correlated: bool) -> MeasureResult<Measurement> {
        let (factor, unit) = self.unit.multiply_reconciled(&other.unit, -1)?;
        if self.is_same_quantity(other) {
            return Ok(Measurement::with_unit(1.0, 0.0, unit));
        }

        let value = self.value / (other.value * factor);
        let (r1, r2) = (self.relative_uncertainty(), other.relative_uncertainty());
        let relative = if correlated { (r1 - r2).abs() } else { r1.hypot(r2) };
        Ok(Measurement::with_unit(value, value.abs() * relative, unit))
    }

    // ------------------------------------------------------------------------
    // Powers
    // ------------------------------------------------------------------------

    /// Integer power.
    ///
    /// # Panics
    ///
    /// Panics if a unit exponent overflows; see [`Measurement::checked_powi`].
    pub fn powi(&self, exponent: i32) -> Measurement {
        unwrap_operator(self.checked_powi(exponent))
    }

    pub fn checked_powi(&self, exponent: i32) -> MeasureResult<Measurement> {
        let unit = self.unit.checked_powi(exponent)?;
        let value = self.value.powi(exponent);
        let uncertainty = (value * exponent as f64).abs() * self.relative_uncertainty();
        Ok(Measurement::with_unit(value, uncertainty, unit))
    }

    /// Real power; fails when the unit would get a fractional exponent.
    pub fn powf(&self, exponent: f64) -> MeasureResult<Measurement> {
        let unit = self.unit.powf(exponent)?;
        let value = self.value.powf(exponent);
        let uncertainty = (value * exponent).abs() * self.relative_uncertainty();
        Ok(Measurement::with_unit(value, uncertainty, unit))
    }

    /// Power with an uncertain, dimensionless exponent.
    pub fn pow(&self, exponent: &Measurement) -> MeasureResult<Measurement> {
        let (e, ue) = exponent.dimensionless_parts("pow")?;
        let unit = self.unit.powf(e)?;
        let value = self.value.powf(e);
        let uncertainty = value.abs()
            * (e * self.relative_uncertainty()).hypot(self.value.ln() * ue);
        Ok(Measurement::with_unit(value, uncertainty, unit))
    }

    /// `base` raised to this (dimensionless) measurement.
    pub fn rpow(&self, base: f64) -> MeasureResult<Measurement> {
        let (v, u) = self.dimensionless_parts("pow")?;
        let value = base.powf(v);
        Ok(Measurement::dimensionless(value, (value * base.ln()).abs() * u))
    }

    pub fn sqrt(&self) -> MeasureResult<Measurement> {
        self.powf(0.5)
    }

    // ------------------------------------------------------------------------
    // Functions of dimensionless quantities
    // ------------------------------------------------------------------------

    fn dimensionless_parts(&self, function: &'static str) -> MeasureResult<(f64, f64)> {
        if self.unit.is_empty() {
            return Ok((self.value, self.uncertainty));
        }
        let factor = self
            .unit
            .conversion_factor(&Unit::dimensionless())
            .map_err(|_| MeasureError::not_dimensionless(function, &self.unit))?;
        Ok((self.value * factor, self.uncertainty * factor.abs()))
    }

    fn apply(
        &self,
        function: &'static str,
        f: impl FnOnce(f64, f64) -> (f64, f64),
    ) -> MeasureResult<Measurement> {
        let (v, u) = self.dimensionless_parts(function)?;
        let (value, uncertainty) = f(v, u);
        Ok(Measurement::dimensionless(value, uncertainty))
    }

    pub fn sin(&self) -> MeasureResult<Measurement> {
        self.apply("sin", |v, u| (v.sin(), v.cos().abs() * u))
    }

    pub fn cos(&self) -> MeasureResult<Measurement> {
        self.apply("cos", |v, u| (v.cos(), v.sin().abs() * u))
    }

    pub fn tan(&self) -> MeasureResult<Measurement> {
        self.apply("tan", |v, u| (v.tan(), u / v.cos().powi(2)))
    }

    pub fn asin(&self) -> MeasureResult<Measurement> {
        self.apply("asin", |v, u| (v.asin(), u / (1.0 - v * v).sqrt()))
    }

    pub fn acos(&self) -> MeasureResult<Measurement> {
        self.apply("acos", |v, u| (v.acos(), u / (1.0 - v * v).sqrt()))
    }

    pub fn atan(&self) -> MeasureResult<Measurement> {
        self.apply("atan", |v, u| (v.atan(), u / (1.0 + v * v)))
    }

    /// Natural logarithm; the uncertainty is the relative uncertainty.
    pub fn log(&self) -> MeasureResult<Measurement> {
        self.apply("log", |v, u| {
            let relative = if v == 0.0 { 0.0 } else { u / v.abs() };
            (v.ln(), relative)
        })
    }

    pub fn exp(&self) -> MeasureResult<Measurement> {
        self.apply("exp", |v, u| {
            let value = v.exp();
            (value, value * u)
        })
    }

    // ------------------------------------------------------------------------
    // Conversion
    // ------------------------------------------------------------------------

    /// Express in another unit with the same base dimensions.
    ///
    /// The result is still the same quantity, so it keeps the identity.
    pub fn to(&self, unit: &Unit) -> MeasureResult<Measurement> {
        let factor = self.unit.conversion_factor(unit)?;
        trace!(from = %self.unit, to = %unit, factor, "converting measurement");
        Ok(Measurement {
            value: self.value * factor,
            uncertainty: self.uncertainty * factor.abs(),
            unit: unit.clone(),
            id: self.id,
        })
    }

    pub fn to_str(&self, unit: &str) -> MeasureResult<Measurement> {
        self.to(&Unit::parse(unit)?)
    }

    // ------------------------------------------------------------------------
    // Formatting
    // ------------------------------------------------------------------------

    /// Value and uncertainty without the unit.
    pub fn format_bare(&self) -> String {
        format_with_uncertainty(self.value, self.uncertainty)
    }

    /// `(32 \pm 1) \times 10^{1} V$^{-1}$`
    pub fn to_latex(&self) -> String {
        let body = latex_operators(&self.format_bare());
        if self.unit.is_empty() {
            body
        } else {
            format!("{} {}", body, self.unit.to_latex())
        }
    }
}

impl PartialEq for Measurement {
    /// Equal value, uncertainty and unit; identity is ignored.
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
            && self.uncertainty == other.uncertainty
            && self.unit == other.unit
    }
}

impl fmt::Display for Measurement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let body = self.format_bare();
        if self.unit.is_empty() {
            f.write_str(&body)
        } else {
            write!(f, "{} {}", body, self.unit)
        }
    }
}

impl From<f64> for Measurement {
    fn from(value: f64) -> Self {
        Measurement::exact(value, Unit::dimensionless())
    }
}

// ============================================================================
// Operators
// ============================================================================

impl Neg for &Measurement {
    type Output = Measurement;

    fn neg(self) -> Measurement {
        Measurement {
            value: -self.value,
            uncertainty: self.uncertainty,
            unit: self.unit.clone(),
            id: self.id,
        }
    }
}

impl Neg for Measurement {
    type Output = Measurement;

    fn neg(self) -> Measurement {
        -&self
    }
}

macro_rules! measurement_binary_ops {
    ($($Trait:ident, $method:ident => $body:expr, $Output:ty;)*) => {$(
        impl $Trait<&Measurement> for &Measurement {
            type Output = $Output;

            fn $method(self, rhs: &Measurement) -> $Output {
                let f: fn(&Measurement, &Measurement) -> $Output = $body;
                f(self, rhs)
            }
        }

        impl $Trait<Measurement> for Measurement {
            type Output = $Output;

            fn $method(self, rhs: Measurement) -> $Output {
                (&self).$method(&rhs)
            }
        }

        impl $Trait<&Measurement> for Measurement {
            type Output = $Output;

            fn $method(self, rhs: &Measurement) -> $Output {
                (&self).$method(rhs)
            }
        }

        impl $Trait<Measurement> for &Measurement {
            type Output = $Output;

            fn $method(self, rhs: Measurement) -> $Output {
                self.$method(&rhs)
            }
        }
    )*};
}

measurement_binary_ops! {
    Add, add => |a, b| a.checked_add(b), MeasureResult<Measurement>;
    Sub, sub => |a, b| a.checked_sub(b), MeasureResult<Measurement>;
    Mul, mul => |a, b| unwrap_operator(a.checked_mul(b)), Measurement;
    Div, div => |a, b| unwrap_operator(a.checked_div(b)), Measurement;
}

/// `*`, `/` and `powi` panic on unit exponent overflow the way integer
/// operators do; the `checked_*` methods return the error.
fn unwrap_operator(result: MeasureResult<Measurement>) -> Measurement {
    match result {
        Ok(measurement) => measurement,
        Err(err) => panic!("{}", err),
    }
}

impl Measurement {
    fn offset(&self, k: f64) -> Measurement {
        Measurement::with_unit(self.value + k, self.uncertainty, self.unit.clone())
    }

    fn scale(&self, k: f64) -> Measurement {
        Measurement::with_unit(self.value * k, self.uncertainty * k.abs(), self.unit.clone())
    }

    /// `k / self`
    fn reciprocal(&self, k: f64) -> Measurement {
        let value = k / self.value;
        Measurement::with_unit(
            value,
            value.abs() * self.relative_uncertainty(),
            self.unit.inverse(),
        )
    }
}

macro_rules! measurement_scalar_ops {
    ($($M:ty),*) => {$(
        impl Add<f64> for $M {
            type Output = Measurement;
            fn add(self, k: f64) -> Measurement {
                self.offset(k)
            }
        }

        impl Sub<f64> for $M {
            type Output = Measurement;
            fn sub(self, k: f64) -> Measurement {
                self.offset(-k)
            }
        }

        impl Mul<f64> for $M {
            type Output = Measurement;
            fn mul(self, k: f64) -> Measurement {
                self.scale(k)
            }
        }

        impl Div<f64> for $M {
            type Output = Measurement;
            fn div(self, k: f64) -> Measurement {
                Measurement::with_unit(
                    self.value / k,
                    self.uncertainty / k.abs(),
                    self.unit.clone(),
                )
            }
        }

        impl Add<$M> for f64 {
            type Output = Measurement;
            fn add(self, m: $M) -> Measurement {
                m.offset(self)
            }
        }

        impl Sub<$M> for f64 {
            type Output = Measurement;
            fn sub(self, m: $M) -> Measurement {
                Measurement::with_unit(self - m.value, m.uncertainty, m.unit.clone())
            }
        }

        impl Mul<$M> for f64 {
            type Output = Measurement;
            fn mul(self, m: $M) -> Measurement {
                m.scale(self)
            }
        }

        impl Div<$M> for f64 {
            type Output = Measurement;
            fn div(self, m: $M) -> Measurement {
                m.reciprocal(self)
            }
        }
    )*};
}

measurement_scalar_ops!(Measurement, &Measurement);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::numeric::UnitError;
    use proptest::prelude::*;

    fn m(value: f64, uncertainty: f64, unit: &str) -> Measurement {
        Measurement::new(value, uncertainty, unit).unwrap()
    }

    fn fixtures() -> (Measurement, Measurement, Measurement) {
        (m(1.1, 0.3, "m"), m(2.22, 0.4, "m"), m(314.0, 10.0, "V"))
    }

    #[test]
    fn test_construction() {
        let x = m(1.234, -0.01, "m");
        assert_eq!(x.uncertainty(), 0.01);
        assert_eq!(x.to_string(), "1.23 ± 0.01 m");
        assert!(Measurement::new(1.0, 0.1, "q").unwrap_err().is_parse());
    }

    #[test]
    fn test_addition() {
        let (x, y, z) = fixtures();
        assert_eq!((&x + &y).unwrap().to_string(), "3.3 ± 0.5 m");
        assert_eq!((&z + 3.0).to_string(), "(32 ± 1) × 10^{1} V");
        assert_eq!((3.0 + &z).to_string(), "(32 ± 1) × 10^{1} V");
    }

    #[test]
    fn test_subtraction() {
        let (x, y, z) = fixtures();
        assert_eq!((&x - &y).unwrap().to_string(), "-1.1 ± 0.5 m");
        assert_eq!((3.0 - &z).to_string(), "(-31 ± 1) × 10^{1} V");
        assert_eq!((&z - 3.0).to_string(), "(31 ± 1) × 10^{1} V");
    }

    #[test]
    fn test_multiplication() {
        let (x, y, z) = fixtures();
        assert_eq!((&x * &y).to_string(), "2.4 ± 0.8 m^2");
        assert_eq!((&x * &z).to_string(), "(35 ± 9) × 10^{1} V m");
        assert_eq!((&z * 3.0).to_string(), "(94 ± 3) × 10^{1} V");
        assert_eq!((3.0 * &z).to_string(), "(94 ± 3) × 10^{1} V");
    }

    #[test]
    fn test_division() {
        let (x, y, z) = fixtures();
        assert_eq!((&x / &y).to_string(), "0.5 ± 0.2");
        assert_eq!((&x / &z).to_string(), "(4 ± 1) × 10^{-3} V^{-1} m");
        assert_eq!((&z / 3.0).to_string(), "105 ± 3 V");
        assert_eq!((3.0 / &z).to_string(), "(96 ± 3) × 10^{-4} V^{-1}");
    }

    #[test]
    fn test_self_operations() {
        let (x, _, _) = fixtures();

        let doubled = (&x + &x).unwrap();
        assert!((doubled.value() - 2.2).abs() < 1e-12);
        assert!((doubled.uncertainty() - 0.6).abs() < 1e-12);

        let squared = &x * &x;
        assert_eq!(squared.to_string(), "1.2 ± 0.7 m^2");
        assert_eq!(squared.to_string(), x.powi(2).to_string());
        assert!((squared.uncertainty() - 2.0 * 1.1 * 0.3).abs() < 1e-12);

        let ratio = &x / &x;
        assert_eq!(ratio.value(), 1.0);
        assert_eq!(ratio.uncertainty(), 0.0);
        assert!(ratio.unit().is_empty());
    }

    #[test]
    fn test_self_subtraction_differs_from_independent() {
        let (x, _, _) = fixtures();
        let same = (&x - &x).unwrap();
        assert_eq!(same.value(), 0.0);
        assert!((same.uncertainty() - 0.6).abs() < 1e-12);

        let twin = m(1.1, 0.3, "m");
        let independent = (&x - &twin).unwrap();
        assert!((independent.uncertainty() - 0.3 * 2f64.sqrt()).abs() < 1e-12);
        assert_ne!(same.uncertainty(), independent.uncertainty());
    }

    #[test]
    fn test_identity_rules() {
        let (x, _, _) = fixtures();
        let copy = x.clone();
        assert!(copy.is_same_quantity(&x));
        assert!((-&x).is_same_quantity(&x));
        assert!(!x.independent().is_same_quantity(&x));
        assert!(!(&x * 2.0).is_same_quantity(&x));

        let independent = (&x + &x.independent()).unwrap();
        assert!((independent.uncertainty() - 0.3 * 2f64.sqrt()).abs() < 1e-12);
        assert_eq!(x, x.independent());
    }

    #[test]
    fn test_correlated_api() {
        let a = m(2.0, 0.1, "s");
        let b = m(3.0, 0.2, "s");
        assert!((a.add_correlated(&b).unwrap().uncertainty() - 0.3).abs() < 1e-12);
        assert!((a.sub_correlated(&b).unwrap().uncertainty() - 0.3).abs() < 1e-12);
        let product = a.mul_correlated(&b).unwrap();
        assert!((product.uncertainty() - (0.1 * 3.0 + 2.0 * 0.2)).abs() < 1e-12);
        let same = a.div_correlated(&a.independent()).unwrap();
        assert!(same.uncertainty().abs() < 1e-12);
    }

    #[test]
    fn test_exact_zero_contributes_no_uncertainty() {
        let zero = Measurement::dimensionless(0.0, 0.1);
        let two = Measurement::dimensionless(2.0, 0.0);

        let product = &zero * &two;
        assert_eq!(product.value(), 0.0);
        assert_eq!(product.uncertainty(), 0.0);

        let ratio = &zero / &two;
        assert_eq!(ratio.value(), 0.0);
        assert_eq!(ratio.uncertainty(), 0.0);

        // relative uncertainties still combine in quadrature
        let a = Measurement::dimensionless(4.0, 0.3);
        let b = Measurement::dimensionless(2.0, 0.2);
        let expected = 0.075f64.hypot(0.1);
        assert!(((&a * &b).uncertainty() - 8.0 * expected).abs() < 1e-12);
        assert!(((&a / &b).uncertainty() - 2.0 * expected).abs() < 1e-12);
    }

    #[test]
    fn test_unit_exponent_overflow() {
        let a = m(1.0, 0.1, "m^2000000000");
        let b = m(2.0, 0.1, "m^2000000000");
        let err = a.checked_mul(&b).unwrap_err();
        assert!(matches!(
            err,
            MeasureError::Unit(UnitError::ExponentOverflow { .. })
        ));
        assert!(a.checked_div(&b).unwrap().unit().is_empty());
        assert!(a.checked_powi(2).is_err());
    }

    #[test]
    #[should_panic(expected = "exponent overflow")]
    fn test_multiplication_operator_panics_on_exponent_overflow() {
        let a = m(1.0, 0.1, "m^2000000000");
        let _ = &a * &a.independent();
    }

    #[test]
    fn test_tiny_uncertainty_display() {
        let tiny = Measurement::dimensionless(1e-35, 1e-35);
        assert!(tiny.to_string().contains("× 10^{-3"));
    }

    #[test]
    fn test_dimension_error() {
        let a = m(1.0, 0.0, "m");
        let b = m(1.0, 0.0, "V");
        let err = (&a + &b).unwrap_err();
        assert!(err.is_dimension());
        assert!((&a - &b).unwrap_err().is_dimension());
    }

    #[test]
    fn test_addition_converts_compatible_units() {
        let a = m(1.0, 0.0, "m");
        let b = m(50.0, 0.0, "cm");
        let sum = (&a + &b).unwrap();
        assert!((sum.value() - 1.5).abs() < 1e-12);
        assert_eq!(sum.unit(), a.unit());
    }

    #[test]
    fn test_prefix_reconciliation_in_products() {
        let a = m(2.0, 0.0, "m");
        let b = m(50.0, 5.0, "cm");
        let product = &a * &b;
        assert_eq!(product.unit().to_string(), "m^2");
        assert!((product.value() - 1.0).abs() < 1e-12);
        assert!((product.uncertainty() - 0.1).abs() < 1e-12);

        let ratio = &a / &b;
        assert!(ratio.unit().is_empty());
        assert!((ratio.value() - 4.0).abs() < 1e-12);
    }

    #[test]
    fn test_powers() {
        let (x, y, _) = fixtures();
        assert_eq!((&x / &y).rpow(2.0).unwrap().to_string(), "1.4 ± 0.2");
        assert!(x.rpow(2.0).unwrap_err().is_dimension());

        let area = m(4.0, 0.4, "m^2");
        let side = area.sqrt().unwrap();
        assert_eq!(side.unit().to_string(), "m");
        assert!((side.value() - 2.0).abs() < 1e-12);
        assert!((side.uncertainty() - 0.1).abs() < 1e-12);
        assert!(x.sqrt().is_err());

        let cubed = x.pow(&Measurement::dimensionless(3.0, 0.0)).unwrap();
        assert_eq!(cubed.unit().to_string(), "m^3");
        assert!((cubed.value() - 1.331).abs() < 1e-12);
    }

    #[test]
    fn test_pow_with_uncertain_exponent() {
        let base = Measurement::dimensionless(2.0, 0.0);
        let exponent = Measurement::dimensionless(3.0, 0.1);
        let result = base.pow(&exponent).unwrap();
        assert!((result.value() - 8.0).abs() < 1e-12);
        assert!((result.uncertainty() - 8.0 * 2f64.ln() * 0.1).abs() < 1e-12);
        assert!(base.pow(&m(1.0, 0.0, "s")).unwrap_err().is_dimension());
    }

    #[test]
    fn test_functions() {
        let (x, y, _) = fixtures();
        let ratio = &x / &y;
        assert_eq!(ratio.sin().unwrap().to_string(), "0.5 ± 0.1");
        assert_eq!(ratio.cos().unwrap().to_string(), "0.88 ± 0.08");
        assert_eq!(ratio.log().unwrap().to_string(), "-0.7 ± 0.3");
        assert_eq!(ratio.acos().unwrap().to_string(), "1.1 ± 0.2");
        assert!(x.sin().unwrap_err().is_dimension());
        assert!(x.log().unwrap_err().is_dimension());
    }

    #[test]
    fn test_function_derivatives() {
        let a = Measurement::dimensionless(0.5, 0.01);
        let tan = a.tan().unwrap();
        assert!((tan.uncertainty() - 0.01 / 0.5f64.cos().powi(2)).abs() < 1e-15);
        let asin = a.asin().unwrap();
        assert!((asin.uncertainty() - 0.01 / 0.75f64.sqrt()).abs() < 1e-15);
        let atan = a.atan().unwrap();
        assert!((atan.uncertainty() - 0.01 / 1.25).abs() < 1e-15);
        let exp = a.exp().unwrap();
        assert!((exp.uncertainty() - 0.5f64.exp() * 0.01).abs() < 1e-15);
    }

    #[test]
    fn test_functions_apply_dimensionless_scale() {
        // J / (g m^2 s^-2) is dimensionless with a factor of 1000
        let a = m(0.001, 0.0, "J / g m^2 s^-2");
        let sin = a.sin().unwrap();
        assert!((sin.value() - 1f64.sin()).abs() < 1e-12);
    }

    #[test]
    fn test_conversion() {
        let (x, _, _) = fixtures();
        assert_eq!(
            m(2.0, 1.0, "cm^3").to_str("m^3").unwrap().to_string(),
            "(2 ± 1) × 10^{-6} m^3"
        );
        assert_eq!(x.to_str("cm").unwrap().to_string(), "(11 ± 3) × 10^{1} cm");
        assert!(x.to_str("cm").unwrap().is_same_quantity(&x));

        let unity = m(1.0, 0.0, "m^3 Pa / J Hz^3 s^3").to_str("").unwrap();
        assert!((unity.value() - 1.0).abs() < 1e-12);
        assert!(x.to_str("s").unwrap_err().is_dimension());
    }

    #[test]
    fn test_zero_uncertainty_display() {
        assert_eq!(m(2.5, 0.0, "m").to_string(), "2.5 m");
        assert_eq!(Measurement::from(3.0).to_string(), "3.0");
    }

    #[test]
    fn test_latex() {
        let (_, _, z) = fixtures();
        assert_eq!((3.0 / &z).to_latex(), "(96 \\pm 3) \\times 10^{-4} V$^{-1}$");
        assert_eq!(Measurement::dimensionless(0.5, 0.1).to_latex(), "0.5 \\pm 0.1");
    }

    proptest! {
        #[test]
        fn prop_addition_commutes(
            a in -1e6f64..1e6, ua in 0f64..1e3,
            b in -1e6f64..1e6, ub in 0f64..1e3,
        ) {
            let x = m(a, ua, "kg");
            let y = m(b, ub, "kg");
            let xy = (&x + &y).unwrap();
            let yx = (&y + &x).unwrap();
            prop_assert!((xy.value() - yx.value()).abs() <= 1e-9 * xy.value().abs().max(1.0));
            prop_assert!((xy.uncertainty() - yx.uncertainty()).abs() <= 1e-9 * xy.uncertainty().max(1.0));
        }

        #[test]
        fn prop_multiplication_commutes(
            a in -1e3f64..1e3, ua in 0f64..10.0,
            b in -1e3f64..1e3, ub in 0f64..10.0,
        ) {
            let x = m(a, ua, "m");
            let y = m(b, ub, "s");
            let xy = &x * &y;
            let yx = &y * &x;
            prop_assert_eq!(xy.value(), yx.value());
            prop_assert!((xy.uncertainty() - yx.uncertainty()).abs() <= 1e-9 * xy.uncertainty().max(1.0));
            prop_assert!(xy.unit().equivalent(yx.unit()));
        }

        #[test]
        fn prop_uncertainty_never_negative(
            a in -1e3f64..1e3, ua in -10f64..10.0, k in -1e3f64..1e3,
        ) {
            let x = Measurement::dimensionless(a, ua);
            prop_assert!((&x * k).uncertainty() >= 0.0);
            prop_assert!((&x - &x).unwrap().uncertainty() >= 0.0);
            prop_assert!(x.powi(3).uncertainty() >= 0.0);
        }
    }
}
