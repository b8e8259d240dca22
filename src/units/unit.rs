// ============================================================================
// Unit Value Type
// Sparse product of prefixed symbols raised to integer powers
// ============================================================================

use std::fmt;
use std::str::FromStr;

use smallvec::SmallVec;

use super::prefix::Prefix;
use super::registry::{registry, ResolvedUnit, SymbolId, UnitRegistry};
use crate::numeric::{MeasureError, MeasureResult, UnitError};

/// A symbol, its prefix and its non-zero power.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UnitTerm {
    symbol: SymbolId,
    prefix: Prefix,
    power: i32,
}

impl UnitTerm {
    pub(crate) const fn new(symbol: SymbolId, prefix: Prefix, power: i32) -> Self {
        Self {
            symbol,
            prefix,
            power,
        }
    }

    #[inline]
    pub const fn symbol(&self) -> SymbolId {
        self.symbol
    }

    #[inline]
    pub const fn prefix(&self) -> Prefix {
        self.prefix
    }

    #[inline]
    pub const fn power(&self) -> i32 {
        self.power
    }
}

#[derive(Debug, Clone, Copy)]
enum TermStyle {
    /// `J^{-10} m^2 kg A`
    Display,
    /// `V$^{-1}$ m`
    Latex,
    /// `V^-1 m`, parseable
    Plain,
}

/// Physical unit: a product of prefixed symbols with integer powers.
///
/// Terms are kept sorted by registry order with zero powers removed, so
/// structural equality is a plain comparison. Use [`Unit::equivalent`] to
/// compare what two units mean rather than how they are written.
///
/// ```
/// use lab_measure::units::Unit;
///
/// let unit: Unit = "kg / s^2m".parse().unwrap();
/// assert_eq!(unit.to_string(), "m^{-1} kg s^{-2}");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Unit {
    terms: SmallVec<[UnitTerm; 4]>,
}

impl Unit {
    /// The unit with no terms.
    pub fn dimensionless() -> Self {
        Self::default()
    }

    /// Parse against the process-wide registry.
    pub fn parse(input: &str) -> MeasureResult<Self> {
        let registry = registry();
        Ok(registry.parse(input)?)
    }

    pub(crate) fn from_sorted_terms(terms: SmallVec<[UnitTerm; 4]>) -> Self {
        Self { terms }
    }

    #[inline]
    pub fn terms(&self) -> &[UnitTerm] {
        &self.terms
    }

    /// True when there are no terms at all (nothing to print).
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Exactly one term, whatever its power.
    #[inline]
    pub fn is_singular(&self) -> bool {
        self.terms.len() == 1
    }

    /// Power of an unprefixed symbol name, zero when absent or unknown.
    pub fn power_of(&self, symbol: &str) -> i32 {
        let registry = registry();
        registry
            .lookup(symbol)
            .and_then(|id| self.terms.iter().find(|term| term.symbol == id))
            .map_or(0, |term| term.power)
    }

    pub fn resolve(&self) -> Result<ResolvedUnit, UnitError> {
        registry().resolve(self)
    }

    /// All base dimensions cancel (a scale factor may remain).
    pub fn is_dimensionless(&self) -> bool {
        self.is_empty()
            || self
                .resolve()
                .is_ok_and(|resolved| resolved.dimensions.is_none())
    }

    /// Same base dimensions, so a conversion between the two exists.
    pub fn is_compatible(&self, other: &Unit) -> bool {
        self.resolve_pair(other)
            .is_ok_and(|(left, right)| left.is_compatible(&right))
    }

    /// Same base dimensions and the same scale factor.
    pub fn equivalent(&self, other: &Unit) -> bool {
        if self == other {
            return true;
        }
        self.resolve_pair(other)
            .is_ok_and(|(left, right)| left.equivalent(&right))
    }

    fn resolve_pair(&self, other: &Unit) -> Result<(ResolvedUnit, ResolvedUnit), UnitError> {
        let registry = registry();
        Ok((registry.resolve(self)?, registry.resolve(other)?))
    }

    /// Factor a value in `self` must be multiplied by to be expressed in `target`.
    pub fn conversion_factor(&self, target: &Unit) -> MeasureResult<f64> {
        let (from, to) = self.resolve_pair(target)?;
        if !from.is_compatible(&to) {
            return Err(MeasureError::dimension("convert", self, target));
        }
        Ok(from.factor / to.factor)
    }

    pub fn checked_mul(&self, other: &Unit) -> Result<Unit, UnitError> {
        self.merge(other, 1, prefix_conflict)
    }

    pub fn checked_div(&self, other: &Unit) -> Result<Unit, UnitError> {
        self.merge(other, -1, prefix_conflict)
    }

    /// # Panics
    ///
    /// Panics if a power is `i32::MIN`.
    pub fn inverse(&self) -> Unit {
        self.powi(-1)
    }

    /// Integer power.
    ///
    /// # Panics
    ///
    /// Panics if a resulting exponent overflows an `i32`; use
    /// [`Unit::checked_powi`] to get the error instead.
    pub fn powi(&self, exponent: i32) -> Unit {
        match self.checked_powi(exponent) {
            Ok(unit) => unit,
            Err(err) => panic!("{}", err),
        }
    }

    pub fn checked_powi(&self, exponent: i32) -> Result<Unit, UnitError> {
        if exponent == 0 {
            return Ok(Unit::dimensionless());
        }
        let mut terms = SmallVec::with_capacity(self.terms.len());
        for term in &self.terms {
            let power = term
                .power
                .checked_mul(exponent)
                .ok_or_else(|| UnitError::ExponentOverflow {
                    unit: format!("({})^{}", self, exponent),
                })?;
            terms.push(UnitTerm::new(term.symbol, term.prefix, power));
        }
        Ok(Unit { terms })
    }

    /// Real power; every resulting exponent must be an integer.
    pub fn powf(&self, exponent: f64) -> Result<Unit, UnitError> {
        if self.is_empty() {
            return Ok(Unit::dimensionless());
        }
        let mut terms = SmallVec::with_capacity(self.terms.len());
        for term in &self.terms {
            let power = term.power as f64 * exponent;
            let rounded = power.round();
            let integral = power.is_finite()
                && (power - rounded).abs() <= 1e-9 * rounded.abs().max(1.0)
                && rounded.abs() <= i32::MAX as f64;
            if !integral {
                return Err(UnitError::NonIntegralPower {
                    unit: self.to_string(),
                    exponent: exponent.to_string(),
                });
            }
            if rounded != 0.0 {
                terms.push(UnitTerm::new(term.symbol, term.prefix, rounded as i32));
            }
        }
        Ok(Unit { terms })
    }

    /// Multiply (`sign = 1`) or divide (`sign = -1`) by `other`, rewriting
    /// `other`'s conflicting prefixes to ours.
    ///
    /// Returns the factor `other`'s value must be scaled by to stay correct.
    pub(crate) fn multiply_reconciled(
        &self,
        other: &Unit,
        sign: i32,
    ) -> Result<(f64, Unit), UnitError> {
        let mut factor = 1.0;
        let unit = self.merge(other, sign, |left, right| {
            factor *= (right.prefix.multiplier() / left.prefix.multiplier()).powi(right.power);
            Ok(left.prefix)
        })?;
        Ok((factor, unit))
    }

    fn merge(
        &self,
        other: &Unit,
        sign: i32,
        mut on_conflict: impl FnMut(&UnitTerm, &UnitTerm) -> Result<Prefix, UnitError>,
    ) -> Result<Unit, UnitError> {
        let overflow = || UnitError::ExponentOverflow {
            unit: format!("({}) {} ({})", self, if sign < 0 { "/" } else { "*" }, other),
        };
        let mut terms = SmallVec::with_capacity(self.terms.len() + other.terms.len());
        let (mut i, mut j) = (0, 0);
        loop {
            match (self.terms.get(i), other.terms.get(j)) {
                (Some(left), Some(right)) if left.symbol == right.symbol => {
                    let prefix = if left.prefix == right.prefix {
                        left.prefix
                    } else {
                        on_conflict(left, right)?
                    };
                    let power = right
                        .power
                        .checked_mul(sign)
                        .and_then(|power| left.power.checked_add(power))
                        .ok_or_else(overflow)?;
                    if power != 0 {
                        terms.push(UnitTerm::new(left.symbol, prefix, power));
                    }
                    i += 1;
                    j += 1;
                }
                (Some(left), Some(right)) if left.symbol < right.symbol => {
                    terms.push(*left);
                    i += 1;
                }
                (Some(left), None) => {
                    terms.push(*left);
                    i += 1;
                }
                (_, Some(right)) => {
                    let power = right.power.checked_mul(sign).ok_or_else(overflow)?;
                    terms.push(UnitTerm::new(right.symbol, right.prefix, power));
                    j += 1;
                }
                (None, None) => break,
            }
        }
        Ok(Unit { terms })
    }

    /// LaTeX text form, e.g. `V$^{-1}$ m`.
    pub fn to_latex(&self) -> String {
        self.render(TermStyle::Latex)
    }

    /// Plain form that parses back to the same unit, e.g. `V^-1 m`.
    pub fn to_plain_string(&self) -> String {
        self.render(TermStyle::Plain)
    }

    pub(crate) fn render_with(&self, registry: &UnitRegistry) -> String {
        let mut out = String::new();
        // fmt::Write into a String cannot fail
        let _ = self.write_terms(registry, &mut out, TermStyle::Display);
        out
    }

    fn render(&self, style: TermStyle) -> String {
        let mut out = String::new();
        let _ = self.write_terms(&registry(), &mut out, style);
        out
    }

    fn write_terms(
        &self,
        registry: &UnitRegistry,
        out: &mut impl fmt::Write,
        style: TermStyle,
    ) -> fmt::Result {
        for (i, term) in self.terms.iter().enumerate() {
            if i > 0 {
                out.write_char(' ')?;
            }
            write!(out, "{}{}", term.prefix, registry.symbol_name(term.symbol))?;
            let power = term.power;
            match style {
                _ if power == 1 => {}
                TermStyle::Display if power > 0 => write!(out, "^{}", power)?,
                TermStyle::Display => write!(out, "^{{{}}}", power)?,
                TermStyle::Latex if power > 0 => write!(out, "$^{}$", power)?,
                TermStyle::Latex => write!(out, "$^{{{}}}$", power)?,
                TermStyle::Plain => write!(out, "^{}", power)?,
            }
        }
        Ok(())
    }
}

fn prefix_conflict(left: &UnitTerm, right: &UnitTerm) -> Result<Prefix, UnitError> {
    Err(UnitError::PrefixConflict {
        symbol: registry().symbol_name(left.symbol).to_string(),
        left: left.prefix.symbol().to_string(),
        right: right.prefix.symbol().to_string(),
    })
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_terms(&registry(), f, TermStyle::Display)
    }
}

impl FromStr for Unit {
    type Err = MeasureError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Unit::parse(s)
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for Unit {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_plain_string())
    }
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for Unit {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Unit::parse(&text).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(s: &str) -> Unit {
        s.parse().unwrap()
    }

    #[test]
    fn test_display_forms() {
        let u = unit("V^-1 m");
        assert_eq!(u.to_string(), "V^{-1} m");
        assert_eq!(u.to_latex(), "V$^{-1}$ m");
        assert_eq!(u.to_plain_string(), "V^-1 m");
        assert_eq!(unit("m^2").to_latex(), "m$^2$");
        assert_eq!(Unit::dimensionless().to_string(), "");
    }

    #[test]
    fn test_plain_string_parses_back() {
        for text in ["J^-10 m^2 kg A", "C^-3 mm ng s^2", "V m^-1", ""] {
            let u = unit(text);
            assert_eq!(unit(&u.to_plain_string()), u);
        }
    }

    #[test]
    fn test_multiply_and_divide() {
        assert_eq!(unit("m").checked_mul(&unit("m")).unwrap(), unit("m^2"));
        assert_eq!(unit("m").checked_mul(&unit("V")).unwrap().to_string(), "V m");
        assert_eq!(unit("m").checked_div(&unit("V")).unwrap().to_string(), "V^{-1} m");
        assert!(unit("m").checked_div(&unit("m")).unwrap().is_empty());
    }

    #[test]
    fn test_prefix_conflict() {
        let err = unit("km").checked_mul(&unit("cm")).unwrap_err();
        assert_eq!(
            err,
            UnitError::PrefixConflict {
                symbol: "m".to_string(),
                left: "k".to_string(),
                right: "c".to_string(),
            }
        );
        // disjoint symbols never conflict
        assert!(unit("km").checked_mul(&unit("ms")).is_ok());
    }

    #[test]
    fn test_multiply_reconciled() {
        let (factor, product) = unit("m").multiply_reconciled(&unit("cm"), 1).unwrap();
        assert_eq!(product, unit("m^2"));
        assert!((factor - 0.01).abs() < 1e-15);

        let (factor, quotient) = unit("m").multiply_reconciled(&unit("cm"), -1).unwrap();
        assert!(quotient.is_empty());
        assert!((factor - 0.01).abs() < 1e-15);

        let (factor, product) = unit("km").multiply_reconciled(&unit("mm^2"), 1).unwrap();
        assert_eq!(product, unit("km^3"));
        assert!((factor - 1e-12).abs() < 1e-24);
    }

    #[test]
    fn test_exponent_overflow_is_an_error() {
        let huge = unit("m^2000000000");
        assert!(matches!(
            huge.checked_mul(&huge),
            Err(UnitError::ExponentOverflow { .. })
        ));
        assert!(huge.checked_div(&huge).unwrap().is_empty());
        assert!(huge.multiply_reconciled(&unit("km^2000000000"), 1).is_err());
        assert!(matches!(
            huge.checked_powi(2),
            Err(UnitError::ExponentOverflow { .. })
        ));
        assert_eq!(unit("m s^-1").checked_powi(3).unwrap(), unit("m^3 s^-3"));

        // unresolvable units are simply not compatible with anything
        let newton = unit("N^2000000000");
        assert!(newton.resolve().is_err());
        assert!(!newton.is_compatible(&newton.checked_div(&unit("N")).unwrap()));
        assert!(!newton.is_dimensionless());
        assert!(newton.conversion_factor(&unit("m")).is_err());
    }

    #[test]
    #[should_panic(expected = "exponent overflow")]
    fn test_powi_panics_on_overflow() {
        let _ = unit("m^2000000000").powi(2);
    }

    #[test]
    fn test_powers() {
        assert_eq!(unit("m s^-1").powi(2), unit("m^2 s^-2"));
        assert_eq!(unit("m s^-1").inverse(), unit("s / m"));
        assert!(unit("m").powi(0).is_empty());
        assert_eq!(unit("m^2").powf(0.5).unwrap(), unit("m"));
        assert!(matches!(
            unit("m").powf(0.5),
            Err(UnitError::NonIntegralPower { .. })
        ));
        assert!(Unit::dimensionless().powf(0.3).unwrap().is_empty());
    }

    #[test]
    fn test_equivalence_and_compatibility() {
        assert!(unit("J").equivalent(&unit("kg m^2 s^-2")));
        assert!(unit("N m").equivalent(&unit("J")));
        assert!(!unit("J").equivalent(&unit("g m^2 s^-2")));
        assert!(unit("J").is_compatible(&unit("g m^2 s^-2")));
        assert!(unit("eV").is_compatible(&unit("J")));
        assert!(!unit("m").is_compatible(&unit("s")));
        assert!(unit("C").equivalent(&unit("K")));
        assert_ne!(unit("C"), unit("K"));
    }

    #[test]
    fn test_dimensionless_with_factor() {
        let u = unit("m^3 Pa / J Hz^3 s^3");
        assert!(u.is_dimensionless());
        assert!(!u.is_empty());
        assert!((u.conversion_factor(&Unit::dimensionless()).unwrap() - 1.0).abs() < 1e-12);

        let scaled = unit("J / g m^2 s^-2");
        assert!(scaled.is_dimensionless());
        assert!((scaled.conversion_factor(&Unit::dimensionless()).unwrap() - 1e3).abs() < 1e-9);
    }

    #[test]
    fn test_conversion_factor() {
        assert!((unit("cm^3").conversion_factor(&unit("m^3")).unwrap() - 1e-6).abs() < 1e-18);
        assert!((unit("m").conversion_factor(&unit("cm")).unwrap() - 100.0).abs() < 1e-12);
        let err = unit("m").conversion_factor(&unit("s")).unwrap_err();
        assert!(err.is_dimension());
    }

    #[test]
    fn test_singular_and_power_of() {
        assert!(unit("m^2").is_singular());
        assert!(!unit("m s").is_singular());
        assert_eq!(unit("kg / s^2m").power_of("s"), -2);
        assert_eq!(unit("kg / s^2m").power_of("g"), 1);
        assert_eq!(unit("kg").power_of("V"), 0);
    }
}
