// ============================================================================
// Measurement List
// Equal-unit sequence of measurements with elementwise arithmetic
// ============================================================================

use std::fmt;
use std::ops::{Add, Div, Mul, Neg, Sub};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use super::measurement::Measurement;
use crate::numeric::{
    format_float, format_rounded, format_rounded_integer, latex_operators, round_half_even,
    significant_decimals, MeasureError, MeasureResult, UnitError,
};
use crate::units::Unit;
use crate::utils::population_std_dev;

/// How uncertainties are assigned when building a list from raw values.
#[derive(Debug, Clone, PartialEq)]
pub enum ListUncertainty {
    /// Population standard deviation of the values, applied to every element
    Statistical,
    /// One uncertainty for every element
    Shared(f64),
    /// One uncertainty per element
    PerElement(Vec<f64>),
}

impl From<f64> for ListUncertainty {
    fn from(uncertainty: f64) -> Self {
        ListUncertainty::Shared(uncertainty)
    }
}

impl From<Vec<f64>> for ListUncertainty {
    fn from(uncertainties: Vec<f64>) -> Self {
        ListUncertainty::PerElement(uncertainties)
    }
}

impl From<&[f64]> for ListUncertainty {
    fn from(uncertainties: &[f64]) -> Self {
        ListUncertainty::PerElement(uncertainties.to_vec())
    }
}

/// Which part of a table row [`MeasurementList::table_print`] renders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TableParts {
    /// Header fragment followed by the value cells
    #[default]
    Both,
    /// Only the `, ($\pm U$ unit)` header fragment
    HeaderOnly,
    /// Only the `& v1 & v2` value cells
    ValuesOnly,
}

/// Measurements sharing one unit.
///
/// Arithmetic is elementwise between lists of equal length and broadcast
/// against a single [`Measurement`] or `f64`.
///
/// ```
/// use lab_measure::MeasurementList;
///
/// let heights = MeasurementList::new(
///     &[185.0, 183.0, 182.0],
///     vec![5.0, 4.0, 5.0],
///     "cm",
/// )
/// .unwrap();
/// assert_eq!(heights.to_string(), "[185 ± 5, 183 ± 4, 182 ± 5] cm");
/// assert_eq!((&heights / 100.0).to_string(), "[1.85 ± 0.05, 1.83 ± 0.04, 1.82 ± 0.05] cm");
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MeasurementList {
    measurements: Vec<Measurement>,
    unit: Unit,
}

impl MeasurementList {
    pub fn new(
        values: &[f64],
        uncertainty: impl Into<ListUncertainty>,
        unit: &str,
    ) -> MeasureResult<Self> {
        Self::with_unit(values, uncertainty, Unit::parse(unit)?)
    }

    pub fn with_unit(
        values: &[f64],
        uncertainty: impl Into<ListUncertainty>,
        unit: Unit,
    ) -> MeasureResult<Self> {
        let uncertainties = match uncertainty.into() {
            ListUncertainty::Statistical => vec![population_std_dev(values); values.len()],
            ListUncertainty::Shared(u) => vec![u; values.len()],
            ListUncertainty::PerElement(u) if u.len() == values.len() => u,
            ListUncertainty::PerElement(u) => {
                return Err(MeasureError::Length {
                    left: values.len(),
                    right: u.len(),
                });
            }
        };

        let measurements = values
            .iter()
            .zip(uncertainties)
            .map(|(&value, uncertainty)| Measurement::with_unit(value, uncertainty, unit.clone()))
            .collect();
        Ok(Self { measurements, unit })
    }

    /// Collect existing measurements; every unit must be equivalent to the first.
    pub fn from_measurements(measurements: Vec<Measurement>) -> MeasureResult<Self> {
        let unit = match measurements.first() {
            Some(first) => first.unit().clone(),
            None => Unit::dimensionless(),
        };
        Self::collect_in(measurements, unit)
    }

    fn collect_in(measurements: Vec<Measurement>, unit: Unit) -> MeasureResult<Self> {
        let measurements = measurements
            .into_iter()
            .map(|m| {
                if *m.unit() == unit {
                    Ok(m)
                } else if m.unit().equivalent(&unit) {
                    m.to(&unit)
                } else {
                    Err(UnitError::MixedUnits {
                        expected: unit.to_string(),
                        found: m.unit().to_string(),
                    }
                    .into())
                }
            })
            .collect::<MeasureResult<Vec<_>>>()?;
        Ok(Self { measurements, unit })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.measurements.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.measurements.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Measurement> {
        self.measurements.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Measurement> {
        self.measurements.iter()
    }

    pub fn measurements(&self) -> &[Measurement] {
        &self.measurements
    }

    #[inline]
    pub fn unit(&self) -> &Unit {
        &self.unit
    }

    pub fn values(&self) -> Vec<f64> {
        self.iter().map(Measurement::value).collect()
    }

    pub fn uncertainties(&self) -> Vec<f64> {
        self.iter().map(Measurement::uncertainty).collect()
    }

    /// Every element carries exactly the same uncertainty.
    pub fn has_uniform_uncertainty(&self) -> bool {
        match self.measurements.first() {
            Some(first) => self
                .iter()
                .all(|m| m.uncertainty() == first.uncertainty()),
            None => true,
        }
    }

    // ------------------------------------------------------------------------
    // Concatenation
    // ------------------------------------------------------------------------

    /// Concatenate, converting `other` into this list's unit.
    pub fn append(&self, other: &MeasurementList) -> MeasureResult<Self> {
        let mut measurements = self.measurements.clone();
        measurements.extend(other.measurements.iter().cloned());
        let unit = if self.is_empty() {
            other.unit.clone()
        } else {
            self.unit.clone()
        };
        Self::collect_in(measurements, unit)
    }

    pub fn append_measurement(&self, measurement: &Measurement) -> MeasureResult<Self> {
        let mut measurements = self.measurements.clone();
        measurements.push(measurement.clone());
        let unit = if self.is_empty() {
            measurement.unit().clone()
        } else {
            self.unit.clone()
        };
        Self::collect_in(measurements, unit)
    }

    // ------------------------------------------------------------------------
    // Elementwise mapping
    // ------------------------------------------------------------------------

    /// Apply `op` to every element. An empty list learns its unit from a sample element.
    pub fn map(
        &self,
        op: impl Fn(&Measurement) -> MeasureResult<Measurement>,
    ) -> MeasureResult<Self> {
        if self.is_empty() {
            let sample = op(&Measurement::exact(1.0, self.unit.clone()))?;
            return Ok(Self {
                measurements: Vec::new(),
                unit: sample.unit().clone(),
            });
        }
        let measurements = self.iter().map(op).collect::<MeasureResult<Vec<_>>>()?;
        let unit = measurements[0].unit().clone();
        Self::collect_in(measurements, unit)
    }

    /// Combine pairwise with `other`, which must have the same length.
    pub fn zip_with(
        &self,
        other: &MeasurementList,
        op: impl Fn(&Measurement, &Measurement) -> MeasureResult<Measurement>,
    ) -> MeasureResult<Self> {
        if self.len() != other.len() {
            return Err(MeasureError::Length {
                left: self.len(),
                right: other.len(),
            });
        }
        if self.is_empty() {
            let sample = op(
                &Measurement::exact(1.0, self.unit.clone()),
                &Measurement::exact(1.0, other.unit.clone()),
            )?;
            return Ok(Self {
                measurements: Vec::new(),
                unit: sample.unit().clone(),
            });
        }
        let measurements = self
            .iter()
            .zip(other.iter())
            .map(|(a, b)| op(a, b))
            .collect::<MeasureResult<Vec<_>>>()?;
        let unit = measurements[0].unit().clone();
        Self::collect_in(measurements, unit)
    }

    fn map_infallible(&self, op: impl Fn(&Measurement) -> Measurement) -> Self {
        let measurements: Vec<Measurement> = self.iter().map(&op).collect();
        let unit = match measurements.first() {
            Some(first) => first.unit().clone(),
            None => op(&Measurement::exact(1.0, self.unit.clone())).unit().clone(),
        };
        Self { measurements, unit }
    }

    pub fn checked_add(&self, other: &MeasurementList) -> MeasureResult<Self> {
        self.zip_with(other, Measurement::checked_add)
    }

    pub fn checked_sub(&self, other: &MeasurementList) -> MeasureResult<Self> {
        self.zip_with(other, Measurement::checked_sub)
    }

    pub fn checked_mul(&self, other: &MeasurementList) -> MeasureResult<Self> {
        self.zip_with(other, Measurement::checked_mul)
    }

    pub fn checked_div(&self, other: &MeasurementList) -> MeasureResult<Self> {
        self.zip_with(other, Measurement::checked_div)
    }

    /// # Panics
    ///
    /// Panics if the unit exponent overflows, like [`Measurement::powi`].
    pub fn powi(&self, exponent: i32) -> Self {
        self.map_infallible(|m| m.powi(exponent))
    }

    pub fn checked_powi(&self, exponent: i32) -> MeasureResult<Self> {
        self.map(|m| m.checked_powi(exponent))
    }

    pub fn powf(&self, exponent: f64) -> MeasureResult<Self> {
        self.map(|m| m.powf(exponent))
    }

    pub fn pow(&self, exponent: &Measurement) -> MeasureResult<Self> {
        self.map(|m| m.pow(exponent))
    }

    /// `base` raised to every element.
    pub fn rpow(&self, base: f64) -> MeasureResult<Self> {
        self.map(|m| m.rpow(base))
    }

    pub fn sqrt(&self) -> MeasureResult<Self> {
        self.map(Measurement::sqrt)
    }

    pub fn sin(&self) -> MeasureResult<Self> {
        self.map(Measurement::sin)
    }

    pub fn cos(&self) -> MeasureResult<Self> {
        self.map(Measurement::cos)
    }

    pub fn tan(&self) -> MeasureResult<Self> {
        self.map(Measurement::tan)
    }

    pub fn asin(&self) -> MeasureResult<Self> {
        self.map(Measurement::asin)
    }

    pub fn acos(&self) -> MeasureResult<Self> {
        self.map(Measurement::acos)
    }

    pub fn atan(&self) -> MeasureResult<Self> {
        self.map(Measurement::atan)
    }

    pub fn log(&self) -> MeasureResult<Self> {
        self.map(Measurement::log)
    }

    pub fn exp(&self) -> MeasureResult<Self> {
        self.map(Measurement::exp)
    }

    /// Convert every element.
    pub fn to(&self, unit: &Unit) -> MeasureResult<Self> {
        let measurements = self
            .iter()
            .map(|m| m.to(unit))
            .collect::<MeasureResult<Vec<_>>>()?;
        if self.is_empty() {
            self.unit.conversion_factor(unit)?;
        }
        Ok(Self {
            measurements,
            unit: unit.clone(),
        })
    }

    // ------------------------------------------------------------------------
    // Formatting
    // ------------------------------------------------------------------------

    /// LaTeX table fragment for this column.
    ///
    /// With a shared uncertainty the header carries it once and the cells
    /// hold values rounded to its significant decimals. Otherwise every cell
    /// is `$v \pm u$` and there is no header.
    pub fn table_print(&self, parts: TableParts) -> String {
        if self.is_empty() {
            return String::new();
        }
        let header = !matches!(parts, TableParts::ValuesOnly);
        let values = !matches!(parts, TableParts::HeaderOnly);
        let unit = self.unit.to_latex();
        let mut out = String::new();

        let shared = self
            .measurements
            .first()
            .map(Measurement::uncertainty)
            .filter(|_| self.has_uniform_uncertainty());

        match shared {
            Some(u) if u > 0.0 && u.is_finite() => {
                let digits = significant_decimals(u);
                if header {
                    let shown = if digits > 0 {
                        format_rounded(u, digits)
                    } else {
                        format_rounded_integer(round_half_even(u.trunc(), digits))
                    };
                    out.push_str(&format!(", ($\\pm {}$ {})", shown, unit));
                }
                if values {
                    let cells: Vec<String> = self
                        .iter()
                        .map(|m| {
                            if digits > 0 {
                                format_rounded(m.value(), digits)
                            } else {
                                let whole = round_half_even(m.value(), 0);
                                format_rounded_integer(round_half_even(whole, digits))
                            }
                        })
                        .collect();
                    out.push_str(&format!("& {}", cells.join(" & ")));
                }
            }
            Some(_) => {
                if header {
                    out.push_str(&format!(", ({})", unit));
                }
                if values {
                    let cells: Vec<String> = self.iter().map(|m| format_float(m.value())).collect();
                    out.push_str(&format!("& {}", cells.join(" & ")));
                }
            }
            None => {
                if values {
                    let cells: Vec<String> = self.iter().map(Measurement::format_bare).collect();
                    out.push_str(&format!("& ${}$", cells.join("$ & $")));
                }
            }
        }

        latex_operators(&out)
    }
}

impl fmt::Display for MeasurementList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cells: Vec<String> = self.iter().map(Measurement::format_bare).collect();
        write!(f, "[{}]", cells.join(", "))?;
        if !self.unit.is_empty() {
            write!(f, " {}", self.unit)?;
        }
        Ok(())
    }
}

impl<'a> IntoIterator for &'a MeasurementList {
    type Item = &'a Measurement;
    type IntoIter = std::slice::Iter<'a, Measurement>;

    fn into_iter(self) -> Self::IntoIter {
        self.measurements.iter()
    }
}

impl IntoIterator for MeasurementList {
    type Item = Measurement;
    type IntoIter = std::vec::IntoIter<Measurement>;

    fn into_iter(self) -> Self::IntoIter {
        self.measurements.into_iter()
    }
}

// ============================================================================
// Operators
// ============================================================================

impl Neg for &MeasurementList {
    type Output = MeasurementList;

    fn neg(self) -> MeasurementList {
        MeasurementList {
            measurements: self.iter().map(|m| -m).collect(),
            unit: self.unit.clone(),
        }
    }
}

impl Neg for MeasurementList {
    type Output = MeasurementList;

    fn neg(self) -> MeasurementList {
        -&self
    }
}

macro_rules! list_ops {
    ($($Trait:ident, $method:ident, $checked:ident;)*) => {$(
        // list ⊕ list
        impl $Trait<&MeasurementList> for &MeasurementList {
            type Output = MeasureResult<MeasurementList>;
            fn $method(self, rhs: &MeasurementList) -> Self::Output {
                self.$checked(rhs)
            }
        }

        impl $Trait<MeasurementList> for MeasurementList {
            type Output = MeasureResult<MeasurementList>;
            fn $method(self, rhs: MeasurementList) -> Self::Output {
                self.$checked(&rhs)
            }
        }

        // list ⊕ measurement
        impl $Trait<&Measurement> for &MeasurementList {
            type Output = MeasureResult<MeasurementList>;
            fn $method(self, rhs: &Measurement) -> Self::Output {
                self.map(|m| m.$checked(rhs))
            }
        }

        impl $Trait<Measurement> for MeasurementList {
            type Output = MeasureResult<MeasurementList>;
            fn $method(self, rhs: Measurement) -> Self::Output {
                (&self).$method(&rhs)
            }
        }

        // measurement ⊕ list
        impl $Trait<&MeasurementList> for &Measurement {
            type Output = MeasureResult<MeasurementList>;
            fn $method(self, rhs: &MeasurementList) -> Self::Output {
                rhs.map(|m| self.$checked(m))
            }
        }

        impl $Trait<MeasurementList> for Measurement {
            type Output = MeasureResult<MeasurementList>;
            fn $method(self, rhs: MeasurementList) -> Self::Output {
                (&self).$method(&rhs)
            }
        }

        // list ⊕ scalar
        impl $Trait<f64> for &MeasurementList {
            type Output = MeasurementList;
            fn $method(self, rhs: f64) -> MeasurementList {
                self.map_infallible(|m| m.$method(rhs))
            }
        }

        impl $Trait<f64> for MeasurementList {
            type Output = MeasurementList;
            fn $method(self, rhs: f64) -> MeasurementList {
                (&self).$method(rhs)
            }
        }

        // scalar ⊕ list
        impl $Trait<&MeasurementList> for f64 {
            type Output = MeasurementList;
            fn $method(self, rhs: &MeasurementList) -> MeasurementList {
                rhs.map_infallible(|m| self.$method(m))
            }
        }

        impl $Trait<MeasurementList> for f64 {
            type Output = MeasurementList;
            fn $method(self, rhs: MeasurementList) -> MeasurementList {
                self.$method(&rhs)
            }
        }
    )*};
}

list_ops! {
    Add, add, checked_add;
    Sub, sub, checked_sub;
    Mul, mul, checked_mul;
    Div, div, checked_div;
}
