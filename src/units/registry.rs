// ============================================================================
// Unit Registry
// Symbol table of base and derived units, shared by the whole process
// ============================================================================

use std::fmt;
use std::ops::{Index, IndexMut};
use std::sync::LazyLock;

use parking_lot::{RwLock, RwLockReadGuard};
use tracing::info;

use super::parser::parse_unit;
use super::unit::Unit;
use crate::numeric::{MeasureResult, ParseError, UnitError};

/// One of the five SI base dimensions this crate tracks.
///
/// Mass is kept in grams so that `kg` is simply the `k` prefix on `g`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BaseDimension {
    Length,
    Mass,
    Time,
    Current,
    Temperature,
}

impl BaseDimension {
    pub const ALL: [BaseDimension; 5] = [
        BaseDimension::Length,
        BaseDimension::Mass,
        BaseDimension::Time,
        BaseDimension::Current,
        BaseDimension::Temperature,
    ];

    pub const fn symbol(self) -> &'static str {
        match self {
            BaseDimension::Length => "m",
            BaseDimension::Mass => "g",
            BaseDimension::Time => "s",
            BaseDimension::Current => "A",
            BaseDimension::Temperature => "K",
        }
    }

    #[inline]
    const fn index(self) -> usize {
        self as usize
    }
}

/// Integer exponents over the base dimensions, in `m g s A K` order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct BaseDimensions([i32; 5]);

impl BaseDimensions {
    pub const NONE: BaseDimensions = BaseDimensions([0; 5]);

    pub const fn new(exponents: [i32; 5]) -> Self {
        BaseDimensions(exponents)
    }

    pub const fn exponents(&self) -> [i32; 5] {
        self.0
    }

    pub fn is_none(&self) -> bool {
        self.0.iter().all(|&e| e == 0)
    }

    /// Add `other` raised to `power`; `None` when an exponent overflows.
    pub(crate) fn accumulate(&mut self, other: &BaseDimensions, power: i32) -> Option<()> {
        let mut sum = self.0;
        for (mine, theirs) in sum.iter_mut().zip(other.0.iter()) {
            *mine = mine.checked_add(theirs.checked_mul(power)?)?;
        }
        self.0 = sum;
        Some(())
    }
}

impl Index<BaseDimension> for BaseDimensions {
    type Output = i32;

    fn index(&self, dimension: BaseDimension) -> &i32 {
        &self.0[dimension.index()]
    }
}

impl IndexMut<BaseDimension> for BaseDimensions {
    fn index_mut(&mut self, dimension: BaseDimension) -> &mut i32 {
        &mut self.0[dimension.index()]
    }
}

impl fmt::Display for BaseDimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for dimension in BaseDimension::ALL {
            let power = self[dimension];
            if power == 0 {
                continue;
            }
            if !first {
                f.write_str(" ")?;
            }
            first = false;
            if power == 1 {
                write!(f, "{}", dimension.symbol())?;
            } else {
                write!(f, "{}^{}", dimension.symbol(), power)?;
            }
        }
        Ok(())
    }
}

/// Position of a symbol in the registry; also its display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SymbolId(u16);

impl SymbolId {
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// Expansion of a derived symbol into base dimensions.
#[derive(Debug, Clone, PartialEq)]
pub struct DerivedUnit {
    /// Base-unit string the symbol was defined with
    pub expansion: String,
    /// Multiplicative constant supplied with the definition
    pub constant: f64,
    /// Total factor to the unprefixed base units (constant and expansion prefixes)
    pub factor: f64,
    pub dimensions: BaseDimensions,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SymbolKind {
    Base(BaseDimension),
    Derived(DerivedUnit),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SymbolDef {
    pub symbol: String,
    pub kind: SymbolKind,
}

impl SymbolDef {
    pub fn is_base(&self) -> bool {
        matches!(self.kind, SymbolKind::Base(_))
    }
}

/// A unit reduced to a scale factor over unprefixed base dimensions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedUnit {
    pub factor: f64,
    pub dimensions: BaseDimensions,
}

impl ResolvedUnit {
    pub const IDENTITY: ResolvedUnit = ResolvedUnit {
        factor: 1.0,
        dimensions: BaseDimensions::NONE,
    };

    /// Same base dimensions.
    pub fn is_compatible(&self, other: &ResolvedUnit) -> bool {
        self.dimensions == other.dimensions
    }

    /// Same dimensions and the same factor within a relative 1e-12.
    pub fn equivalent(&self, other: &ResolvedUnit) -> bool {
        self.is_compatible(other) && {
            let scale = self.factor.abs().max(other.factor.abs());
            (self.factor - other.factor).abs() <= 1e-12 * scale
        }
    }
}

const KILO: f64 = 1e3;
const ELECTRON_VOLT: f64 = 1.602176634e-19;

// (symbol, expansion, constant, factor, [m, g, s, A, K])
const BUILTIN_DERIVED: [(&str, &str, f64, f64, [i32; 5]); 9] = [
    ("J", "kg m^2 s^-2", 1.0, KILO, [2, 1, -2, 0, 0]),
    ("V", "kg m^2 s^-3 A^-1", 1.0, KILO, [2, 1, -3, -1, 0]),
    ("N", "kg m s^-2", 1.0, KILO, [1, 1, -2, 0, 0]),
    ("W", "kg m^2 s^-3", 1.0, KILO, [2, 1, -3, 0, 0]),
    ("T", "kg s^-2 A^-1", 1.0, KILO, [0, 1, -2, -1, 0]),
    ("Pa", "kg m^-1 s^-2", 1.0, KILO, [-1, 1, -2, 0, 0]),
    ("Hz", "s^-1", 1.0, 1.0, [0, 0, -1, 0, 0]),
    ("C", "K", 1.0, 1.0, [0, 0, 0, 0, 1]),
    (
        "eV",
        "kg m^2 s^-2",
        ELECTRON_VOLT,
        KILO * ELECTRON_VOLT,
        [2, 1, -2, 0, 0],
    ),
];

/// Ordered symbol table.
///
/// Derived symbols come first, then the base symbols, then anything added
/// through [`UnitRegistry::register`]. Ids are never reused, so a [`Unit`]
/// parsed earlier stays valid after later registrations.
#[derive(Debug, Clone)]
pub struct UnitRegistry {
    symbols: Vec<SymbolDef>,
}

impl UnitRegistry {
    /// The fixed table: J V N W T Pa Hz C eV, then m g s A K.
    pub fn builtin() -> Self {
        let derived = BUILTIN_DERIVED.iter().map(
            |&(symbol, expansion, constant, factor, dimensions)| SymbolDef {
                symbol: symbol.to_string(),
                kind: SymbolKind::Derived(DerivedUnit {
                    expansion: expansion.to_string(),
                    constant,
                    factor,
                    dimensions: BaseDimensions::new(dimensions),
                }),
            },
        );
        let base = BaseDimension::ALL.iter().map(|&dimension| SymbolDef {
            symbol: dimension.symbol().to_string(),
            kind: SymbolKind::Base(dimension),
        });

        Self {
            symbols: derived.chain(base).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    pub fn symbols(&self) -> impl Iterator<Item = (SymbolId, &SymbolDef)> {
        self.symbols
            .iter()
            .enumerate()
            .map(|(i, def)| (SymbolId(i as u16), def))
    }

    pub fn get(&self, id: SymbolId) -> Option<&SymbolDef> {
        self.symbols.get(id.index())
    }

    /// Symbol text for an id, `?` if the id is foreign to this registry.
    pub fn symbol_name(&self, id: SymbolId) -> &str {
        self.get(id).map_or("?", |def| def.symbol.as_str())
    }

    pub fn lookup(&self, symbol: &str) -> Option<SymbolId> {
        self.symbols
            .iter()
            .position(|def| def.symbol == symbol)
            .map(|i| SymbolId(i as u16))
    }

    /// Longest symbol that `chars` starts with, and its length in chars.
    pub(crate) fn longest_match(&self, chars: &[char]) -> Option<(SymbolId, usize)> {
        let mut best: Option<(SymbolId, usize)> = None;
        for (id, def) in self.symbols() {
            let len = def.symbol.chars().count();
            if len == 0 || len > chars.len() {
                continue;
            }
            if best.is_some_and(|(_, best_len)| best_len >= len) {
                continue;
            }
            if def.symbol.chars().zip(chars.iter()).all(|(a, &b)| a == b) {
                best = Some((id, len));
            }
        }
        best
    }

    /// Parse a unit string against this table.
    pub fn parse(&self, input: &str) -> Result<Unit, ParseError> {
        parse_unit(self, input)
    }

    /// Reduce a unit to its factor and base dimensions.
    pub fn resolve(&self, unit: &Unit) -> Result<ResolvedUnit, UnitError> {
        let overflow = || UnitError::ExponentOverflow {
            unit: unit.render_with(self),
        };
        let mut resolved = ResolvedUnit::IDENTITY;
        for term in unit.terms() {
            let Some(def) = self.get(term.symbol()) else {
                continue;
            };
            resolved.factor *= term.prefix().multiplier().powi(term.power());
            match &def.kind {
                SymbolKind::Base(dimension) => {
                    let exponent = &mut resolved.dimensions[*dimension];
                    *exponent = exponent.checked_add(term.power()).ok_or_else(overflow)?;
                }
                SymbolKind::Derived(derived) => {
                    resolved.factor *= derived.factor.powi(term.power());
                    resolved
                        .dimensions
                        .accumulate(&derived.dimensions, term.power())
                        .ok_or_else(overflow)?;
                }
            }
        }
        Ok(resolved)
    }

    /// Add a derived symbol defined as `constant × si_equivalent`.
    ///
    /// The expansion may only use base symbols (with prefixes).
    pub fn register(
        &mut self,
        symbol: &str,
        si_equivalent: &str,
        constant: f64,
    ) -> MeasureResult<SymbolId> {
        if symbol.is_empty() {
            return Err(invalid_symbol(symbol, "symbol is empty"));
        }
        if !symbol.chars().all(char::is_alphabetic) {
            return Err(invalid_symbol(symbol, "symbol must be alphabetic"));
        }
        if self.lookup(symbol).is_some() {
            return Err(UnitError::DuplicateSymbol {
                symbol: symbol.to_string(),
            }
            .into());
        }
        if !constant.is_finite() || constant == 0.0 {
            return Err(invalid_symbol(
                symbol,
                &format!("constant {} must be finite and non-zero", constant),
            ));
        }
        if self.symbols.len() >= u16::MAX as usize {
            return Err(invalid_symbol(symbol, "registry is full"));
        }

        let expansion = self.parse(si_equivalent)?;
        let all_base = expansion
            .terms()
            .iter()
            .all(|term| self.get(term.symbol()).is_some_and(SymbolDef::is_base));
        if !all_base {
            return Err(UnitError::NonBaseExpansion {
                symbol: symbol.to_string(),
                expansion: si_equivalent.to_string(),
            }
            .into());
        }

        let resolved = self.resolve(&expansion)?;
        let id = SymbolId(self.symbols.len() as u16);
        self.symbols.push(SymbolDef {
            symbol: symbol.to_string(),
            kind: SymbolKind::Derived(DerivedUnit {
                expansion: si_equivalent.to_string(),
                constant,
                factor: constant * resolved.factor,
                dimensions: resolved.dimensions,
            }),
        });
        Ok(id)
    }

    /// True if the prefix-free reading of `symbol` is known.
    pub fn contains(&self, symbol: &str) -> bool {
        self.lookup(symbol).is_some()
    }
}

impl Default for UnitRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

fn invalid_symbol(symbol: &str, reason: &str) -> crate::numeric::MeasureError {
    UnitError::InvalidSymbol {
        symbol: symbol.to_string(),
        reason: reason.to_string(),
    }
    .into()
}

static GLOBAL_REGISTRY: LazyLock<RwLock<UnitRegistry>> =
    LazyLock::new(|| RwLock::new(UnitRegistry::builtin()));

/// Read access to the process-wide registry.
///
/// Do not hold the guard across a call to [`register_unit`].
pub fn registry() -> RwLockReadGuard<'static, UnitRegistry> {
    GLOBAL_REGISTRY.read()
}

/// Register a derived unit for the rest of the process lifetime.
///
/// Meant to be called at startup, before measurements using the symbol are
/// created. Units parsed before the call keep their meaning.
///
/// ```
/// use lab_measure::units::register_unit;
///
/// register_unit("L", "m^3", 1e-3).unwrap();
/// ```
pub fn register_unit(symbol: &str, si_equivalent: &str, constant: f64) -> MeasureResult<()> {
    let mut registry = GLOBAL_REGISTRY.write();
    let id = registry.register(symbol, si_equivalent, constant)?;
    info!(
        symbol,
        si_equivalent,
        constant,
        id = id.index(),
        "registered derived unit"
    );
    Ok(())
}
