// ============================================================================
// SI Prefixes
// ============================================================================

use std::fmt;

/// Metric multiplier written in front of a unit symbol.
///
/// `u` and `µ` both denote 1e-6 but stay distinct so a unit prints the way it
/// was written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Prefix {
    Pico,
    Nano,
    /// ASCII `u`
    Micro,
    /// `µ`
    MicroSign,
    Milli,
    Centi,
    #[default]
    None,
    Kilo,
    Mega,
    Giga,
    Tera,
}

impl Prefix {
    /// Every prefix, smallest multiplier first.
    pub const ALL: [Prefix; 11] = [
        Prefix::Pico,
        Prefix::Nano,
        Prefix::Micro,
        Prefix::MicroSign,
        Prefix::Milli,
        Prefix::Centi,
        Prefix::None,
        Prefix::Kilo,
        Prefix::Mega,
        Prefix::Giga,
        Prefix::Tera,
    ];

    /// Symbol as written in a unit string (empty for `None`).
    pub const fn symbol(self) -> &'static str {
        match self {
            Prefix::Pico => "p",
            Prefix::Nano => "n",
            Prefix::Micro => "u",
            Prefix::MicroSign => "µ",
            Prefix::Milli => "m",
            Prefix::Centi => "c",
            Prefix::None => "",
            Prefix::Kilo => "k",
            Prefix::Mega => "M",
            Prefix::Giga => "G",
            Prefix::Tera => "T",
        }
    }

    /// Power-of-ten multiplier.
    pub const fn multiplier(self) -> f64 {
        match self {
            Prefix::Pico => 1e-12,
            Prefix::Nano => 1e-9,
            Prefix::Micro | Prefix::MicroSign => 1e-6,
            Prefix::Milli => 1e-3,
            Prefix::Centi => 1e-2,
            Prefix::None => 1.0,
            Prefix::Kilo => 1e3,
            Prefix::Mega => 1e6,
            Prefix::Giga => 1e9,
            Prefix::Tera => 1e12,
        }
    }

    /// Prefix for a single character, if it is one.
    pub fn from_char(c: char) -> Option<Prefix> {
        Prefix::ALL
            .iter()
            .copied()
            .filter(|p| *p != Prefix::None)
            .find(|p| p.symbol().starts_with(c))
    }

    #[inline]
    pub const fn is_none(self) -> bool {
        matches!(self, Prefix::None)
    }
}

impl fmt::Display for Prefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}
