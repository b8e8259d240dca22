// ============================================================================
// Units Module
// SI prefixes, the unit registry, unit parsing and the Unit type
// ============================================================================

mod parser;
mod prefix;
mod registry;
mod unit;

pub use prefix::Prefix;
pub use registry::{
    register_unit, registry, BaseDimension, BaseDimensions, DerivedUnit, ResolvedUnit, SymbolDef,
    SymbolId, SymbolKind, UnitRegistry,
};
pub use unit::{Unit, UnitTerm};
