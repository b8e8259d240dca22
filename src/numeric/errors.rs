// ============================================================================
// Measurement Errors
// Error taxonomy for unit parsing, dimensional analysis and fitting
// ============================================================================

use thiserror::Error;

/// Reason a unit string could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// Character that is neither a known prefix/symbol nor skippable
    #[error("unknown character '{character}' at position {position} in \"{input}\"")]
    UnknownCharacter {
        input: String,
        character: char,
        position: usize,
    },

    /// More than one '/' in a single unit string
    #[error("cannot have two '/' characters in \"{input}\"")]
    SecondSlash { input: String },

    /// Parentheses or braces are not part of the unit grammar
    #[error(
        "parentheses are not supported in \"{input}\"; use negative exponents or a '/' instead"
    )]
    Parentheses { input: String },

    /// Exponent digits that do not fit an i32
    #[error("exponent '{exponent}' is out of range in \"{input}\"")]
    InvalidExponent { input: String, exponent: String },

    /// The same symbol written twice with different prefixes
    #[error("symbol '{symbol}' appears with prefixes '{first}' and '{second}' in \"{input}\"")]
    RepeatedSymbol {
        input: String,
        symbol: String,
        first: String,
        second: String,
    },
}

/// Errors raised while combining or registering units.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UnitError {
    /// Both operands carry the symbol with different prefixes
    #[error(
        "units have different prefixes for '{symbol}': '{left}' and '{right}'; \
         combining them would introduce a constant factor"
    )]
    PrefixConflict {
        symbol: String,
        left: String,
        right: String,
    },

    /// Raising to a power that leaves a fractional exponent
    #[error("raising '{unit}' to the power {exponent} gives a non-integral exponent")]
    NonIntegralPower { unit: String, exponent: String },

    /// Combined exponent does not fit an i32
    #[error("exponent overflow while combining '{unit}'")]
    ExponentOverflow { unit: String },

    /// Registering a symbol that is already known
    #[error("unit symbol '{symbol}' is already registered")]
    DuplicateSymbol { symbol: String },

    /// Registering a symbol that cannot be parsed back
    #[error("invalid unit symbol '{symbol}': {reason}")]
    InvalidSymbol { symbol: String, reason: String },

    /// Derived expansion referencing something other than base units
    #[error("expansion \"{expansion}\" of '{symbol}' must use base units only")]
    NonBaseExpansion { symbol: String, expansion: String },

    /// Elements of one list that do not share a unit
    #[error("all measurements in a list must share one unit: found '{expected}' and '{found}'")]
    MixedUnits { expected: String, found: String },
}

/// Errors raised by the regression engines.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FitError {
    /// Too few points for the requested statistics
    #[error("{points} data points are not enough, at least {required} are required")]
    InsufficientData { points: usize, required: usize },

    /// All x values coincide so the slope is undefined
    #[error("x values have zero weighted spread; the slope is undefined")]
    DegenerateAbscissa,

    /// Some but not all points have zero uncertainty
    #[error("point {index} has zero uncertainty while others do not; weights would be infinite")]
    ZeroUncertainty { index: usize },

    /// Initial guess does not match the model arity
    #[error("initial guess has {got} parameters but the model expects {expected}")]
    InitialGuessLength { expected: usize, got: usize },

    /// Solver ran out of iterations
    #[error("solver did not converge within {iterations} iterations (cost {cost:e})")]
    DidNotConverge { iterations: usize, cost: f64 },

    /// Every trial step near the current point was non-finite or unsolvable
    #[error("solver stalled after {iterations} iterations (cost {cost:e}): no finite trial step")]
    Stalled { iterations: usize, cost: f64 },

    /// Normal matrix could not be inverted
    #[error("normal matrix is singular; parameter covariance is undefined")]
    SingularMatrix,

    /// Model produced NaN or infinity
    #[error("model returned a non-finite value at x = {x}")]
    NonFiniteModel { x: f64 },

    /// Uncertainty band would need too many model evaluations
    #[error("uncertainty band over {parameters} parameters exceeds the limit of {limit}")]
    BandTooLarge { parameters: usize, limit: usize },

    /// Configuration values out of range
    #[error("invalid fit configuration: {0}")]
    InvalidConfig(String),
}

/// Canonical error type of the crate.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MeasureError {
    /// Malformed unit string
    #[error("unit parse error: {0}")]
    Parse(#[from] ParseError),

    /// Incompatible unit combination
    #[error("unit error: {0}")]
    Unit(#[from] UnitError),

    /// Operation between dimensionally incompatible quantities
    #[error("dimension error: cannot {operation} '{left}' and '{right}'")]
    Dimension {
        operation: &'static str,
        left: String,
        right: String,
    },

    /// Function that needs a dimensionless argument
    #[error("dimension error: {function} takes a dimensionless argument, got '{unit}'")]
    NotDimensionless { function: &'static str, unit: String },

    /// Elementwise operation between lists of different sizes
    #[error(
        "cannot combine lists of different lengths: {left} != {right}; \
         use append() to concatenate them instead"
    )]
    Length { left: usize, right: usize },

    /// Regression failure
    #[error("fit error: {0}")]
    Fit(#[from] FitError),
}

impl MeasureError {
    pub(crate) fn dimension(
        operation: &'static str,
        left: impl ToString,
        right: impl ToString,
    ) -> Self {
        MeasureError::Dimension {
            operation,
            left: left.to_string(),
            right: right.to_string(),
        }
    }

    /// Returns true for the parse family.
    pub fn is_parse(&self) -> bool {
        matches!(self, MeasureError::Parse(_))
    }

    pub(crate) fn not_dimensionless(function: &'static str, unit: impl ToString) -> Self {
        MeasureError::NotDimensionless {
            function,
            unit: unit.to_string(),
        }
    }

    /// Returns true for the dimension family.
    pub fn is_dimension(&self) -> bool {
        matches!(
            self,
            MeasureError::Dimension { .. } | MeasureError::NotDimensionless { .. }
        )
    }
}

/// Result type alias for measurement operations
pub type MeasureResult<T> = Result<T, MeasureError>;
