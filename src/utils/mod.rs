// ============================================================================
// Utilities Module
// Statistics helpers and optional logging setup
// ============================================================================

mod statistics;

pub use statistics::{linspace, mean, population_std_dev, weighted_mean, weighted_sum};

/// Install a formatting `tracing` subscriber at `level`.
///
/// Returns `false` if a global subscriber was already set.
#[cfg(feature = "logging")]
pub fn init_tracing(level: tracing::Level) -> bool {
    tracing_subscriber::fmt()
        .with_max_level(level)
        .try_init()
        .is_ok()
}
