// ============================================================================
// Fit Observer Interface
// Receives progress events from the nonlinear solver
// ============================================================================

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Events emitted while a nonlinear fit runs.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum FitEvent {
    /// Solver started on a dataset
    Started {
        model: String,
        points: usize,
        parameters: usize,
    },

    /// Trial step lowered χ²; damping is the value after the update
    StepAccepted {
        iteration: usize,
        cost: f64,
        damping: f64,
    },

    /// Trial step did not lower χ² (or could not be solved)
    StepRejected {
        iteration: usize,
        cost: f64,
        damping: f64,
    },

    /// Convergence criteria met
    Converged { iterations: usize, cost: f64 },

    /// Solver gave up
    Failed { iterations: usize, reason: String },
}

/// Sink for solver events.
/// Implementations can log or record solver progress.
pub trait FitObserver: Send + Sync {
    fn on_event(&self, event: &FitEvent);

    fn on_events(&self, events: &[FitEvent]) {
        for event in events {
            self.on_event(event);
        }
    }
}

/// Observer that ignores everything
pub struct NoOpFitObserver;

impl FitObserver for NoOpFitObserver {
    fn on_event(&self, _event: &FitEvent) {}
}

/// Observer that forwards events to `tracing` at debug level
pub struct LoggingFitObserver;

impl FitObserver for LoggingFitObserver {
    fn on_event(&self, event: &FitEvent) {
        tracing::debug!("Nonlinear fit event: {:?}", event);
    }
}
