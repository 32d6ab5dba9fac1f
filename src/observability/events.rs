//! Discrete gateway events and the observer seam.
//!
//! # Responsibilities
//! - Define the `GatewayObserver` boundary for breaker transitions and
//!   classified failures
//! - Provide the default observer (structured logs + metrics)

use crate::observability::metrics;
use crate::resilience::circuit_breaker::CircuitState;
use crate::resilience::classifier::ClassifiedFailure;

/// Receives gateway events.
///
/// Implementations must not block: they are invoked inline on the
/// caller's task, after any breaker lock has been released.
pub trait GatewayObserver: Send + Sync {
    /// A breaker for `dependency` moved from `from` to `to`.
    fn on_transition(&self, dependency: &str, from: CircuitState, to: CircuitState);

    /// Attempt number `attempt` against `dependency` failed.
    fn on_failure(&self, dependency: &str, attempt: u32, failure: &ClassifiedFailure);
}

/// Default observer: emits `tracing` events and `metrics` counters.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl GatewayObserver for TracingObserver {
    fn on_transition(&self, dependency: &str, from: CircuitState, to: CircuitState) {
        match to {
            CircuitState::Open => tracing::warn!(
                dependency,
                from = %from,
                to = %to,
                "Circuit breaker opened"
            ),
            _ => tracing::info!(
                dependency,
                from = %from,
                to = %to,
                "Circuit breaker state changed"
            ),
        }
        metrics::record_breaker_transition(dependency, to);
    }

    fn on_failure(&self, dependency: &str, attempt: u32, failure: &ClassifiedFailure) {
        tracing::warn!(
            dependency,
            attempt,
            kind = failure.label(),
            retryable = failure.is_retryable(),
            error = %failure,
            "Upstream attempt failed"
        );
        // Rejections are counted by the breaker itself.
        if let Some(outcome) = failure.attempt_label() {
            metrics::record_attempt(dependency, outcome);
        }
    }
}
