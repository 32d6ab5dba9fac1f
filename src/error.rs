//! Errors surfaced to callers of the gateway.

use std::time::Duration;

use axum::http::StatusCode;
use thiserror::Error;

use crate::resilience::classifier::ClassifiedFailure;

/// Errors that can occur while performing a trusted call.
///
/// Every variant keeps its classification so the owning service can tell
/// "dependency unavailable" apart from "credential rejected" and from
/// "my own deadline expired".
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The configuration could not be loaded or is invalid. Startup only.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The CA bundle or client identity could not be loaded. Startup only.
    #[error("Trust configuration error for '{path}': {reason}")]
    TrustConfiguration { path: String, reason: String },

    /// The breaker for the dependency is open; no I/O was performed.
    #[error("Circuit open for dependency '{dependency}'")]
    BreakerOpen { dependency: String },

    /// Every permitted attempt failed with a transient failure.
    #[error("Dependency '{dependency}' unavailable after {attempts} attempt(s): {last}")]
    RemoteUnavailable {
        dependency: String,
        attempts: u32,
        last: ClassifiedFailure,
    },

    /// The remote explicitly rejected the call.
    #[error("Dependency '{dependency}' rejected the call with status {status}: {reason}")]
    FatalResponse {
        dependency: String,
        status: u16,
        reason: String,
    },

    /// The caller's own budget ran out before the call completed.
    #[error("Caller deadline exceeded after {attempts} attempt(s) and {elapsed:?}")]
    CallerDeadlineExceeded {
        dependency: String,
        attempts: u32,
        elapsed: Duration,
    },
}

impl From<crate::config::ConfigError> for GatewayError {
    fn from(err: crate::config::ConfigError) -> Self {
        GatewayError::Config(err.to_string())
    }
}

/// Result type for gateway operations.
pub type GatewayResult<T> = Result<T, GatewayError>;

impl GatewayError {
    /// True when the owning service should answer with a retryable
    /// service-unavailable response.
    pub fn is_retryable_upstream(&self) -> bool {
        matches!(
            self,
            GatewayError::BreakerOpen { .. } | GatewayError::RemoteUnavailable { .. }
        )
    }

    /// HTTP status the owning service answers with.
    pub fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::BreakerOpen { .. } | GatewayError::RemoteUnavailable { .. } => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            GatewayError::FatalResponse { status, .. } => match *status {
                403 => StatusCode::FORBIDDEN,
                400..=499 => StatusCode::UNAUTHORIZED,
                _ => StatusCode::BAD_GATEWAY,
            },
            GatewayError::CallerDeadlineExceeded { .. } => StatusCode::GATEWAY_TIMEOUT,
            GatewayError::Config(_) | GatewayError::TrustConfiguration { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Short label used for metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            GatewayError::Config(_) => "config",
            GatewayError::TrustConfiguration { .. } => "trust_configuration",
            GatewayError::BreakerOpen { .. } => "breaker_open",
            GatewayError::RemoteUnavailable { .. } => "remote_unavailable",
            GatewayError::FatalResponse { .. } => "fatal_response",
            GatewayError::CallerDeadlineExceeded { .. } => "caller_deadline_exceeded",
        }
    }
}
