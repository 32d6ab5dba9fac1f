//! Error responses of the owning service.
//!
//! # Responsibilities
//! - Map every `GatewayError` to its HTTP status
//! - Keep the classification visible to clients (`error` field)
//! - Add `Retry-After` to retryable service-unavailable answers
//!
//! # Design Decisions
//! - Unavailable dependency → 503, rejected credential → 401/403,
//!   own deadline → 504
//! - Bodies are small JSON objects, never upstream payloads

use std::time::Duration;

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::error::GatewayError;

/// `Retry-After` used when no better hint is known.
const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(1);

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: &'static str,
    pub message: String,
}

/// A gateway error plus the delay clients should wait before retrying.
#[derive(Debug)]
pub struct GatewayRejection {
    pub error: GatewayError,
    pub retry_after: Duration,
}

impl GatewayRejection {
    pub fn new(error: GatewayError, retry_after: Duration) -> Self {
        Self { error, retry_after }
    }
}

impl IntoResponse for GatewayRejection {
    fn into_response(self) -> Response {
        let status = self.error.status_code();
        let body = ErrorBody {
            error: self.error.kind(),
            message: self.error.to_string(),
        };
        let mut response = (status, Json(body)).into_response();

        if self.error.is_retryable_upstream() {
            // Whole seconds, at least one.
            let secs = self.retry_after.as_millis().div_ceil(1_000).max(1) as u64;
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(secs));
        }
        response
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        GatewayRejection::new(self, DEFAULT_RETRY_AFTER).into_response()
    }
}

/// A request rejected before the gateway was consulted.
pub fn unauthorized(message: &str) -> Response {
    let body = ErrorBody {
        error: "missing_credential",
        message: message.to_string(),
    };
    let mut response = (StatusCode::UNAUTHORIZED, Json(body)).into_response();
    response
        .headers_mut()
        .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resilience::ClassifiedFailure;

    #[test]
    fn test_breaker_open_has_retry_after() {
        let err = GatewayError::BreakerOpen {
            dependency: "identity".into(),
        };
        let response = GatewayRejection::new(err, Duration::from_millis(4_200)).into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(response.headers()[header::RETRY_AFTER], "5");
    }

    #[test]
    fn test_unavailable_uses_default_retry_after() {
        let err = GatewayError::RemoteUnavailable {
            dependency: "identity".into(),
            attempts: 3,
            last: ClassifiedFailure::ConnectFailure {
                reason: "refused".into(),
            },
        };
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(response.headers()[header::RETRY_AFTER], "1");
    }

    #[test]
    fn test_rejection_is_not_retryable() {
        let err = GatewayError::FatalResponse {
            dependency: "identity".into(),
            status: 401,
            reason: "token expired".into(),
        };
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(response.headers().get(header::RETRY_AFTER).is_none());
    }

    #[test]
    fn test_missing_credential() {
        let response = unauthorized("missing bearer credential");
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(response.headers()[header::WWW_AUTHENTICATE], "Bearer");
    }
}
