//! Failure classification.
//!
//! # Responsibilities
//! - Map every raw attempt outcome to exactly one `ClassifiedFailure`
//! - Decide retryability and breaker accounting per tag
//!
//! # Design Decisions
//! - Narrow retryable set: connect failures, attempt timeouts and 503/504
//! - Every other non-2xx is fatal, including 401/403
//! - A caller-side deadline is never retryable; the budget is gone

use std::fmt;
use std::time::Duration;

use reqwest::StatusCode;

use crate::net::TransportError;

/// Longest body excerpt kept as a failure reason.
const MAX_REASON_BYTES: usize = 256;

/// The category of a failed attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClassifiedFailure {
    /// The breaker refused the attempt; no I/O happened.
    BreakerOpen,
    /// The caller's deadline passed before a response arrived.
    CallerTimeout,
    /// The remote answered 503 or 504.
    RemoteUnavailable { status: u16 },
    /// DNS, TCP, TLS or connection-level failure.
    ConnectFailure { reason: String },
    /// The per-attempt ceiling expired while the caller still had budget.
    AttemptTimeout { after: Duration },
    /// Any other non-2xx, or a 2xx that could not be decoded.
    FatalResponse { status: u16, reason: String },
}

impl ClassifiedFailure {
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ClassifiedFailure::ConnectFailure { .. }
                | ClassifiedFailure::RemoteUnavailable { .. }
                | ClassifiedFailure::AttemptTimeout { .. }
        )
    }

    /// Whether the outcome says something about the remote's health.
    pub fn counts_against_breaker(&self, count_caller_timeouts: bool) -> bool {
        match self {
            ClassifiedFailure::BreakerOpen => false,
            ClassifiedFailure::CallerTimeout => count_caller_timeouts,
            ClassifiedFailure::RemoteUnavailable { .. }
            | ClassifiedFailure::ConnectFailure { .. }
            | ClassifiedFailure::AttemptTimeout { .. } => true,
            // A deliberate 4xx means the remote is up and answering.
            ClassifiedFailure::FatalResponse { status, .. } => *status >= 500,
        }
    }

    /// Outcome label for `gateway_attempts_total`. `None` when no attempt
    /// reached the wire; breaker rejections have their own counter.
    pub fn attempt_label(&self) -> Option<&'static str> {
        match self {
            ClassifiedFailure::BreakerOpen => None,
            other => Some(other.label()),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ClassifiedFailure::BreakerOpen => "breaker_open",
            ClassifiedFailure::CallerTimeout => "caller_timeout",
            ClassifiedFailure::RemoteUnavailable { .. } => "remote_unavailable",
            ClassifiedFailure::ConnectFailure { .. } => "connect_failure",
            ClassifiedFailure::AttemptTimeout { .. } => "attempt_timeout",
            ClassifiedFailure::FatalResponse { .. } => "fatal_response",
        }
    }

    /// A 2xx whose body is not the expected shape.
    pub fn undecodable(status: u16, err: &serde_json::Error) -> Self {
        ClassifiedFailure::FatalResponse {
            status,
            reason: format!("invalid response body: {}", err),
        }
    }
}

impl fmt::Display for ClassifiedFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClassifiedFailure::BreakerOpen => write!(f, "circuit open"),
            ClassifiedFailure::CallerTimeout => write!(f, "caller deadline exceeded"),
            ClassifiedFailure::RemoteUnavailable { status } => {
                write!(f, "remote unavailable (status {})", status)
            }
            ClassifiedFailure::ConnectFailure { reason } => {
                write!(f, "connect failure: {}", reason)
            }
            ClassifiedFailure::AttemptTimeout { after } => {
                write!(f, "attempt timed out after {:?}", after)
            }
            ClassifiedFailure::FatalResponse { status, reason } => {
                write!(f, "fatal response (status {}): {}", status, reason)
            }
        }
    }
}

/// The remote answered with `status`.
pub fn classify_status(status: u16, body: &[u8]) -> Result<(), ClassifiedFailure> {
    match status {
        200..=299 => Ok(()),
        503 | 504 => Err(ClassifiedFailure::RemoteUnavailable { status }),
        _ => Err(ClassifiedFailure::FatalResponse {
            status,
            reason: reason_from_body(status, body),
        }),
    }
}

/// Nothing usable came back from the peer.
pub fn classify_transport(err: &TransportError) -> ClassifiedFailure {
    match err {
        // The remote answered; retrying would read the same oversized body.
        TransportError::ResponseTooLarge { status, .. } => ClassifiedFailure::FatalResponse {
            status: *status,
            reason: err.to_string(),
        },
        _ => ClassifiedFailure::ConnectFailure {
            reason: err.to_string(),
        },
    }
}

/// The attempt deadline fired. `budget_exhausted` is true when that
/// deadline was the caller's own.
pub fn classify_elapsed(budget_exhausted: bool, after: Duration) -> ClassifiedFailure {
    if budget_exhausted {
        ClassifiedFailure::CallerTimeout
    } else {
        ClassifiedFailure::AttemptTimeout { after }
    }
}

/// `error` or `message` from a JSON body, else the body text, else the
/// status reason phrase.
fn reason_from_body(status: u16, body: &[u8]) -> String {
    if let Ok(serde_json::Value::Object(map)) = serde_json::from_slice::<serde_json::Value>(body) {
        for key in ["error", "message"] {
            if let Some(serde_json::Value::String(reason)) = map.get(key) {
                return truncate(reason.trim());
            }
        }
    }

    let text = String::from_utf8_lossy(body);
    let text = text.trim();
    if !text.is_empty() {
        return truncate(text);
    }

    StatusCode::from_u16(status)
        .ok()
        .and_then(|s| s.canonical_reason())
        .unwrap_or("unknown status")
        .to_string()
}

fn truncate(s: &str) -> String {
    if s.len() <= MAX_REASON_BYTES {
        return s.to_string();
    }
    let mut end = MAX_REASON_BYTES;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    s[..end].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(status: u16, body: &str) -> Result<(), ClassifiedFailure> {
        classify_status(status, body.as_bytes())
    }

    #[test]
    fn test_success_statuses() {
        assert_eq!(response(200, "{}"), Ok(()));
        assert_eq!(response(204, ""), Ok(()));
    }

    #[test]
    fn test_only_503_and_504_are_transient() {
        assert_eq!(
            response(503, ""),
            Err(ClassifiedFailure::RemoteUnavailable { status: 503 })
        );
        assert_eq!(
            response(504, ""),
            Err(ClassifiedFailure::RemoteUnavailable { status: 504 })
        );
        for status in [400, 401, 403, 404, 429, 500, 502] {
            let failure = response(status, "").unwrap_err();
            assert!(!failure.is_retryable(), "status {} must be fatal", status);
        }
    }

    #[test]
    fn test_auth_rejection_keeps_reason() {
        let failure = response(401, r#"{"error": "token expired"}"#).unwrap_err();
        assert_eq!(
            failure,
            ClassifiedFailure::FatalResponse {
                status: 401,
                reason: "token expired".into()
            }
        );

        let failure = response(403, r#"{"message": "role not allowed"}"#).unwrap_err();
        assert!(matches!(
            failure,
            ClassifiedFailure::FatalResponse { reason, .. } if reason == "role not allowed"
        ));
    }

    #[test]
    fn test_reason_falls_back_to_text_then_status() {
        let failure = response(400, "bad token format\n").unwrap_err();
        assert!(matches!(
            failure,
            ClassifiedFailure::FatalResponse { reason, .. } if reason == "bad token format"
        ));

        let failure = response(401, "").unwrap_err();
        assert!(matches!(
            failure,
            ClassifiedFailure::FatalResponse { reason, .. } if reason == "Unauthorized"
        ));
    }

    #[test]
    fn test_long_reason_truncated_on_char_boundary() {
        let body = "é".repeat(300);
        let failure = response(400, &body).unwrap_err();
        match failure {
            ClassifiedFailure::FatalResponse { reason, .. } => {
                assert!(reason.len() <= MAX_REASON_BYTES);
                assert!(reason.chars().all(|c| c == 'é'));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_transport_errors_are_connect_failures() {
        let err = TransportError::TlsHandshake("invalid peer certificate: UnknownIssuer".into());
        let failure = classify_transport(&err);
        assert!(matches!(failure, ClassifiedFailure::ConnectFailure { .. }));
        assert!(failure.is_retryable());
    }

    #[test]
    fn test_oversized_body_is_fatal() {
        let err = TransportError::ResponseTooLarge {
            status: 200,
            limit: 1024,
        };
        let failure = classify_transport(&err);
        assert!(matches!(failure, ClassifiedFailure::FatalResponse { status: 200, .. }));
        assert!(!failure.is_retryable());
        assert!(!failure.counts_against_breaker(false));
    }

    #[test]
    fn test_elapsed_split_by_budget() {
        let caller = classify_elapsed(true, Duration::from_millis(100));
        assert_eq!(caller, ClassifiedFailure::CallerTimeout);
        assert!(!caller.is_retryable());

        let attempt = classify_elapsed(false, Duration::from_secs(3));
        assert_eq!(
            attempt,
            ClassifiedFailure::AttemptTimeout {
                after: Duration::from_secs(3)
            }
        );
        assert!(attempt.is_retryable());
    }

    #[test]
    fn test_breaker_rejection_has_no_attempt_label() {
        assert_eq!(ClassifiedFailure::BreakerOpen.attempt_label(), None);
        assert_eq!(ClassifiedFailure::CallerTimeout.attempt_label(), Some("caller_timeout"));
        assert_eq!(
            ClassifiedFailure::RemoteUnavailable { status: 503 }.attempt_label(),
            Some("remote_unavailable")
        );
    }

    #[test]
    fn test_breaker_accounting() {
        assert!(!ClassifiedFailure::CallerTimeout.counts_against_breaker(false));
        assert!(ClassifiedFailure::CallerTimeout.counts_against_breaker(true));
        let unavailable = ClassifiedFailure::RemoteUnavailable { status: 503 };
        assert!(unavailable.counts_against_breaker(false));
        assert!(!ClassifiedFailure::FatalResponse {
            status: 401,
            reason: String::new()
        }
        .counts_against_breaker(false));
        assert!(ClassifiedFailure::FatalResponse {
            status: 500,
            reason: String::new()
        }
        .counts_against_breaker(false));
    }
}
