//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (thresholds, attempts, timeouts > 0)
//! - Enforce https for the upstream endpoint
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::fmt;

use url::Url;

use crate::config::schema::GatewayConfig;

/// A single semantic problem with a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate a configuration, collecting every problem found.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    match Url::parse(&config.upstream.verify_url) {
        Ok(url) if url.scheme() != "https" => errors.push(ValidationError::new(
            "upstream.verify_url",
            format!("scheme must be https, got '{}'", url.scheme()),
        )),
        Ok(url) if url.host_str().is_none() => {
            errors.push(ValidationError::new("upstream.verify_url", "missing host"))
        }
        Ok(_) => {}
        Err(e) => errors.push(ValidationError::new(
            "upstream.verify_url",
            format!("invalid URL: {}", e),
        )),
    }

    if config.upstream.name.trim().is_empty() {
        errors.push(ValidationError::new("upstream.name", "must not be empty"));
    }
    if config.upstream.ca_bundle_path.trim().is_empty() {
        errors.push(ValidationError::new("upstream.ca_bundle_path", "must not be empty"));
    }
    if config.upstream.max_connections_per_host == 0 {
        errors.push(ValidationError::new(
            "upstream.max_connections_per_host",
            "must be greater than 0",
        ));
    }
    if config.upstream.max_idle_per_host > config.upstream.max_connections_per_host {
        errors.push(ValidationError::new(
            "upstream.max_idle_per_host",
            "must not exceed max_connections_per_host",
        ));
    }
    if config.upstream.max_response_bytes == 0 {
        errors.push(ValidationError::new(
            "upstream.max_response_bytes",
            "must be greater than 0",
        ));
    }

    if config.breaker.trip_threshold == 0 {
        errors.push(ValidationError::new("breaker.trip_threshold", "must be greater than 0"));
    }
    if config.breaker.cool_down_ms == 0 {
        errors.push(ValidationError::new("breaker.cool_down_ms", "must be greater than 0"));
    }
    if config.breaker.window_size == 0 {
        errors.push(ValidationError::new("breaker.window_size", "must be greater than 0"));
    }

    if config.retries.max_attempts == 0 {
        errors.push(ValidationError::new("retries.max_attempts", "must be at least 1"));
    }

    if config.timeouts.attempt_ms == 0 {
        errors.push(ValidationError::new("timeouts.attempt_ms", "must be greater than 0"));
    }
    if config.timeouts.default_budget_ms == 0 {
        errors.push(ValidationError::new(
            "timeouts.default_budget_ms",
            "must be greater than 0",
        ));
    }
    if config.timeouts.connect_ms == 0 {
        errors.push(ValidationError::new("timeouts.connect_ms", "must be greater than 0"));
    }

    if config.service.request_timeout_ms == 0 {
        errors.push(ValidationError::new(
            "service.request_timeout_ms",
            "must be greater than 0",
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
