//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration for the trust gateway and its owning service.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Inbound service settings (bind address, request timeout).
    pub service: ServiceConfig,

    /// The trust-issuing dependency and how to reach it.
    pub upstream: UpstreamConfig,

    /// Circuit breaker settings.
    pub breaker: BreakerConfig,

    /// Retry configuration.
    pub retries: RetryConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Inbound service configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Total time an inbound request may take, in milliseconds.
    /// This is the deadline handed to the gateway.
    pub request_timeout_ms: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            request_timeout_ms: 5_000,
        }
    }
}

impl ServiceConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// The collaborating service that verifies credentials.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Logical dependency name. Breakers are keyed by this.
    pub name: String,

    /// Endpoint receiving `POST {"token": ..}`. Must be https.
    pub verify_url: String,

    /// PEM bundle of trusted certificate authorities.
    pub ca_bundle_path: String,

    /// Optional client certificate for mutual TLS.
    pub client_identity: Option<TlsIdentityConfig>,

    /// Maximum concurrent connections per upstream host.
    pub max_connections_per_host: usize,

    /// Maximum idle pooled connections per upstream host.
    pub max_idle_per_host: usize,

    /// Idle pooled connections are closed after this many seconds.
    pub idle_timeout_secs: u64,

    /// Largest response body read from the upstream, in bytes.
    pub max_response_bytes: usize,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            name: "identity-service".to_string(),
            verify_url: "https://identity.internal:8443/v1/verify".to_string(),
            ca_bundle_path: "/etc/trust-gateway/ca.pem".to_string(),
            client_identity: None,
            max_connections_per_host: 32,
            max_idle_per_host: 8,
            idle_timeout_secs: 90,
            max_response_bytes: 64 * 1024,
        }
    }
}

/// Client certificate and key used to authenticate to the upstream.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TlsIdentityConfig {
    /// Path to certificate file (PEM).
    pub cert_path: String,

    /// Path to private key file (PEM, PKCS#8 or RSA).
    pub key_path: String,
}

/// Circuit breaker configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BreakerConfig {
    /// Consecutive failures before the circuit opens.
    pub trip_threshold: u32,

    /// Time the circuit stays open before admitting a probe, in milliseconds.
    pub cool_down_ms: u64,

    /// Number of recent outcomes kept for reporting.
    pub window_size: usize,

    /// Whether a caller-side deadline expiry counts as a breaker failure.
    pub count_caller_timeouts: bool,
}

impl BreakerConfig {
    pub fn cool_down(&self) -> Duration {
        Duration::from_millis(self.cool_down_ms)
    }
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            trip_threshold: 3,
            cool_down_ms: 5_000,
            window_size: 10,
            count_caller_timeouts: false,
        }
    }
}

/// Retry configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum total attempts, including the first one.
    pub max_attempts: u32,

    /// Constant delay between attempts in milliseconds.
    pub backoff_ms: u64,
}

impl RetryConfig {
    pub fn backoff(&self) -> Duration {
        Duration::from_millis(self.backoff_ms)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_ms: 1_000,
        }
    }
}

/// Timeout configuration for outbound calls.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Ceiling for a single attempt in milliseconds.
    pub attempt_ms: u64,

    /// Budget used when the caller supplies no deadline, in milliseconds.
    pub default_budget_ms: u64,

    /// TCP + TLS connection establishment timeout in milliseconds.
    pub connect_ms: u64,
}

impl TimeoutConfig {
    pub fn attempt(&self) -> Duration {
        Duration::from_millis(self.attempt_ms)
    }

    pub fn default_budget(&self) -> Duration {
        Duration::from_millis(self.default_budget_ms)
    }

    pub fn connect(&self) -> Duration {
        Duration::from_millis(self.connect_ms)
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            attempt_ms: 3_000,
            default_budget_ms: 10_000,
            connect_ms: 1_000,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
