//! Trust gateway library.
//!
//! A resilient call gateway for verifying caller credentials against a
//! separate identity service: pinned-CA TLS transport, deadline budgets,
//! failure classification, a shared per-dependency circuit breaker and a
//! bounded constant-backoff retry policy.

pub mod config;
pub mod context;
pub mod error;
pub mod http;
pub mod net;
pub mod observability;
pub mod resilience;
pub mod verify;

pub use config::GatewayConfig;
pub use context::CallContext;
pub use error::{GatewayError, GatewayResult};
pub use http::GatewayServer;
pub use net::TrustedTransport;
pub use resilience::{BreakerRegistry, CallExecutor, CircuitBreaker};
pub use verify::{CredentialVerifier, VerifiedIdentity};
