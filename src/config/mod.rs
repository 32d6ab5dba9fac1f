//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize, apply GATEWAY_* overrides)
//!     → validation.rs (semantic checks)
//!     → GatewayConfig (validated, immutable)
//!     → handed to the transport, breaker registry and executor at construction
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require a restart
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, load_from_env, ConfigError};
pub use schema::BreakerConfig;
pub use schema::GatewayConfig;
pub use schema::ObservabilityConfig;
pub use schema::RetryConfig;
pub use schema::ServiceConfig;
pub use schema::TimeoutConfig;
pub use schema::TlsIdentityConfig;
pub use schema::UpstreamConfig;
