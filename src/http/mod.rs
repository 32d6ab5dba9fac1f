//! HTTP surface of the owning service.
//!
//! # Data Flow
//! ```text
//! Inbound request
//!     → server.rs (request id, trace, timeout layers)
//!     → auth.rs (bearer credential → CredentialVerifier)
//!     → handler (identity from request extensions)
//!     → response.rs (GatewayError → status, Retry-After)
//! ```

pub mod auth;
pub mod response;
pub mod server;

pub use auth::require_credential;
pub use response::GatewayRejection;
pub use server::{build_router, AppState, GatewayServer};
