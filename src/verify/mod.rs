//! Credential verification.
//!
//! # Data Flow
//! ```text
//! verify_credential(ctx, token)
//!     → POST {"token": ..} to upstream.verify_url
//!     → CallExecutor (breaker, deadline, retries, classification)
//!     → VerifiedIdentity { user_id, role }
//! ```

pub mod client;
pub mod types;

pub use client::CredentialVerifier;
pub use types::VerifiedIdentity;
