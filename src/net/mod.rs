//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Process start
//!     → tls.rs (load CA bundle + optional client identity; fatal on error)
//!     → transport.rs (pinned HTTPS client, per-host connection slots)
//!
//! Per attempt:
//!     → TrustedTransport::open (wait for a slot)
//!     → ConnectionHandle::execute (POST, read full body)
//!     → RawResponse | TransportError
//! ```
//!
//! # Design Decisions
//! - Only the operator CA bundle is trusted
//! - Transport never classifies or retries; that is the executor's job

pub mod tls;
pub mod transport;

pub use transport::{
    ConnectionHandle, OutboundRequest, RawResponse, Transport, TransportError, TrustedTransport,
};
