//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Gateway components produce:
//!     → events.rs (breaker transitions, classified failures → GatewayObserver)
//!     → metrics.rs (counters, histograms)
//!     → logging.rs (structured log events)
//!     → trace_context.rs (W3C traceparent propagated to the upstream)
//!
//! Consumers:
//!     → Log aggregation (stdout)
//!     → Metrics endpoint (Prometheus scrape)
//!     → Distributed tracing (via the propagated traceparent)
//! ```
//!
//! # Design Decisions
//! - Observers are called outside the breaker lock and return nothing;
//!   a slow or broken observer cannot fail a call
//! - Request ID flows from the inbound request to the upstream call
//! - Metrics are cheap (atomic increments)

pub mod events;
pub mod logging;
pub mod metrics;
pub mod trace_context;

pub use events::{GatewayObserver, TracingObserver};
pub use trace_context::TraceContext;
