//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Trusted call:
//!     → timeouts.rs (fix the deadline budget once)
//!     → circuit_breaker.rs (admit, reject, or hand out the single probe)
//!     → transport attempt under min(budget, attempt ceiling)
//!     → classifier.rs (one tag per failed attempt)
//!     → retries.rs (retry after backoff, or stop)
//!     → executor.rs ties the above together
//! ```
//!
//! # Design Decisions
//! - Every outbound call has a deadline; none is ever extended
//! - Only transient failures are retried, and never past the deadline
//! - Breakers are shared per dependency through `BreakerRegistry`

pub mod circuit_breaker;
pub mod classifier;
pub mod executor;
pub mod registry;
pub mod retries;
pub mod timeouts;

pub use circuit_breaker::{BreakerPermit, BreakerSnapshot, CircuitBreaker, CircuitState};
pub use classifier::ClassifiedFailure;
pub use executor::{CallExecutor, ExecutorConfig};
pub use registry::BreakerRegistry;
pub use retries::{RetryDecision, RetryPolicy, StopReason};
pub use timeouts::{DeadlineBudget, DEADLINE_HINT_HEADER};
