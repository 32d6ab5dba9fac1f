//! Caller execution context.
//!
//! The owning service creates one `CallContext` per inbound request and hands
//! it to the gateway. The gateway never extends the deadline it carries.

use std::time::Duration;

use tokio::time::Instant;

use crate::observability::TraceContext;

/// Deadline, correlation id and trace parent of the caller.
#[derive(Debug, Clone)]
pub struct CallContext {
    deadline: Option<Instant>,
    request_id: String,
    trace: Option<TraceContext>,
}

impl CallContext {
    /// A context without a deadline. The gateway applies its default ceiling.
    pub fn new() -> Self {
        Self {
            deadline: None,
            request_id: uuid::Uuid::new_v4().to_string(),
            trace: None,
        }
    }

    /// A context that must finish by `deadline`.
    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            deadline: Some(deadline),
            ..Self::new()
        }
    }

    /// A context that must finish within `timeout` from now.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::with_deadline(Instant::now() + timeout)
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = request_id.into();
        self
    }

    pub fn with_trace_parent(mut self, trace: TraceContext) -> Self {
        self.trace = Some(trace);
        self
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    pub fn trace(&self) -> Option<&TraceContext> {
        self.trace.as_ref()
    }
}

impl Default for CallContext {
    fn default() -> Self {
        Self::new()
    }
}
