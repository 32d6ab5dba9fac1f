//! Deadline budget.
//!
//! # Responsibilities
//! - Fix the call's deadline once, at entry, from the caller's deadline
//! - Fall back to a finite default ceiling when the caller has none
//! - Derive per-attempt deadlines and the hint sent to the upstream
//!
//! # Design Decisions
//! - The deadline is an `Instant`, never a stored remaining duration, so it
//!   only shrinks as time passes and earlier attempts cannot extend it
//! - Uses Tokio's clock so paused-time tests drive it

use std::time::Duration;

use tokio::time::Instant;

/// Header carrying the caller's remaining patience in whole milliseconds.
pub const DEADLINE_HINT_HEADER: &str = "x-deadline-remaining-ms";

/// The time budget of one top-level call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeadlineBudget {
    deadline: Instant,
    started: Instant,
    caller_bounded: bool,
}

impl DeadlineBudget {
    /// Compute the budget at call entry.
    pub fn from_caller(caller_deadline: Option<Instant>, default_ceiling: Duration) -> Self {
        let now = Instant::now();
        match caller_deadline {
            Some(deadline) => Self {
                deadline,
                started: now,
                caller_bounded: true,
            },
            None => Self {
                deadline: now + default_ceiling,
                started: now,
                caller_bounded: false,
            },
        }
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    /// Zero once the deadline has passed.
    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    pub fn is_expired(&self) -> bool {
        self.remaining().is_zero()
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Deadline for one attempt: the earlier of the budget and the attempt ceiling.
    pub fn attempt_deadline(&self, attempt_timeout: Duration) -> Instant {
        self.deadline.min(Instant::now() + attempt_timeout)
    }

    /// Value for `DEADLINE_HINT_HEADER`, only when the caller set a deadline.
    pub fn hint_millis(&self) -> Option<u128> {
        self.caller_bounded.then(|| self.remaining().as_millis())
    }
}
