//! Retry logic.
//!
//! # Responsibilities
//! - Decide whether a classified failure is retried
//! - Enforce the total attempt ceiling
//! - Refuse to sleep past the caller's deadline
//!
//! # Design Decisions
//! - Constant backoff: worst-case latency is
//!   `max_attempts * attempt_timeout + (max_attempts - 1) * backoff`
//! - Only connect failures, attempt timeouts and 503/504 are retried
//! - The ceiling applies regardless of how much budget is left

use std::time::Duration;

use crate::config::RetryConfig;
use crate::resilience::classifier::ClassifiedFailure;

/// Why the loop stops.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    NotRetryable,
    AttemptsExhausted,
    /// Sleeping the backoff would reach the caller's deadline.
    BudgetExhausted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    RetryAfter(Duration),
    Stop(StopReason),
}

/// Bounded, constant-backoff retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    backoff: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(config.max_attempts, config.backoff())
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay before 1-based attempt `attempt`. The first attempt never waits.
    pub fn backoff_before(&self, attempt: u32) -> Duration {
        if attempt <= 1 {
            Duration::ZERO
        } else {
            self.backoff
        }
    }

    pub fn should_retry(
        &self,
        failure: &ClassifiedFailure,
        attempt: u32,
        remaining: Duration,
    ) -> bool {
        matches!(self.decide(failure, attempt, remaining), RetryDecision::RetryAfter(_))
    }

    /// Decide after attempt `attempt` failed with `failure`.
    pub fn decide(
        &self,
        failure: &ClassifiedFailure,
        attempt: u32,
        remaining: Duration,
    ) -> RetryDecision {
        if !failure.is_retryable() {
            return RetryDecision::Stop(StopReason::NotRetryable);
        }
        if attempt >= self.max_attempts {
            return RetryDecision::Stop(StopReason::AttemptsExhausted);
        }
        let backoff = self.backoff_before(attempt + 1);
        if remaining <= backoff {
            return RetryDecision::Stop(StopReason::BudgetExhausted);
        }
        RetryDecision::RetryAfter(backoff)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unavailable() -> ClassifiedFailure {
        ClassifiedFailure::RemoteUnavailable { status: 503 }
    }

    #[test]
    fn test_constant_backoff() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff_before(1), Duration::ZERO);
        assert_eq!(policy.backoff_before(2), Duration::from_secs(1));
        assert_eq!(policy.backoff_before(3), Duration::from_secs(1));
    }

    #[test]
    fn test_retries_until_ceiling() {
        let policy = RetryPolicy::default();
        let plenty = Duration::from_secs(30);

        assert_eq!(
            policy.decide(&unavailable(), 1, plenty),
            RetryDecision::RetryAfter(Duration::from_secs(1))
        );
        assert_eq!(
            policy.decide(&unavailable(), 2, plenty),
            RetryDecision::RetryAfter(Duration::from_secs(1))
        );
        assert_eq!(
            policy.decide(&unavailable(), 3, plenty),
            RetryDecision::Stop(StopReason::AttemptsExhausted)
        );
    }

    #[test]
    fn test_fatal_never_retried() {
        let policy = RetryPolicy::default();
        let fatal = ClassifiedFailure::FatalResponse {
            status: 401,
            reason: "bad token".into(),
        };
        assert!(!policy.should_retry(&fatal, 1, Duration::from_secs(30)));
        let caller = ClassifiedFailure::CallerTimeout;
        assert!(!policy.should_retry(&caller, 1, Duration::from_secs(30)));
        assert!(!policy.should_retry(&ClassifiedFailure::BreakerOpen, 1, Duration::from_secs(30)));
    }

    #[test]
    fn test_stops_when_backoff_would_outlive_budget() {
        let policy = RetryPolicy::new(3, Duration::from_millis(1_000));
        assert_eq!(
            policy.decide(&unavailable(), 1, Duration::from_millis(100)),
            RetryDecision::Stop(StopReason::BudgetExhausted)
        );
        assert_eq!(
            policy.decide(&unavailable(), 1, Duration::from_millis(1_000)),
            RetryDecision::Stop(StopReason::BudgetExhausted)
        );
        assert!(policy.should_retry(&unavailable(), 1, Duration::from_millis(1_001)));
    }

    #[test]
    fn test_single_attempt_policy() {
        let policy = RetryPolicy::new(0, Duration::from_millis(10));
        assert_eq!(policy.max_attempts(), 1);
        let connect = ClassifiedFailure::ConnectFailure {
            reason: "refused".into(),
        };
        assert_eq!(
            policy.decide(&connect, 1, Duration::from_secs(5)),
            RetryDecision::Stop(StopReason::AttemptsExhausted)
        );
    }
}
