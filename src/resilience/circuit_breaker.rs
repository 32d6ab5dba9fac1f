//! Circuit breaker for dependency protection.
//!
//! # States
//! - Closed: normal operation, attempts pass through
//! - Open: dependency assumed down, attempts fail fast with zero I/O
//! - Half-Open: exactly one probe attempt tests recovery
//!
//! # State Transitions
//! ```text
//! Closed → Open: consecutive failures >= trip_threshold
//! Open → Half-Open: on the first allow() after cool_down has elapsed
//! Half-Open → Closed: probe succeeds (counters reset)
//! Half-Open → Open: probe fails (cool-down restarts)
//! ```
//!
//! # Design Decisions
//! - One breaker per dependency, owned by a `BreakerRegistry` (not global)
//! - Open → Half-Open is evaluated lazily; there is no timer task
//! - The probe slot is claimed with a compare-and-set; losers are refused
//!   without waiting
//! - Outcomes reported while Open never close the breaker
//! - Observers are notified after the state lock is released

use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use tokio::time::Instant;

use crate::config::BreakerConfig;
use crate::observability::metrics;
use crate::observability::GatewayObserver;

/// Breaker state.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed = 0,
    Open = 1,
    HalfOpen = 2,
}

impl CircuitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half_open",
        }
    }
}

impl From<u8> for CircuitState {
    fn from(val: u8) -> Self {
        match val {
            1 => CircuitState::Open,
            2 => CircuitState::HalfOpen,
            _ => CircuitState::Closed,
        }
    }
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Point-in-time view of a breaker, for health endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct BreakerSnapshot {
    pub dependency: String,
    pub state: CircuitState,
    pub consecutive_failures: u32,
    /// Failures among the recent outcomes window.
    pub window_failures: usize,
    pub window_len: usize,
}

/// Counters guarded by the breaker lock.
#[derive(Debug)]
struct Counters {
    consecutive_failures: u32,
    opened_at: Option<Instant>,
    /// Recent outcomes, `true` = success.
    window: VecDeque<bool>,
}

impl Counters {
    fn push(&mut self, success: bool, capacity: usize) {
        if self.window.len() >= capacity {
            self.window.pop_front();
        }
        self.window.push_back(success);
    }

    fn reset(&mut self) {
        self.consecutive_failures = 0;
        self.opened_at = None;
        self.window.clear();
    }
}

/// A shared, per-dependency circuit breaker.
pub struct CircuitBreaker {
    dependency: String,
    config: BreakerConfig,
    /// `CircuitState` as u8; written only while holding `counters`.
    state: AtomicU8,
    probe_in_flight: AtomicBool,
    counters: Mutex<Counters>,
    observer: Arc<dyn GatewayObserver>,
}

impl fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("dependency", &self.dependency)
            .field("state", &self.state())
            .field("probe_in_flight", &self.probe_in_flight.load(Ordering::Relaxed))
            .finish()
    }
}

impl CircuitBreaker {
    pub fn new(
        dependency: impl Into<String>,
        config: BreakerConfig,
        observer: Arc<dyn GatewayObserver>,
    ) -> Self {
        let window = VecDeque::with_capacity(config.window_size);
        Self {
            dependency: dependency.into(),
            config,
            state: AtomicU8::new(CircuitState::Closed as u8),
            probe_in_flight: AtomicBool::new(false),
            counters: Mutex::new(Counters {
                consecutive_failures: 0,
                opened_at: None,
                window,
            }),
            observer,
        }
    }

    pub fn dependency(&self) -> &str {
        &self.dependency
    }

    pub fn config(&self) -> &BreakerConfig {
        &self.config
    }

    pub fn state(&self) -> CircuitState {
        CircuitState::from(self.state.load(Ordering::Acquire))
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.lock().consecutive_failures
    }

    pub fn snapshot(&self) -> BreakerSnapshot {
        let counters = self.lock();
        BreakerSnapshot {
            dependency: self.dependency.clone(),
            state: self.state(),
            consecutive_failures: counters.consecutive_failures,
            window_failures: counters.window.iter().filter(|ok| !**ok).count(),
            window_len: counters.window.len(),
        }
    }

    /// Ask whether an attempt may start. Performs no I/O.
    ///
    /// A `true` from Half-Open means the caller holds the probe and must
    /// report through `on_success` or `on_failure`.
    pub fn allow(&self) -> bool {
        self.admit().is_some()
    }

    /// Report a successful permitted attempt.
    pub fn on_success(&self) {
        self.record_success(true);
    }

    /// Report a failed permitted attempt.
    pub fn on_failure(&self) {
        self.record_failure(true);
    }

    /// Like `allow`, but returns a guard that releases an unresolved probe
    /// slot when dropped.
    pub fn try_acquire(&self) -> Option<BreakerPermit<'_>> {
        self.admit().map(|probe| BreakerPermit {
            breaker: self,
            probe,
            resolved: false,
        })
    }

    /// `Some(is_probe)` when admitted.
    fn admit(&self) -> Option<bool> {
        match self.state() {
            CircuitState::Closed => Some(false),
            CircuitState::HalfOpen => self.claim_probe(),
            CircuitState::Open => {
                let transitioned = {
                    let mut counters = self.lock();
                    match self.state() {
                        // Another caller moved it while we waited for the lock.
                        CircuitState::Closed => return Some(false),
                        CircuitState::HalfOpen => false,
                        CircuitState::Open => {
                            let cooled = counters
                                .opened_at
                                .map_or(true, |at| at.elapsed() >= self.config.cool_down());
                            if !cooled {
                                drop(counters);
                                metrics::record_breaker_rejection(&self.dependency);
                                return None;
                            }
                            counters.opened_at = None;
                            self.probe_in_flight.store(false, Ordering::Release);
                            self.state.store(CircuitState::HalfOpen as u8, Ordering::Release);
                            true
                        }
                    }
                };
                if transitioned {
                    self.notify(CircuitState::Open, CircuitState::HalfOpen);
                }
                self.claim_probe()
            }
        }
    }

    /// Claim the probe slot. The state is re-read under the lock so a probe
    /// that resolved after our first look cannot hand out a second one.
    fn claim_probe(&self) -> Option<bool> {
        let admitted = {
            let _counters = self.lock();
            match self.state() {
                CircuitState::Closed => Some(false),
                CircuitState::HalfOpen => self
                    .probe_in_flight
                    .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                    .ok()
                    .map(|_| true),
                CircuitState::Open => None,
            }
        };
        if admitted.is_none() {
            metrics::record_breaker_rejection(&self.dependency);
        }
        admitted
    }

    fn record_success(&self, probe: bool) {
        let transition = {
            let mut counters = self.lock();
            match self.state() {
                CircuitState::Closed => {
                    counters.consecutive_failures = 0;
                    counters.push(true, self.config.window_size);
                    None
                }
                CircuitState::HalfOpen if probe => {
                    counters.reset();
                    self.state.store(CircuitState::Closed as u8, Ordering::Release);
                    self.probe_in_flight.store(false, Ordering::Release);
                    Some((CircuitState::HalfOpen, CircuitState::Closed))
                }
                // Admitted before the trip; says nothing about the probe.
                CircuitState::HalfOpen => {
                    counters.push(true, self.config.window_size);
                    None
                }
                CircuitState::Open => None,
            }
        };
        if let Some((from, to)) = transition {
            self.notify(from, to);
        }
    }

    fn record_failure(&self, probe: bool) {
        let transition = {
            let mut counters = self.lock();
            match self.state() {
                CircuitState::Closed => {
                    counters.consecutive_failures = counters.consecutive_failures.saturating_add(1);
                    counters.push(false, self.config.window_size);
                    if counters.consecutive_failures >= self.config.trip_threshold {
                        counters.opened_at = Some(Instant::now());
                        self.state.store(CircuitState::Open as u8, Ordering::Release);
                        Some((CircuitState::Closed, CircuitState::Open))
                    } else {
                        None
                    }
                }
                CircuitState::HalfOpen if probe => {
                    counters.consecutive_failures = counters.consecutive_failures.saturating_add(1);
                    counters.push(false, self.config.window_size);
                    counters.opened_at = Some(Instant::now());
                    self.state.store(CircuitState::Open as u8, Ordering::Release);
                    self.probe_in_flight.store(false, Ordering::Release);
                    Some((CircuitState::HalfOpen, CircuitState::Open))
                }
                CircuitState::HalfOpen | CircuitState::Open => {
                    counters.push(false, self.config.window_size);
                    None
                }
            }
        };
        if let Some((from, to)) = transition {
            self.notify(from, to);
        }
    }

    /// Give the probe slot back without a verdict.
    fn release_probe(&self) {
        let _counters = self.lock();
        if self.state() == CircuitState::HalfOpen {
            self.probe_in_flight.store(false, Ordering::Release);
        }
    }

    fn notify(&self, from: CircuitState, to: CircuitState) {
        self.observer.on_transition(&self.dependency, from, to);
    }

    fn lock(&self) -> MutexGuard<'_, Counters> {
        self.counters.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Admission to make one attempt.
///
/// Resolve with `success`, `failure` or `ignore`. Dropping an unresolved
/// probe permit frees the probe slot so the breaker cannot wedge in
/// Half-Open when a caller is cancelled.
#[must_use = "an unresolved permit reports nothing to the breaker"]
#[derive(Debug)]
pub struct BreakerPermit<'a> {
    breaker: &'a CircuitBreaker,
    probe: bool,
    resolved: bool,
}

impl BreakerPermit<'_> {
    pub fn is_probe(&self) -> bool {
        self.probe
    }

    pub fn success(mut self) {
        self.resolved = true;
        self.breaker.record_success(self.probe);
    }

    pub fn failure(mut self) {
        self.resolved = true;
        self.breaker.record_failure(self.probe);
    }

    /// The outcome says nothing about the dependency's health.
    pub fn ignore(self) {}
}

impl Drop for BreakerPermit<'_> {
    fn drop(&mut self) {
        if !self.resolved && self.probe {
            self.breaker.release_probe();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observability::events::testing::RecordingObserver;
    use std::time::Duration;

    fn breaker(threshold: u32, cool_down_ms: u64) -> (CircuitBreaker, Arc<RecordingObserver>) {
        let observer = Arc::new(RecordingObserver::default());
        let config = BreakerConfig {
            trip_threshold: threshold,
            cool_down_ms,
            window_size: 4,
            count_caller_timeouts: false,
        };
        (CircuitBreaker::new("identity", config, observer.clone()), observer)
    }

    #[tokio::test(start_paused = true)]
    async fn test_trips_after_threshold() {
        let (cb, observer) = breaker(3, 5_000);

        for _ in 0..2 {
            assert!(cb.allow());
            cb.on_failure();
        }
        assert_eq!(cb.state(), CircuitState::Closed);

        assert!(cb.allow());
        cb.on_failure();
        assert_eq!(cb.state(), CircuitState::Open);
        assert!(!cb.allow());
        assert_eq!(observer.transitions(), vec![(CircuitState::Closed, CircuitState::Open)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_resets_consecutive_count() {
        let (cb, _) = breaker(3, 5_000);
        cb.on_failure();
        cb.on_failure();
        cb.on_success();
        cb.on_failure();
        cb.on_failure();
        assert_eq!(cb.state(), CircuitState::Closed);
        assert_eq!(cb.consecutive_failures(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cool_down_is_lazy_and_admits_one_probe() {
        let (cb, observer) = breaker(1, 5_000);
        cb.on_failure();
        assert_eq!(cb.state(), CircuitState::Open);

        tokio::time::advance(Duration::from_millis(4_999)).await;
        assert!(!cb.allow());
        assert_eq!(cb.state(), CircuitState::Open);

        tokio::time::advance(Duration::from_millis(1)).await;
        // Nothing moves until somebody asks.
        assert_eq!(cb.state(), CircuitState::Open);

        let probe = cb.try_acquire().unwrap();
        assert!(probe.is_probe());
        assert_eq!(cb.state(), CircuitState::HalfOpen);
        assert!(cb.try_acquire().is_none());
        assert!(!cb.allow());

        probe.success();
        assert_eq!(cb.state(), CircuitState::Closed);
        assert_eq!(cb.consecutive_failures(), 0);
        assert_eq!(
            observer.transitions(),
            vec![
                (CircuitState::Closed, CircuitState::Open),
                (CircuitState::Open, CircuitState::HalfOpen),
                (CircuitState::HalfOpen, CircuitState::Closed),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_probe_failure_restarts_cool_down() {
        let (cb, _) = breaker(1, 1_000);
        cb.on_failure();
        tokio::time::advance(Duration::from_millis(1_000)).await;

        cb.try_acquire().unwrap().failure();
        assert_eq!(cb.state(), CircuitState::Open);

        tokio::time::advance(Duration::from_millis(999)).await;
        assert!(!cb.allow());
        tokio::time::advance(Duration::from_millis(1)).await;
        assert!(cb.allow());
        assert_eq!(cb.state(), CircuitState::HalfOpen);
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_half_open_claim_after_reopen_is_rejected() {
        let (cb, _) = breaker(1, 1_000);
        cb.on_failure();
        tokio::time::advance(Duration::from_millis(1_000)).await;

        // A caller saw Half-Open, then the trial call failed before it claimed.
        let trial = cb.try_acquire().unwrap();
        assert_eq!(cb.state(), CircuitState::HalfOpen);
        trial.failure();
        assert_eq!(cb.state(), CircuitState::Open);

        assert_eq!(cb.claim_probe(), None);
        assert!(!cb.allow());
        assert_eq!(cb.state(), CircuitState::Open);
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_half_open_claim_after_recovery_is_a_normal_admission() {
        let (cb, _) = breaker(1, 1_000);
        cb.on_failure();
        tokio::time::advance(Duration::from_millis(1_000)).await;

        cb.try_acquire().unwrap().success();
        assert_eq!(cb.claim_probe(), Some(false));
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_probe_frees_slot() {
        let (cb, _) = breaker(1, 100);
        cb.on_failure();
        tokio::time::advance(Duration::from_millis(100)).await;

        let probe = cb.try_acquire().unwrap();
        drop(probe);
        assert_eq!(cb.state(), CircuitState::HalfOpen);

        let probe = cb.try_acquire().unwrap();
        assert!(probe.is_probe());
        probe.ignore();
        assert!(cb.try_acquire().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_success_while_open_does_not_close() {
        let (cb, _) = breaker(2, 5_000);
        let straggler = cb.try_acquire().unwrap();
        cb.on_failure();
        cb.on_failure();
        assert_eq!(cb.state(), CircuitState::Open);

        straggler.success();
        assert_eq!(cb.state(), CircuitState::Open);
        assert!(!cb.allow());
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_probe_outcome_in_half_open_is_not_a_verdict() {
        let (cb, _) = breaker(1, 100);
        let straggler = cb.try_acquire().unwrap();
        cb.on_failure();
        tokio::time::advance(Duration::from_millis(100)).await;

        let probe = cb.try_acquire().unwrap();
        straggler.success();
        assert_eq!(cb.state(), CircuitState::HalfOpen);

        probe.success();
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_window_is_bounded_and_reset_on_close() {
        let (cb, _) = breaker(10, 100);
        for _ in 0..6 {
            cb.on_failure();
        }
        let snapshot = cb.snapshot();
        assert_eq!(snapshot.window_len, 4);
        assert_eq!(snapshot.window_failures, 4);
        assert_eq!(snapshot.consecutive_failures, 6);

        for _ in 0..4 {
            cb.on_failure();
        }
        tokio::time::advance(Duration::from_millis(100)).await;
        cb.try_acquire().unwrap().success();

        let snapshot = cb.snapshot();
        assert_eq!(snapshot.state, CircuitState::Closed);
        assert_eq!(snapshot.window_len, 0);
        assert_eq!(snapshot.consecutive_failures, 0);
    }
}
