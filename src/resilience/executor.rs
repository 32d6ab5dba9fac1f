//! Call executor: one trusted call, end to end.
//!
//! # Data Flow
//! ```text
//! perform_trusted_call(ctx, url, body)
//!     → DeadlineBudget fixed once from ctx
//!     loop:
//!         → budget expired?            yes → CallerDeadlineExceeded
//!         → breaker.try_acquire()      no  → BreakerOpen (zero I/O)
//!         → transport.send() under min(budget, attempt ceiling)
//!         → classifier                 → breaker verdict, observer event
//!         → success                    → decoded payload
//!         → RetryPolicy::decide        → sleep backoff (deadline-bounded) | terminal error
//!         → breaker now Open?          yes → BreakerOpen (no backoff)
//! ```
//!
//! # Design Decisions
//! - Strictly sequential: at most one attempt in flight per call
//! - Every terminal failure keeps its classification
//! - Dropping the returned future aborts in-flight I/O and frees a held probe

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, CONTENT_TYPE};
use serde::de::DeserializeOwned;
use tokio::time::{timeout_at, Instant};
use url::Url;

use crate::config::GatewayConfig;
use crate::context::CallContext;
use crate::error::{GatewayError, GatewayResult};
use crate::net::{OutboundRequest, Transport};
use crate::observability::metrics;
use crate::observability::trace_context::TRACEPARENT;
use crate::observability::{GatewayObserver, TraceContext};
use crate::resilience::circuit_breaker::{BreakerPermit, CircuitBreaker, CircuitState};
use crate::resilience::classifier::{self, ClassifiedFailure};
use crate::resilience::retries::{RetryDecision, RetryPolicy, StopReason};
use crate::resilience::timeouts::{DeadlineBudget, DEADLINE_HINT_HEADER};

const X_REQUEST_ID: &str = "x-request-id";

/// Tunables of a `CallExecutor`.
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    pub retry: RetryPolicy,
    /// Ceiling for a single attempt.
    pub attempt_timeout: Duration,
    /// Budget used when the caller has no deadline.
    pub default_budget: Duration,
}

impl ExecutorConfig {
    pub fn from_config(config: &GatewayConfig) -> Self {
        Self {
            retry: RetryPolicy::from_config(&config.retries),
            attempt_timeout: config.timeouts.attempt(),
            default_budget: config.timeouts.default_budget(),
        }
    }
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self::from_config(&GatewayConfig::default())
    }
}

/// One recorded attempt. Lives only for the duration of the call.
#[derive(Debug, Clone)]
pub struct Attempt {
    pub number: u32,
    pub started: Instant,
    pub elapsed: Duration,
    pub outcome: &'static str,
}

/// Orchestrates breaker, transport, classifier and retry policy.
pub struct CallExecutor<T> {
    transport: Arc<T>,
    breaker: Arc<CircuitBreaker>,
    config: ExecutorConfig,
    observer: Arc<dyn GatewayObserver>,
}

impl<T: Transport> CallExecutor<T> {
    pub fn new(
        transport: Arc<T>,
        breaker: Arc<CircuitBreaker>,
        config: ExecutorConfig,
        observer: Arc<dyn GatewayObserver>,
    ) -> Self {
        Self {
            transport,
            breaker,
            config,
            observer,
        }
    }

    pub fn breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// POST `body` (JSON) to `url` and decode a 2xx response into `R`.
    pub async fn perform_trusted_call<R>(
        &self,
        ctx: &CallContext,
        url: &Url,
        body: Vec<u8>,
    ) -> GatewayResult<R>
    where
        R: DeserializeOwned,
    {
        let budget = DeadlineBudget::from_caller(ctx.deadline(), self.config.default_budget);
        let trace = ctx
            .trace()
            .map(TraceContext::child)
            .unwrap_or_else(TraceContext::new_root);
        let dependency = self.breaker.dependency();
        let mut history: Vec<Attempt> =
            Vec::with_capacity(self.config.retry.max_attempts() as usize);

        let result = loop {
            let number = history.len() as u32 + 1;

            if budget.is_expired() {
                break Err(self.deadline_exceeded(&history, &budget));
            }

            let Some(permit) = self.breaker.try_acquire() else {
                self.observer.on_failure(dependency, number, &ClassifiedFailure::BreakerOpen);
                break Err(GatewayError::BreakerOpen {
                    dependency: dependency.to_string(),
                });
            };
            if permit.is_probe() {
                tracing::info!(dependency, attempt = number, "Half-open trial attempt");
            }

            let request = self.build_request(ctx, url, &body, &budget, &trace);
            let started = Instant::now();
            let outcome = self.attempt::<R>(request, &budget).await;
            let elapsed = started.elapsed();

            let failure = match outcome {
                Ok(decoded) => {
                    permit.success();
                    metrics::record_attempt(dependency, "success");
                    history.push(Attempt {
                        number,
                        started,
                        elapsed,
                        outcome: "success",
                    });
                    break Ok(decoded);
                }
                Err(failure) => failure,
            };

            self.report(permit, &failure);
            self.observer.on_failure(dependency, number, &failure);
            history.push(Attempt {
                number,
                started,
                elapsed,
                outcome: failure.label(),
            });

            if failure == ClassifiedFailure::CallerTimeout {
                break Err(self.deadline_exceeded(&history, &budget));
            }

            match self.config.retry.decide(&failure, number, budget.remaining()) {
                RetryDecision::RetryAfter(_) if self.breaker.state() == CircuitState::Open => {
                    // The next attempt would be rejected; keep the budget.
                    break Err(GatewayError::BreakerOpen {
                        dependency: dependency.to_string(),
                    });
                }
                RetryDecision::RetryAfter(backoff) => {
                    tracing::info!(
                        request_id = %ctx.request_id(),
                        dependency,
                        attempt = number,
                        delay = ?backoff,
                        kind = failure.label(),
                        "Retrying upstream call"
                    );
                    if timeout_at(budget.deadline(), tokio::time::sleep(backoff)).await.is_err() {
                        break Err(self.deadline_exceeded(&history, &budget));
                    }
                }
                RetryDecision::Stop(StopReason::AttemptsExhausted) => {
                    break Err(GatewayError::RemoteUnavailable {
                        dependency: dependency.to_string(),
                        attempts: number,
                        last: failure,
                    });
                }
                RetryDecision::Stop(StopReason::BudgetExhausted) => {
                    break Err(self.deadline_exceeded(&history, &budget));
                }
                RetryDecision::Stop(StopReason::NotRetryable) => {
                    break Err(self.terminal(failure, number, &history, &budget));
                }
            }
        };

        let outcome = match &result {
            Ok(_) => "success",
            Err(e) => e.kind(),
        };
        metrics::record_call(dependency, outcome, budget.elapsed());
        tracing::debug!(
            request_id = %ctx.request_id(),
            trace_id = %trace.trace_id(),
            dependency,
            outcome,
            attempts = ?history,
            "Trusted call finished"
        );

        result
    }

    /// Run one attempt under `min(budget, attempt ceiling)`.
    async fn attempt<R>(
        &self,
        request: OutboundRequest,
        budget: &DeadlineBudget,
    ) -> Result<R, ClassifiedFailure>
    where
        R: DeserializeOwned,
    {
        let started = Instant::now();
        let attempt_deadline = budget.attempt_deadline(self.config.attempt_timeout);

        let response = match timeout_at(attempt_deadline, self.transport.send(request)).await {
            Ok(Ok(response)) => response,
            Ok(Err(err)) => return Err(classifier::classify_transport(&err)),
            Err(_) => {
                let budget_exhausted = attempt_deadline >= budget.deadline();
                return Err(classifier::classify_elapsed(budget_exhausted, started.elapsed()));
            }
        };

        classifier::classify_status(response.status, &response.body)?;
        serde_json::from_slice(&response.body)
            .map_err(|e| ClassifiedFailure::undecodable(response.status, &e))
    }

    /// Tell the breaker what the failure says about the dependency.
    fn report(&self, permit: BreakerPermit<'_>, failure: &ClassifiedFailure) {
        let count_caller_timeouts = self.breaker.config().count_caller_timeouts;
        if failure.counts_against_breaker(count_caller_timeouts) {
            permit.failure();
        } else if matches!(failure, ClassifiedFailure::FatalResponse { .. }) {
            // The remote answered deliberately.
            permit.success();
        } else {
            permit.ignore();
        }
    }

    fn build_request(
        &self,
        ctx: &CallContext,
        url: &Url,
        body: &[u8],
        budget: &DeadlineBudget,
        trace: &TraceContext,
    ) -> OutboundRequest {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        if let Ok(value) = HeaderValue::from_str(ctx.request_id()) {
            headers.insert(HeaderName::from_static(X_REQUEST_ID), value);
        }
        if let Ok(value) = HeaderValue::from_str(&trace.to_header()) {
            headers.insert(HeaderName::from_static(TRACEPARENT), value);
        }
        if let Some(millis) = budget.hint_millis() {
            headers.insert(
                HeaderName::from_static(DEADLINE_HINT_HEADER),
                HeaderValue::from(millis as u64),
            );
        }

        OutboundRequest {
            url: url.clone(),
            headers,
            body: body.to_vec(),
        }
    }

    fn deadline_exceeded(&self, history: &[Attempt], budget: &DeadlineBudget) -> GatewayError {
        GatewayError::CallerDeadlineExceeded {
            dependency: self.breaker.dependency().to_string(),
            attempts: history.len() as u32,
            elapsed: budget.elapsed(),
        }
    }

    fn terminal(
        &self,
        failure: ClassifiedFailure,
        attempts: u32,
        history: &[Attempt],
        budget: &DeadlineBudget,
    ) -> GatewayError {
        let dependency = self.breaker.dependency().to_string();
        match failure {
            ClassifiedFailure::FatalResponse { status, reason } => GatewayError::FatalResponse {
                dependency,
                status,
                reason,
            },
            ClassifiedFailure::CallerTimeout => self.deadline_exceeded(history, budget),
            ClassifiedFailure::BreakerOpen => GatewayError::BreakerOpen { dependency },
            last => GatewayError::RemoteUnavailable {
                dependency,
                attempts,
                last,
            },
        }
    }
}
