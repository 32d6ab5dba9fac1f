//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_attempts_total` (counter): attempts by dependency, outcome
//! - `gateway_breaker_transitions_total` (counter): transitions by dependency, target state
//! - `gateway_breaker_rejections_total` (counter): calls refused by an open breaker
//! - `gateway_call_duration_seconds` (histogram): whole-call latency by outcome
//! - `gateway_breaker_state` (gauge): 0=closed, 1=open, 2=half_open

use std::net::SocketAddr;
use std::time::Duration;

use metrics_exporter_prometheus::PrometheusBuilder;

use crate::resilience::circuit_breaker::CircuitState;

/// Start the Prometheus scrape endpoint. Must run inside a tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => {
            tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter")
        }
    }
}

pub fn record_attempt(dependency: &str, outcome: &'static str) {
    metrics::counter!(
        "gateway_attempts_total",
        "dependency" => dependency.to_string(),
        "outcome" => outcome
    )
    .increment(1);
}

pub fn record_breaker_transition(dependency: &str, to: CircuitState) {
    metrics::counter!(
        "gateway_breaker_transitions_total",
        "dependency" => dependency.to_string(),
        "to" => to.as_str()
    )
    .increment(1);
    metrics::gauge!("gateway_breaker_state", "dependency" => dependency.to_string())
        .set(f64::from(to as u8));
}

pub fn record_breaker_rejection(dependency: &str) {
    metrics::counter!(
        "gateway_breaker_rejections_total",
        "dependency" => dependency.to_string()
    )
    .increment(1);
}

pub fn record_call(dependency: &str, outcome: &'static str, elapsed: Duration) {
    metrics::histogram!(
        "gateway_call_duration_seconds",
        "dependency" => dependency.to_string(),
        "outcome" => outcome
    )
    .record(elapsed.as_secs_f64());
}
