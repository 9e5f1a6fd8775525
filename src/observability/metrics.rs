//! Metrics collection and exposition.
//!
//! # Metrics
//! - `circuit_breaker_state` (gauge): 0=closed, 1=half-open, 2=open
//! - `circuit_breaker_transitions_total` (counter): by circuit, from, to
//! - `circuit_breaker_rejections_total` (counter): fast-failed calls
//! - `upstream_requests_total` (counter): by service, method, outcome
//! - `upstream_request_duration_seconds` (histogram): by service
//! - `retry_attempts_total` (counter): by reason
//!
//! Without an installed recorder every call here is a no-op.

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::time::Instant;

use crate::resilience::circuit_breaker::CircuitState;

/// Install the Prometheus recorder and its scrape endpoint.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

fn state_value(state: CircuitState) -> f64 {
    match state {
        CircuitState::Closed => 0.0,
        CircuitState::HalfOpen => 1.0,
        CircuitState::Open => 2.0,
    }
}

pub fn record_circuit_state(circuit: &str, state: CircuitState) {
    gauge!("circuit_breaker_state", "circuit" => circuit.to_string()).set(state_value(state));
}

pub fn record_circuit_transition(circuit: &str, from: CircuitState, to: CircuitState) {
    counter!(
        "circuit_breaker_transitions_total",
        "circuit" => circuit.to_string(),
        "from" => from.as_str(),
        "to" => to.as_str()
    )
    .increment(1);
    record_circuit_state(circuit, to);
}

pub fn record_circuit_rejection(circuit: &str) {
    counter!("circuit_breaker_rejections_total", "circuit" => circuit.to_string()).increment(1);
}

/// Record one upstream call. `outcome` is a status code or an error label.
pub fn record_upstream_request(service: &str, method: &str, outcome: &str, start: Instant) {
    counter!(
        "upstream_requests_total",
        "service" => service.to_string(),
        "method" => method.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);
    histogram!("upstream_request_duration_seconds", "service" => service.to_string())
        .record(start.elapsed().as_secs_f64());
}

pub fn record_retry(reason: &'static str) {
    counter!("retry_attempts_total", "reason" => reason).increment(1);
}
