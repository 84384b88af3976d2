//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_circuit_state` (gauge): 0=closed, 1=open, 2=half_open, per breaker
//! - `gateway_circuit_transitions_total` (counter): state changes by target state
//! - `gateway_circuit_rejections_total` (counter): calls refused while open
//! - `gateway_warehouse_fallbacks_total` (counter): mock answers served by operation/reason
//! - `gateway_warehouse_health` (gauge): 1=healthy, 0=unhealthy
//! - `gateway_http_requests_total` (counter): by path and status
//! - `gateway_http_request_duration_seconds` (histogram): by path
//!
//! Recording goes through the `metrics` facade and is a no-op until a
//! recorder is installed, so library code and tests never need setup.

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use std::time::Instant;

use crate::resilience::circuit_breaker::CircuitState;

/// Install the global Prometheus recorder and return a handle for rendering.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    let handle = PrometheusBuilder::new()
        .set_buckets_for_metric(
            metrics_exporter_prometheus::Matcher::Full(
                "gateway_http_request_duration_seconds".to_string(),
            ),
            &[0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0],
        )?
        .install_recorder()?;
    tracing::info!("Prometheus metrics recorder installed");
    Ok(handle)
}

pub fn record_circuit_state(breaker: &str, state: CircuitState) {
    gauge!("gateway_circuit_state", "breaker" => breaker.to_string()).set(state.as_metric_value());
}

pub fn record_circuit_transition(breaker: &str, to: CircuitState) {
    counter!(
        "gateway_circuit_transitions_total",
        "breaker" => breaker.to_string(),
        "to" => to.as_str()
    )
    .increment(1);
    record_circuit_state(breaker, to);
}

pub fn record_circuit_rejection(breaker: &str) {
    counter!("gateway_circuit_rejections_total", "breaker" => breaker.to_string()).increment(1);
}

pub fn record_fallback(operation: &'static str, reason: &'static str) {
    counter!(
        "gateway_warehouse_fallbacks_total",
        "operation" => operation,
        "reason" => reason
    )
    .increment(1);
}

pub fn record_warehouse_health(mode: &'static str, healthy: bool) {
    gauge!("gateway_warehouse_health", "mode" => mode).set(if healthy { 1.0 } else { 0.0 });
}

pub fn record_request(path: &str, status: u16, start: Instant) {
    let path = path.to_string();
    counter!(
        "gateway_http_requests_total",
        "path" => path.clone(),
        "status" => status.to_string()
    )
    .increment(1);
    histogram!("gateway_http_request_duration_seconds", "path" => path)
        .record(start.elapsed().as_secs_f64());
}
