//! Startup orchestration.
//!
//! Builds the shared application state from a validated config: registry
//! first, then the warehouse client that registers its breaker in it.
//! Listeners are bound by the caller once this returns.

use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;

use crate::config::GatewayConfig;
use crate::http::AppState;
use crate::resilience::CircuitBreakerRegistry;
use crate::warehouse::WarehouseClient;

pub fn build_state(config: &GatewayConfig, metrics: Option<PrometheusHandle>) -> AppState {
    let registry = Arc::new(CircuitBreakerRegistry::new());
    let client = Arc::new(WarehouseClient::new(
        &config.warehouse,
        config.circuit_breaker,
        &registry,
    ));

    let stats = client.stats();
    tracing::info!(
        mode = %stats.mode,
        failure_threshold = config.circuit_breaker.failure_threshold,
        timeout_secs = config.circuit_breaker.timeout_secs,
        success_threshold = config.circuit_breaker.success_threshold,
        "Warehouse client initialized"
    );

    AppState {
        client,
        registry,
        metrics,
        admin: config.admin.clone(),
    }
}
