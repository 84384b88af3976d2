//! Leave-policy gateway (v1)
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ──────────────▶  http server  ──▶  handlers  ──▶  WarehouseClient
//!                                                          │
//!                                          ┌───────────────┴───────────────┐
//!                                          ▼                               ▼
//!                                   CircuitBreaker                   mock dataset
//!                                   (closed/open/half-open)          (fallback)
//!                                          │
//!                                          ▼
//!                                   warehouse SQL API
//! ```
//!
//! Startup order: config → logging → metrics → registry and client →
//! listener → serve until signalled → close the warehouse session.

use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

use leave_gateway::config::load_from_env;
use leave_gateway::lifecycle::{build_state, wait_for_signal, Shutdown};
use leave_gateway::observability::{logging, metrics};
use leave_gateway::HttpServer;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let (config, ignored) = load_from_env()?;

    logging::init_logging(&config.observability);
    tracing::info!("leave-gateway v{} starting", env!("CARGO_PKG_VERSION"));
    for skipped in &ignored {
        tracing::warn!(key = skipped.key, value = %skipped.value, "Ignoring unrecognised environment override");
    }
    tracing::info!(
        bind_address = %config.listener.bind_address,
        request_timeout_secs = config.listener.request_timeout_secs,
        "Configuration loaded"
    );

    let shutdown = Arc::new(Shutdown::new());

    let metrics_handle = if config.observability.metrics_enabled {
        match metrics::init_metrics() {
            Ok(handle) => {
                let upkeep = handle.clone();
                let mut stop = shutdown.subscribe();
                tokio::spawn(async move {
                    let mut interval = tokio::time::interval(Duration::from_secs(5));
                    loop {
                        tokio::select! {
                            _ = interval.tick() => upkeep.run_upkeep(),
                            _ = stop.recv() => break,
                        }
                    }
                });
                Some(handle)
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install metrics recorder");
                None
            }
        }
    } else {
        None
    };

    let state = build_state(&config, metrics_handle);
    let client = state.client.clone();

    let listener = match TcpListener::bind(&config.listener.bind_address).await {
        Ok(listener) => listener,
        Err(e) => {
            client.close().await;
            return Err(e.into());
        }
    };
    if let Ok(addr) = listener.local_addr() {
        tracing::info!(address = %addr, "Listening for connections");
    }

    let server = HttpServer::new(state, &config.listener);
    let server_shutdown = shutdown.subscribe();

    let signal_shutdown = shutdown.clone();
    tokio::spawn(async move {
        wait_for_signal().await;
        signal_shutdown.trigger();
    });

    let served = server.run(listener, server_shutdown).await;

    shutdown.trigger();
    client.close().await;

    served?;
    tracing::info!("Shutdown complete");
    Ok(())
}
