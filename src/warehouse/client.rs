//! Resilient warehouse client.
//!
//! Real calls run through the `warehouse_client` circuit breaker. When the
//! breaker is open or the backend fails, the client answers from the static
//! mock table instead, so callers always get data.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::config::{resolve_mode, MockReason, ModeDecision, WarehouseSettings};
use crate::observability::metrics;
use crate::resilience::{
    CircuitBreaker, CircuitBreakerConfig, CircuitBreakerError, CircuitBreakerRegistry,
    CircuitBreakerStats,
};
use crate::warehouse::backend::{SqlApiConnector, WarehouseConnection, WarehouseConnector};
use crate::warehouse::error::{WarehouseError, WarehouseResult};
use crate::warehouse::mock;
use crate::warehouse::types::{EmployeeFilter, EmployeeRecord};

/// Name the client's breaker is registered under.
pub const BREAKER_NAME: &str = "warehouse_client";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WarehouseMode {
    Mock,
    Real,
}

impl WarehouseMode {
    pub fn as_str(self) -> &'static str {
        match self {
            WarehouseMode::Mock => "mock",
            WarehouseMode::Real => "real",
        }
    }
}

impl fmt::Display for WarehouseMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot reported on `/stats` and `/health`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WarehouseClientStats {
    pub mode: WarehouseMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mock_reason: Option<String>,
    pub circuit_breaker: CircuitBreakerStats,
    pub connection_active: bool,
    pub fallbacks: u64,
}

/// Warehouse client with circuit breaking and mock fallback.
#[derive(Debug)]
pub struct WarehouseClient {
    breaker: Arc<CircuitBreaker>,
    connector: Option<Arc<dyn WarehouseConnector>>,
    mock_reason: Option<MockReason>,
    connection: Mutex<Option<Arc<dyn WarehouseConnection>>>,
    connection_active: AtomicBool,
    fallbacks: AtomicU64,
}

impl WarehouseClient {
    /// Build a client from settings, registering its breaker in `registry`.
    ///
    /// Never fails: anything that prevents real mode downgrades to mock
    /// mode with a warning.
    pub fn new(
        settings: &WarehouseSettings,
        breaker_config: CircuitBreakerConfig,
        registry: &CircuitBreakerRegistry,
    ) -> Self {
        let breaker = registry.get_or_create(BREAKER_NAME, breaker_config);

        match resolve_mode(settings) {
            ModeDecision::Real(params) => {
                let endpoint = params.endpoint.clone();
                match SqlApiConnector::new(params) {
                    Ok(connector) => {
                        tracing::info!(endpoint = %endpoint, "Warehouse client using real backend");
                        Self::real(Arc::new(connector), breaker)
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Warehouse connector unavailable, using mock data");
                        Self::mock(MockReason::NoConnector, breaker)
                    }
                }
            }
            ModeDecision::Mock(reason) => {
                match &reason {
                    MockReason::Requested => {
                        tracing::info!("Warehouse client using mock data");
                    }
                    other => {
                        tracing::warn!(reason = %other, "Warehouse settings incomplete, using mock data");
                    }
                }
                Self::mock(reason, breaker)
            }
        }
    }

    /// Client serving only the static table.
    pub fn mock(reason: MockReason, breaker: Arc<CircuitBreaker>) -> Self {
        Self::build(None, Some(reason), breaker)
    }

    /// Client backed by `connector`, guarded by `breaker`.
    pub fn real(connector: Arc<dyn WarehouseConnector>, breaker: Arc<CircuitBreaker>) -> Self {
        Self::build(Some(connector), None, breaker)
    }

    fn build(
        connector: Option<Arc<dyn WarehouseConnector>>,
        mock_reason: Option<MockReason>,
        breaker: Arc<CircuitBreaker>,
    ) -> Self {
        Self {
            breaker,
            connector,
            mock_reason,
            connection: Mutex::new(None),
            connection_active: AtomicBool::new(false),
            fallbacks: AtomicU64::new(0),
        }
    }

    pub fn mode(&self) -> WarehouseMode {
        if self.connector.is_some() {
            WarehouseMode::Real
        } else {
            WarehouseMode::Mock
        }
    }

    pub fn breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }

    /// Fetch one employee. `None` only when the id is unknown.
    pub async fn fetch_by_key(&self, employee_id: &str) -> Option<EmployeeRecord> {
        let Some(connector) = self.connector.as_ref() else {
            return mock::find(employee_id);
        };

        let result = self
            .breaker
            .call(|| {
                self.with_session(connector, |conn| async move {
                    conn.fetch_employee(employee_id).await
                })
            })
            .await;

        match result {
            Ok(record) => record,
            Err(e) => {
                self.fall_back("fetch_by_key", &e);
                mock::find(employee_id)
            }
        }
    }

    /// List employees matching `filter`.
    pub async fn query_by_filter(&self, filter: &EmployeeFilter) -> Vec<EmployeeRecord> {
        let Some(connector) = self.connector.as_ref() else {
            return mock::query(filter);
        };

        let result = self
            .breaker
            .call(|| {
                self.with_session(connector, |conn| async move {
                    conn.query_employees(filter).await
                })
            })
            .await;

        match result {
            Ok(records) => records,
            Err(e) => {
                self.fall_back("query_by_filter", &e);
                mock::query(filter)
            }
        }
    }

    /// Probe the backend. Mock mode is always healthy.
    ///
    /// Not routed through the breaker, so probes neither trip nor heal it.
    pub async fn health_check(&self) -> bool {
        let Some(connector) = self.connector.as_ref() else {
            metrics::record_warehouse_health("mock", true);
            return true;
        };

        let outcome = self
            .with_session(connector, |conn| async move { conn.ping().await })
            .await;
        let healthy = match outcome {
            Ok(()) => true,
            Err(e) => {
                tracing::error!(error = %e, "Warehouse health check failed");
                false
            }
        };
        metrics::record_warehouse_health("real", healthy);
        healthy
    }

    pub fn stats(&self) -> WarehouseClientStats {
        WarehouseClientStats {
            mode: self.mode(),
            mock_reason: self.mock_reason.as_ref().map(ToString::to_string),
            circuit_breaker: self.breaker.stats(),
            connection_active: self.connection_active.load(Ordering::SeqCst),
            fallbacks: self.fallbacks.load(Ordering::Relaxed),
        }
    }

    /// Release the cached session. Safe to call more than once.
    pub async fn close(&self) {
        let conn = self.connection.lock().await.take();
        self.connection_active.store(false, Ordering::SeqCst);
        if let Some(conn) = conn {
            tracing::info!("Closing warehouse connection");
            if let Err(e) = conn.close().await {
                tracing::warn!(error = %e, "Warehouse session did not close cleanly");
            }
        }
    }

    async fn connection(
        &self,
        connector: &Arc<dyn WarehouseConnector>,
    ) -> WarehouseResult<Arc<dyn WarehouseConnection>> {
        let mut slot = self.connection.lock().await;
        if let Some(conn) = slot.as_ref() {
            return Ok(conn.clone());
        }

        tracing::info!("Creating new warehouse connection");
        let conn = connector.connect().await?;
        *slot = Some(conn.clone());
        self.connection_active.store(true, Ordering::SeqCst);
        Ok(conn)
    }

    /// Run `op` on the cached session, discarding the session when the
    /// error shows it is no longer usable.
    async fn with_session<T, F, Fut>(
        &self,
        connector: &Arc<dyn WarehouseConnector>,
        op: F,
    ) -> WarehouseResult<T>
    where
        F: FnOnce(Arc<dyn WarehouseConnection>) -> Fut,
        Fut: Future<Output = WarehouseResult<T>>,
    {
        let conn = self.connection(connector).await?;
        let result = op(conn.clone()).await;
        if let Err(e) = &result {
            if e.invalidates_session() {
                self.discard(&conn, e).await;
            }
        }
        result
    }

    /// Forget `stale` so the next call logs in again. A session another
    /// task already replaced is left alone.
    async fn discard(&self, stale: &Arc<dyn WarehouseConnection>, cause: &WarehouseError) {
        let mut slot = self.connection.lock().await;
        if slot.as_ref().is_some_and(|conn| Arc::ptr_eq(conn, stale)) {
            *slot = None;
            self.connection_active.store(false, Ordering::SeqCst);
            tracing::warn!(error = %cause, "Discarding warehouse session");
        }
    }

    fn fall_back(&self, operation: &'static str, err: &CircuitBreakerError<WarehouseError>) {
        let reason = if err.is_open() { "circuit_open" } else { "backend_error" };
        match err {
            CircuitBreakerError::Open(open) => {
                tracing::warn!(
                    operation,
                    breaker = %open.breaker,
                    "Circuit open, serving mock data"
                );
            }
            CircuitBreakerError::Inner(e) => {
                tracing::error!(operation, error = %e, "Warehouse call failed, serving mock data");
            }
        }
        self.fallbacks.fetch_add(1, Ordering::Relaxed);
        metrics::record_fallback(operation, reason);
    }
}

impl Drop for WarehouseClient {
    fn drop(&mut self) {
        if self.connection.get_mut().take().is_some() {
            self.connection_active.store(false, Ordering::SeqCst);
            tracing::warn!("Warehouse client dropped with an open connection, releasing it");
        }
    }
}
