//! Public route handlers.

use axum::{
    extract::{Path, Query, State},
    http::header,
    response::IntoResponse,
    Json,
};
use serde::Serialize;

use crate::http::error::ApiError;
use crate::http::server::AppState;
use crate::resilience::CircuitBreakerStats;
use crate::warehouse::{EmployeeFilter, EmployeeRecord, WarehouseClientStats};

#[derive(Serialize)]
pub struct ServiceInfo {
    pub service: &'static str,
    pub version: &'static str,
    pub status: &'static str,
    pub endpoints: Vec<&'static str>,
}

#[derive(Serialize)]
pub struct WarehouseHealth {
    pub status: &'static str,
    pub details: WarehouseClientStats,
}

#[derive(Serialize)]
pub struct HealthComponents {
    pub warehouse: WarehouseHealth,
    pub circuit_breakers: Vec<CircuitBreakerStats>,
}

#[derive(Serialize)]
pub struct HealthReport {
    pub status: &'static str,
    pub timestamp: String,
    pub components: HealthComponents,
}

#[derive(Serialize)]
pub struct StatsReport {
    pub warehouse: WarehouseClientStats,
    pub circuit_breakers: Vec<CircuitBreakerStats>,
    pub timestamp: String,
}

#[derive(Serialize)]
pub struct EmployeeList {
    pub count: usize,
    pub employees: Vec<EmployeeRecord>,
}

pub async fn root() -> Json<ServiceInfo> {
    Json(ServiceInfo {
        service: "leave-gateway",
        version: env!("CARGO_PKG_VERSION"),
        status: "running",
        endpoints: vec![
            "/health",
            "/stats",
            "/metrics",
            "/employees",
            "/employees/{id}",
            "/admin/breakers",
        ],
    })
}

/// Mock mode counts as healthy; a failing real backend reports `degraded`.
pub async fn health(State(state): State<AppState>) -> Json<HealthReport> {
    let healthy = state.client.health_check().await;
    let (status, warehouse_status) = if healthy {
        ("healthy", "healthy")
    } else {
        ("degraded", "unhealthy")
    };

    Json(HealthReport {
        status,
        timestamp: chrono::Utc::now().to_rfc3339(),
        components: HealthComponents {
            warehouse: WarehouseHealth {
                status: warehouse_status,
                details: state.client.stats(),
            },
            circuit_breakers: state.registry.all_stats(),
        },
    })
}

pub async fn stats(State(state): State<AppState>) -> Json<StatsReport> {
    Json(StatsReport {
        warehouse: state.client.stats(),
        circuit_breakers: state.registry.all_stats(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

pub async fn metrics(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let handle = state.metrics.as_ref().ok_or(ApiError::MetricsDisabled)?;
    Ok((
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        handle.render(),
    ))
}

pub async fn get_employee(
    State(state): State<AppState>,
    Path(employee_id): Path<String>,
) -> Result<Json<EmployeeRecord>, ApiError> {
    state
        .client
        .fetch_by_key(&employee_id)
        .await
        .map(Json)
        .ok_or(ApiError::EmployeeNotFound(employee_id))
}

pub async fn list_employees(
    State(state): State<AppState>,
    Query(filter): Query<EmployeeFilter>,
) -> Json<EmployeeList> {
    let employees = state.client.query_by_filter(&filter).await;
    Json(EmployeeList {
        count: employees.len(),
        employees,
    })
}
