use axum::{
    extract::{Path, State},
    Json,
};

use crate::http::error::ApiError;
use crate::http::server::AppState;
use crate::resilience::CircuitBreakerStats;

pub async fn list_breakers(State(state): State<AppState>) -> Json<Vec<CircuitBreakerStats>> {
    Json(state.registry.all_stats())
}

pub async fn reset_breaker(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<CircuitBreakerStats>, ApiError> {
    let breaker = state
        .registry
        .get(&name)
        .ok_or_else(|| ApiError::BreakerNotFound(name.clone()))?;

    breaker.reset();
    tracing::info!(breaker = %name, "Circuit breaker reset via admin API");
    Ok(Json(breaker.stats()))
}
