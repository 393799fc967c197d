use axum::{extract::State, response::IntoResponse, Json};
use std::sync::Arc;

use crate::service::AppState;

/// Current state of the workload service circuit breaker
pub async fn circuit_breaker_status(State(app_state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(app_state.breaker.status())
}

/// Force the workload service circuit breaker back to Closed
pub async fn reset_circuit_breaker(State(app_state): State<Arc<AppState>>) -> impl IntoResponse {
    tracing::warn!(
        circuit = %app_state.breaker.name(),
        previous_state = %app_state.breaker.state(),
        "Circuit breaker reset by administrator"
    );
    app_state.breaker.reset();
    Json(app_state.breaker.status())
}
