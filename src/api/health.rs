use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::config::ReportingMode;
use crate::core::circuit_breaker::CircuitState;
use crate::service::AppState;

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::from_secs(0))
        .as_secs()
}

/// Health check endpoint that provides basic service information
///
/// Returns the version, build timestamp, uptime and status "ok" while the
/// process is running.
pub async fn health_check(State(app_state): State<Arc<AppState>>) -> impl IntoResponse {
    let build_info = &app_state.build_info;
    let uptime = SystemTime::now()
        .duration_since(build_info.start_time)
        .unwrap_or(Duration::from_secs(0));

    Json(json!({
        "status": "ok",
        "version": build_info.version,
        "build_timestamp": build_info.build_timestamp,
        "uptime_seconds": uptime.as_secs(),
        "reporting_mode": app_state.reporter.mode().to_string(),
        "timestamp": unix_now()
    }))
}

/// Readiness check endpoint
///
/// The service is ready when the transport of the configured reporting mode
/// can be used: the publisher is connected in async mode. The breaker state
/// is reported but does not affect readiness.
pub async fn readiness_check(State(app_state): State<Arc<AppState>>) -> impl IntoResponse {
    let mut all_ready = true;
    let mut components: Vec<Value> = Vec::new();

    match &app_state.publisher {
        Some(publisher) => {
            let connected = publisher.is_connected().await;
            if !connected && app_state.reporter.mode() == ReportingMode::Async {
                all_ready = false;
            }
            components.push(json!({
                "name": "publisher",
                "topic": publisher.topic(),
                "status": if connected { "ready" } else { "not_ready" }
            }));
        }
        None => {
            if app_state.reporter.mode() == ReportingMode::Async {
                all_ready = false;
            }
            components.push(json!({
                "name": "publisher",
                "status": "disabled"
            }));
        }
    }

    let breaker_state = app_state.breaker.state();
    components.push(json!({
        "name": "workload_service",
        "circuit_state": breaker_state,
        "status": if breaker_state == CircuitState::Closed { "ready" } else { "degraded" }
    }));

    components.push(json!({
        "name": "aggregator",
        "status": if app_state.aggregator.is_some() { "ready" } else { "disabled" }
    }));

    let (status_code, status) = if all_ready {
        (StatusCode::OK, "ready")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "not_ready")
    };

    (
        status_code,
        Json(json!({
            "status": status,
            "version": app_state.build_info.version,
            "components": components,
            "timestamp": unix_now()
        })),
    )
}

/// Liveness probe for Kubernetes
///
/// Always returns 200 OK while the process can handle requests.
pub async fn liveness_probe() -> impl IntoResponse {
    Json(json!({
        "status": "alive",
        "timestamp": unix_now()
    }))
}
