pub mod admin;
pub mod health;
pub mod workload;

use std::sync::Arc;
use std::time::Duration;

use axum::{
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use http::{header, HeaderValue, Method};
use tower_http::cors::{Any, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::metrics;
use crate::service::AppState;

/// Maximum number of requests served concurrently
const MAX_CONCURRENT_REQUESTS: usize = 100;

/// Build the application router with its middleware stack
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_origin(Any);

    let request_timeout = state.config.request_timeout;

    Router::new()
        .route("/health", get(health::health_check))
        .route("/readiness", get(health::readiness_check))
        .route("/liveness", get(health::liveness_probe))
        .route("/metrics", get(metrics_endpoint))
        .route("/api/v1/trainings/workload", post(workload::report_workload))
        .route("/api/v1/trainer-workload", post(workload::apply_workload))
        .route(
            "/api/v1/trainer-workload/:username",
            get(workload::get_trainer_summary),
        )
        .route(
            "/api/v1/admin/circuit-breaker",
            get(admin::circuit_breaker_status),
        )
        .route(
            "/api/v1/admin/circuit-breaker/reset",
            post(admin::reset_circuit_breaker),
        )
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(request_timeout.max(Duration::from_secs(1))))
        .layer(tower::limit::ConcurrencyLimitLayer::new(MAX_CONCURRENT_REQUESTS))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-store"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
}

/// Metrics endpoint that returns Prometheus-formatted metrics
async fn metrics_endpoint() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        metrics::gather_metrics(),
    )
}
