use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use gym_workload::api::build_router;
use gym_workload::config::ReportingMode;
use gym_workload::core::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig};
use gym_workload::core::clock::ManualClock;
use gym_workload::events::memory::InMemoryBroker;
use gym_workload::events::producer::WorkloadPublisher;
use gym_workload::events::topic::{TopicProvisioner, TopicSpec};
use gym_workload::service::aggregator::{InMemoryWorkloadLedger, WorkloadAggregator};
use gym_workload::service::workload_client::LoggingFallbackClient;
use gym_workload::service::AppState;

use crate::test_utils::test_config;

struct TestApp {
    router: Router,
    broker: InMemoryBroker,
    breaker: Arc<CircuitBreaker>,
}

async fn test_app(mode: ReportingMode) -> TestApp {
    let config = test_config(mode);
    let broker = InMemoryBroker::new(&config.kafka_topic_trainer_workload);
    broker.ensure_topic(&config.topic_spec()).await.unwrap();

    let breaker = Arc::new(CircuitBreaker::with_clock(
        "workload-service",
        CircuitBreakerConfig::default().with_failure_threshold(1),
        Arc::new(ManualClock::new()),
    ));
    let publisher: Arc<dyn WorkloadPublisher> = Arc::new(broker.clone());
    let aggregator: Arc<dyn WorkloadAggregator> = Arc::new(InMemoryWorkloadLedger::new());

    let state = AppState::new(
        config,
        Some(publisher),
        Arc::new(LoggingFallbackClient),
        breaker.clone(),
        Some(aggregator),
    );

    TestApp {
        router: build_router(Arc::new(state)),
        broker,
        breaker,
    }
}

async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, body)
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::AUTHORIZATION, "Bearer jwt-token")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn training(action: &str, minutes: i64) -> Value {
    json!({
        "trainerUsername": "jane.doe",
        "trainerFirstName": "Jane",
        "trainerLastName": "Doe",
        "isActive": true,
        "trainingDate": "2024-03-01",
        "trainingDurationMinutes": minutes,
        "actionType": action
    })
}

#[tokio::test]
async fn test_report_workload_returns_accepted() {
    let app = test_app(ReportingMode::Async).await;

    let (status, body) = send(
        &app.router,
        post_json("/api/v1/trainings/workload", training("ADD", 60)),
    )
    .await;

    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["actionType"], "ADD");
    assert_eq!(body["trainerUsername"], "jane.doe");
    assert_eq!(body["deliveryMode"], "async");

    let published = app.broker.published("trainer-workload");
    assert_eq!(published.len(), 1);
    assert_eq!(body["transactionId"], published[0].transaction_id());
}

#[tokio::test]
async fn test_report_workload_in_sync_mode() {
    let app = test_app(ReportingMode::Sync).await;

    let (status, body) = send(
        &app.router,
        post_json("/api/v1/trainings/workload", training("DELETE", 30)),
    )
    .await;

    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["deliveryMode"], "sync");
    assert!(app.broker.published("trainer-workload").is_empty());
}

#[tokio::test]
async fn test_report_workload_rejects_invalid_input() {
    let app = test_app(ReportingMode::Async).await;

    let mut missing_date = training("ADD", 60);
    missing_date["trainingDate"] = Value::Null;
    let (status, body) = send(&app.router, post_json("/api/v1/trainings/workload", missing_date)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_WORKLOAD_EVENT");

    let mut bad_action = training("ADD", 60);
    bad_action["actionType"] = json!("UPDATE");
    let (status, body) = send(&app.router, post_json("/api/v1/trainings/workload", bad_action)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_WORKLOAD_EVENT");

    assert!(app.broker.published("trainer-workload").is_empty());
}

#[tokio::test]
async fn test_aggregator_endpoints_apply_and_summarize() {
    let app = test_app(ReportingMode::Sync).await;

    let mut event = training("ADD", 60);
    event["transactionId"] = json!("tx-1");

    let (status, body) = send(&app.router, post_json("/api/v1/trainer-workload", event.clone())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "applied");

    let (status, body) = send(&app.router, post_json("/api/v1/trainer-workload", event)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "duplicate");

    let (status, body) = send(&app.router, get("/api/v1/trainer-workload/jane.doe")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["trainerUsername"], "jane.doe");
    assert_eq!(body["years"][0]["year"], 2024);
    assert_eq!(body["years"][0]["months"][0]["month"], 3);
    assert_eq!(body["years"][0]["months"][0]["trainingDurationMinutes"], 60);

    let (status, body) = send(&app.router, get("/api/v1/trainer-workload/nobody")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_aggregator_rejects_event_without_transaction_id() {
    let app = test_app(ReportingMode::Sync).await;

    let (status, body) = send(&app.router, post_json("/api/v1/trainer-workload", training("ADD", 60))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_WORKLOAD_EVENT");
}

#[tokio::test]
async fn test_circuit_breaker_admin_routes() {
    let app = test_app(ReportingMode::Sync).await;

    app.breaker.allow_request().unwrap().failure();
    let (status, body) = send(&app.router, get("/api/v1/admin/circuit-breaker")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "workload-service");
    assert_eq!(body["state"], "open");

    let reset = Request::builder()
        .method("POST")
        .uri("/api/v1/admin/circuit-breaker/reset")
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(&app.router, reset).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["state"], "closed");
    assert_eq!(body["consecutive_failures"], 0);
}

#[tokio::test]
async fn test_health_and_readiness() {
    let app = test_app(ReportingMode::Async).await;

    let (status, body) = send(&app.router, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");

    let (status, body) = send(&app.router, get("/readiness")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ready");

    app.broker.set_available(false);
    let (status, body) = send(&app.router, get("/readiness")).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["status"], "not_ready");

    let (status, _) = send(&app.router, get("/liveness")).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_provisioned_topic_matches_config() {
    let app = test_app(ReportingMode::Async).await;
    assert_eq!(
        app.broker.topic_spec("trainer-workload"),
        Some(TopicSpec::new("trainer-workload", 1, 1))
    );

    // Startup provisioning can run again without error
    app.broker
        .ensure_topic(&TopicSpec::new("trainer-workload", 1, 1))
        .await
        .unwrap();
}
