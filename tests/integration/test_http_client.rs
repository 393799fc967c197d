use std::sync::Arc;
use std::time::Duration;

use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use gym_workload::core::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
use gym_workload::core::clock::ManualClock;
use gym_workload::core::error::ServiceError;
use gym_workload::events::models::{ActionType, WorkloadEvent};
use gym_workload::service::workload_client::{
    CircuitBreakerWorkloadClient, HttpWorkloadClient, LoggingFallbackClient, WorkloadClient,
};

use crate::test_utils::{march_2024, mutation};

fn event() -> WorkloadEvent {
    WorkloadEvent::from_mutation(&mutation("jane.doe", ActionType::Add, 60, march_2024())).unwrap()
}

fn http_client(server: &MockServer) -> HttpWorkloadClient {
    HttpWorkloadClient::new(&server.uri(), Duration::from_millis(500)).unwrap()
}

#[tokio::test]
async fn test_posts_event_with_bearer_token() {
    let server = MockServer::start().await;
    let event = event();

    Mock::given(method("POST"))
        .and(path("/api/v1/trainer-workload"))
        .and(header("authorization", "Bearer jwt-token"))
        .and(body_partial_json(serde_json::json!({
            "trainerUsername": "jane.doe",
            "trainingDurationMinutes": 60,
            "actionType": "ADD",
            "transactionId": event.transaction_id(),
        })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    http_client(&server)
        .update_workload(&event, "jwt-token")
        .await
        .unwrap();
}

#[tokio::test]
async fn test_blank_token_sends_no_authorization_header() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/trainer-workload"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    http_client(&server).update_workload(&event(), "  ").await.unwrap();

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    assert!(!requests[0].headers.contains_key("authorization"));
}

#[tokio::test]
async fn test_non_success_status_is_transport_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/trainer-workload"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let result = http_client(&server).update_workload(&event(), "").await;
    assert!(matches!(result, Err(ServiceError::TransportFailure(msg)) if msg.contains("503")));
}

#[tokio::test]
async fn test_timeout_is_transport_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/trainer-workload"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
        .mount(&server)
        .await;

    let result = http_client(&server).update_workload(&event(), "").await;
    assert!(matches!(result, Err(ServiceError::TransportFailure(_))));
}

#[tokio::test]
async fn test_open_circuit_makes_no_network_calls() {
    let server = MockServer::start().await;
    let threshold = 5;

    // Exactly `threshold` requests reach the server; verified when the server drops
    Mock::given(method("POST"))
        .and(path("/api/v1/trainer-workload"))
        .respond_with(ResponseTemplate::new(500))
        .expect(threshold as u64)
        .mount(&server)
        .await;

    let breaker = Arc::new(CircuitBreaker::with_clock(
        "workload-service",
        CircuitBreakerConfig::default()
            .with_failure_threshold(threshold)
            .with_cooldown(Duration::from_secs(30)),
        Arc::new(ManualClock::new()),
    ));
    let client = CircuitBreakerWorkloadClient::new(
        Arc::new(http_client(&server)),
        Arc::new(LoggingFallbackClient),
        breaker.clone(),
    );

    for _ in 0..threshold + 10 {
        assert!(client.update_workload(&event(), "jwt-token").await.is_ok());
    }

    assert_eq!(breaker.state(), CircuitState::Open);
    assert_eq!(breaker.status().rejected_calls, 10);
    server.verify().await;
}

#[tokio::test]
async fn test_circuit_recovers_after_cooldown() {
    let server = MockServer::start().await;
    let clock = Arc::new(ManualClock::new());

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .expect(2)
        .mount(&server)
        .await;

    let breaker = Arc::new(CircuitBreaker::with_clock(
        "workload-service",
        CircuitBreakerConfig::default()
            .with_failure_threshold(2)
            .with_cooldown(Duration::from_secs(30)),
        clock.clone(),
    ));
    let client = CircuitBreakerWorkloadClient::new(
        Arc::new(http_client(&server)),
        Arc::new(LoggingFallbackClient),
        breaker.clone(),
    );

    client.update_workload(&event(), "").await.unwrap();
    client.update_workload(&event(), "").await.unwrap();
    assert_eq!(breaker.state(), CircuitState::Open);
    server.verify().await;

    // The workload service comes back
    server.reset().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/trainer-workload"))
        .respond_with(ResponseTemplate::new(200))
        .expect(2)
        .mount(&server)
        .await;

    clock.advance(Duration::from_secs(30));
    client.update_workload(&event(), "").await.unwrap();
    assert_eq!(breaker.state(), CircuitState::Closed);

    client.update_workload(&event(), "").await.unwrap();
    assert_eq!(breaker.state(), CircuitState::Closed);
    server.verify().await;
}
