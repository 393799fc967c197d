use std::sync::Arc;
use std::time::Duration;

use gym_workload::core::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig};
use gym_workload::core::clock::ManualClock;
use gym_workload::events::models::{ActionType, WorkloadEvent};
use gym_workload::service::workload_client::{
    CircuitBreakerWorkloadClient, HttpWorkloadClient, LoggingFallbackClient, WorkloadClient,
};

use crate::test_utils::{capture_logs, march_2024, mutation};

#[tokio::test]
async fn test_fallback_logs_warning_naming_trainer() {
    let (logs, _guard) = capture_logs();
    let event =
        WorkloadEvent::from_mutation(&mutation("john.smith", ActionType::Add, 45, march_2024()))
            .unwrap();

    let result = LoggingFallbackClient.update_workload(&event, "jwt-token").await;

    assert!(result.is_ok());
    let output = logs.contents();
    assert!(output.contains("WARN"), "expected a warning, got: {}", output);
    assert!(output.contains("john.smith"), "expected trainer in log, got: {}", output);
    assert!(output.contains(event.transaction_id()));
}

#[tokio::test]
async fn test_unreachable_service_falls_back_with_warning() {
    let (logs, _guard) = capture_logs();

    // Nothing listens on port 9 locally; the call fails fast
    let primary = HttpWorkloadClient::new("http://127.0.0.1:9", Duration::from_millis(200)).unwrap();
    let breaker = Arc::new(CircuitBreaker::with_clock(
        "workload-service",
        CircuitBreakerConfig::default().with_failure_threshold(1),
        Arc::new(ManualClock::new()),
    ));
    let client = CircuitBreakerWorkloadClient::new(
        Arc::new(primary),
        Arc::new(LoggingFallbackClient),
        breaker,
    );

    let event =
        WorkloadEvent::from_mutation(&mutation("john.smith", ActionType::Delete, 45, march_2024()))
            .unwrap();

    // First call fails on the network, second is short-circuited; both fall back
    assert!(client.update_workload(&event, "").await.is_ok());
    assert!(client.update_workload(&event, "").await.is_ok());

    let output = logs.contents();
    let warnings = output
        .lines()
        .filter(|line| line.contains("WARN") && line.contains("john.smith"))
        .count();
    assert!(warnings >= 2, "expected fallback warnings, got: {}", output);
}
