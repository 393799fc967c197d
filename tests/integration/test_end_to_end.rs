use std::sync::Arc;
use std::time::Duration;

use gym_workload::config::ReportingMode;
use gym_workload::events::handler::EventHandler;
use gym_workload::events::memory::InMemoryBroker;
use gym_workload::events::models::{ActionType, WorkloadEvent};
use gym_workload::events::producer::WorkloadPublisher;
use gym_workload::events::topic::{TopicProvisioner, TopicSpec};
use gym_workload::service::aggregator::{InMemoryWorkloadLedger, WorkloadAggregator};
use gym_workload::service::workload_client::LoggingFallbackClient;
use gym_workload::service::WorkloadReporter;

use crate::test_utils::{march_2024, mutation};

const TOPIC: &str = "trainer-workload";

async fn pipeline() -> (InMemoryBroker, Arc<InMemoryWorkloadLedger>) {
    let broker = InMemoryBroker::new(TOPIC);
    broker.ensure_topic(&TopicSpec::new(TOPIC, 1, 1)).await.unwrap();

    let ledger = Arc::new(InMemoryWorkloadLedger::new());
    broker
        .spawn_subscriber(TOPIC, EventHandler::new(ledger.clone()))
        .unwrap();

    (broker, ledger)
}

/// Poll until the March 2024 total for `username` equals `expected`
async fn wait_for_minutes(ledger: &InMemoryWorkloadLedger, username: &str, expected: u64) {
    for _ in 0..100 {
        if let Some(summary) = ledger.summary(username).await.unwrap() {
            if summary.minutes_for(2024, 3) == expected {
                return;
            }
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    let actual = ledger
        .summary(username)
        .await
        .unwrap()
        .map(|s| s.minutes_for(2024, 3));
    panic!("expected {} minutes for {}, found {:?}", expected, username, actual);
}

#[tokio::test]
async fn test_add_duplicate_and_delete_flow_through_topic() {
    let (broker, ledger) = pipeline().await;

    let add = WorkloadEvent::with_transaction_id(
        &mutation("jane.doe", ActionType::Add, 60, march_2024()),
        "tx-1",
    )
    .unwrap();
    broker.publish(&add).await.unwrap();
    wait_for_minutes(&ledger, "jane.doe", 60).await;

    // Redelivery of tx-1 must not double-count
    broker.publish(&add).await.unwrap();
    let delete = WorkloadEvent::with_transaction_id(
        &mutation("jane.doe", ActionType::Delete, 60, march_2024()),
        "tx-2",
    )
    .unwrap();
    broker.publish(&delete).await.unwrap();
    wait_for_minutes(&ledger, "jane.doe", 0).await;

    assert_eq!(broker.published(TOPIC).len(), 3);
}

#[tokio::test]
async fn test_reporter_feeds_aggregator_through_broker() {
    let (broker, ledger) = pipeline().await;
    let publisher: Arc<dyn WorkloadPublisher> = Arc::new(broker.clone());
    let reporter = WorkloadReporter::new(
        ReportingMode::Async,
        Some(publisher),
        Arc::new(LoggingFallbackClient),
    );

    reporter
        .report(&mutation("jane.doe", ActionType::Add, 60, march_2024()), "")
        .await
        .unwrap();
    reporter
        .report(&mutation("jane.doe", ActionType::Add, 30, march_2024()), "")
        .await
        .unwrap();
    wait_for_minutes(&ledger, "jane.doe", 90).await;

    reporter
        .report(&mutation("jane.doe", ActionType::Delete, 60, march_2024()), "")
        .await
        .unwrap();
    wait_for_minutes(&ledger, "jane.doe", 30).await;

    let summary = ledger.summary("jane.doe").await.unwrap().unwrap();
    assert_eq!(summary.trainer_first_name, "Jane");
    assert_eq!(summary.trainer_last_name, "Doe");
    assert!(summary.is_active);
}

#[tokio::test]
async fn test_events_published_while_broker_down_are_lost_not_raised() {
    let (broker, ledger) = pipeline().await;
    let reporter = WorkloadReporter::new(
        ReportingMode::Async,
        Some(Arc::new(broker.clone())),
        Arc::new(LoggingFallbackClient),
    );

    broker.set_available(false);
    assert!(reporter
        .report(&mutation("jane.doe", ActionType::Add, 60, march_2024()), "")
        .await
        .is_ok());

    broker.set_available(true);
    reporter
        .report(&mutation("jane.doe", ActionType::Add, 15, march_2024()), "")
        .await
        .unwrap();
    wait_for_minutes(&ledger, "jane.doe", 15).await;
}
