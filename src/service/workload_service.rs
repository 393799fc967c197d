//! Workload reporting service
//!
//! Entry point used after a training session was created or deleted. Builds
//! the workload event and hands it to the configured transport. Transport
//! failures are logged and counted but never returned: the training mutation
//! has already been committed and must not be rolled back by reporting.

use std::sync::Arc;

use crate::config::ReportingMode;
use crate::core::error::Result;
use crate::events::models::{TrainingMutation, WorkloadEvent};
use crate::events::producer::WorkloadPublisher;
use crate::metrics;
use super::workload_client::WorkloadClient;

/// Reports training-session mutations to the workload aggregator
#[derive(Clone)]
pub struct WorkloadReporter {
    mode: ReportingMode,

    /// Kafka (or in-memory) publisher for the asynchronous path
    publisher: Option<Arc<dyn WorkloadPublisher>>,

    /// Breaker-guarded client for the synchronous path
    client: Arc<dyn WorkloadClient>,
}

impl WorkloadReporter {
    pub fn new(
        mode: ReportingMode,
        publisher: Option<Arc<dyn WorkloadPublisher>>,
        client: Arc<dyn WorkloadClient>,
    ) -> Self {
        Self {
            mode,
            publisher,
            client,
        }
    }

    pub fn mode(&self) -> ReportingMode {
        self.mode
    }

    /// Report one mutation
    ///
    /// Returns the event that was dispatched. The only error is
    /// `ServiceError::InvalidEvent`, raised before any transport is touched.
    pub async fn report(&self, mutation: &TrainingMutation, auth_token: &str) -> Result<WorkloadEvent> {
        let event = match WorkloadEvent::from_mutation(mutation) {
            Ok(event) => event,
            Err(e) => {
                metrics::record_workload_report(&self.mode.to_string(), "invalid");
                return Err(e);
            }
        };

        match self.mode {
            ReportingMode::Async => self.publish(&event).await,
            ReportingMode::Sync => self.deliver(&event, auth_token).await,
        }

        Ok(event)
    }

    async fn publish(&self, event: &WorkloadEvent) {
        let Some(publisher) = &self.publisher else {
            tracing::error!(
                trainer = %event.trainer_username(),
                transaction_id = %event.transaction_id(),
                "No workload publisher configured, event dropped"
            );
            metrics::record_workload_report("async", "failure");
            return;
        };

        match publisher.publish(event).await {
            Ok(()) => {
                tracing::info!(
                    topic = %publisher.topic(),
                    trainer = %event.trainer_username(),
                    transaction_id = %event.transaction_id(),
                    action = %event.action_type(),
                    "Workload event reported"
                );
                metrics::record_workload_report("async", "success");
            }
            Err(e) => {
                tracing::error!(
                    topic = %publisher.topic(),
                    trainer = %event.trainer_username(),
                    transaction_id = %event.transaction_id(),
                    "Failed to publish workload event: {}",
                    e
                );
                metrics::record_workload_report("async", "failure");
            }
        }
    }

    async fn deliver(&self, event: &WorkloadEvent, auth_token: &str) {
        match self.client.update_workload(event, auth_token).await {
            Ok(()) => metrics::record_workload_report("sync", "success"),
            Err(e) => {
                tracing::error!(
                    trainer = %event.trainer_username(),
                    transaction_id = %event.transaction_id(),
                    "Synchronous workload update failed: {}",
                    e
                );
                metrics::record_workload_report("sync", "failure");
            }
        }
    }
}
