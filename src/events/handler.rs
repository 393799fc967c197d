//! Event handler for workload messages
//!
//! Decodes messages delivered by a consumer and applies them to the
//! aggregator.

use std::sync::Arc;

use crate::core::error::Result;
use crate::service::aggregator::{ApplyOutcome, WorkloadAggregator};
use super::models::WorkloadEvent;

/// Handler for processing workload events
#[derive(Clone)]
pub struct EventHandler {
    /// Aggregator the events are applied to
    aggregator: Arc<dyn WorkloadAggregator>,
}

impl EventHandler {
    /// Create a new event handler
    pub fn new(aggregator: Arc<dyn WorkloadAggregator>) -> Self {
        Self { aggregator }
    }

    /// Decode a raw message payload and apply it
    ///
    /// Payloads that fail to decode or validate are reported as
    /// `InvalidEvent` and never reach the aggregator.
    pub async fn handle_payload(&self, payload: &[u8]) -> Result<ApplyOutcome> {
        let event = match WorkloadEvent::from_json_slice(payload) {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!("Discarding undecodable workload message: {}", e);
                crate::metrics::record_aggregator_event("invalid");
                return Err(e);
            }
        };

        self.handle_event(&event).await
    }

    /// Apply an already decoded event
    pub async fn handle_event(&self, event: &WorkloadEvent) -> Result<ApplyOutcome> {
        tracing::info!(
            transaction_id = %event.transaction_id(),
            trainer = %event.trainer_username(),
            action = %event.action_type(),
            minutes = event.training_duration_minutes(),
            "Processing workload event"
        );

        match self.aggregator.apply(event).await {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                tracing::error!(
                    transaction_id = %event.transaction_id(),
                    "Failed to apply workload event: {}",
                    e
                );
                Err(e)
            }
        }
    }
}
