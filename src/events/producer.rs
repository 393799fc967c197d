//! Kafka producer for trainer workload events
//!
//! This module provides the publishing side of the asynchronous reporting
//! path. Delivery is at-least-once: an acknowledged publish reaches the
//! topic's consumers, deduplication is left to the aggregator through the
//! event's transaction id.

use std::time::Duration;

use async_trait::async_trait;
use rdkafka::message::{Header, OwnedHeaders};
use rdkafka::producer::{FutureProducer, FutureRecord, Producer};
use rdkafka::util::Timeout;

use crate::config::AppConfig;
use crate::core::error::{Result, ServiceError};
use crate::metrics;
use super::models::WorkloadEvent;

/// Value of the `event-type` header on every workload message
pub const WORKLOAD_EVENT_TYPE: &str = "trainer-workload";

/// Publishes workload events onto the workload topic
#[async_trait]
pub trait WorkloadPublisher: Send + Sync {
    /// Publish one event; returns once the broker acknowledged it
    async fn publish(&self, event: &WorkloadEvent) -> Result<()>;

    /// Topic this publisher writes to
    fn topic(&self) -> &str;

    /// Check if the publisher can reach its broker
    async fn is_connected(&self) -> bool {
        true
    }
}

/// Kafka producer for publishing workload events
#[derive(Clone)]
pub struct KafkaProducer {
    /// Inner Kafka producer
    producer: FutureProducer,

    /// Topic for trainer workload events
    topic: String,

    /// Upper bound on a single send, including acknowledgement
    send_timeout: Duration,

    /// Largest accepted payload in bytes
    max_payload_size: usize,
}

impl KafkaProducer {
    /// Create a new Kafka producer from configuration
    pub fn new(config: &AppConfig) -> Result<Self> {
        tracing::info!(
            "Initializing Kafka producer with bootstrap servers: {}",
            config.kafka_bootstrap_servers
        );

        let message_timeout_ms = config.kafka_send_timeout.as_millis().to_string();

        let mut client_config = super::kafka_client_config(config);
        client_config
            .set("message.timeout.ms", &message_timeout_ms)
            .set("acks", "all")
            .set("enable.idempotence", "true");

        let producer: FutureProducer = client_config.create().map_err(|e| {
            ServiceError::TransportFailure(format!("Failed to create Kafka producer: {}", e))
        })?;

        metrics::record_operation_result("kafka_producer_init", true);

        Ok(Self {
            producer,
            topic: config.kafka_topic_trainer_workload.clone(),
            send_timeout: config.kafka_send_timeout,
            max_payload_size: config.kafka_max_payload_size,
        })
    }
}

#[async_trait]
impl WorkloadPublisher for KafkaProducer {
    async fn publish(&self, event: &WorkloadEvent) -> Result<()> {
        let payload = event.to_json()?;

        if payload.len() > self.max_payload_size {
            return Err(ServiceError::ValidationError(format!(
                "Event payload too large: {} bytes (max {} bytes)",
                payload.len(),
                self.max_payload_size
            )));
        }

        let key = event.trainer_username();
        let headers = OwnedHeaders::new_with_capacity(2)
            .insert(Header {
                key: "event-type",
                value: Some(WORKLOAD_EVENT_TYPE),
            })
            .insert(Header {
                key: "transaction-id",
                value: Some(event.transaction_id()),
            });

        tracing::debug!(
            topic = %self.topic,
            trainer = %key,
            transaction_id = %event.transaction_id(),
            action = %event.action_type(),
            "Publishing workload event"
        );

        let _timer = metrics::Timer::new("kafka_send");
        let record = FutureRecord::to(&self.topic)
            .payload(&payload)
            .key(key)
            .headers(headers);

        match self
            .producer
            .send(record, Timeout::After(self.send_timeout))
            .await
        {
            Ok((partition, offset)) => {
                tracing::info!(
                    topic = %self.topic,
                    partition,
                    offset,
                    transaction_id = %event.transaction_id(),
                    "Workload event published"
                );
                metrics::record_kafka_event(&self.topic, "success");
                Ok(())
            }
            Err((e, _)) => {
                metrics::record_kafka_event(&self.topic, "error");
                Err(ServiceError::TransportFailure(format!(
                    "Failed to send workload event to Kafka topic '{}': {}",
                    self.topic, e
                )))
            }
        }
    }

    fn topic(&self) -> &str {
        &self.topic
    }

    async fn is_connected(&self) -> bool {
        let producer = self.producer.clone();
        let topic = self.topic.clone();
        let timeout = self.send_timeout;

        let checked = tokio::task::spawn_blocking(move || {
            producer
                .client()
                .fetch_metadata(Some(&topic), Timeout::After(timeout))
                .map(|_| ())
        })
        .await;

        match checked {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                tracing::warn!("Kafka connection check failed: {}", e);
                false
            }
            Err(e) => {
                tracing::warn!("Kafka connection check did not complete: {}", e);
                false
            }
        }
    }
}
