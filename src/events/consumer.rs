//! Kafka consumer for the trainer workload topic
//!
//! Messages are applied through the `EventHandler` and committed afterwards,
//! so a crash between apply and commit redelivers the message. The aggregator
//! deduplicates redeliveries by transaction id.

use std::time::Duration;

use futures::stream::StreamExt;
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::message::Message;
use tokio::task::JoinHandle;

use crate::config::AppConfig;
use crate::core::error::{Result, ServiceError};
use super::handler::EventHandler;

const RECONNECT_DELAY: Duration = Duration::from_secs(1);
const CREATE_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Whether a handled message may be committed. Undecodable events are
/// committed so they cannot block the partition; any other failure leaves the
/// offset uncommitted for redelivery.
fn should_commit<T>(outcome: &Result<T>) -> bool {
    matches!(outcome, Ok(_) | Err(ServiceError::InvalidEvent(_)))
}

/// Kafka consumer feeding the workload aggregator
#[derive(Clone)]
pub struct KafkaConsumer {
    config: AppConfig,
}

impl KafkaConsumer {
    /// Create a new Kafka consumer from configuration
    pub fn new(config: &AppConfig) -> Self {
        tracing::info!(
            "Initializing Kafka consumer with bootstrap servers: {}",
            config.kafka_bootstrap_servers
        );

        Self {
            config: config.clone(),
        }
    }

    /// Start consuming the workload topic on a background task
    pub fn start(&self, handler: EventHandler) -> JoinHandle<()> {
        let config = self.config.clone();
        let topic = self.config.kafka_topic_trainer_workload.clone();

        tracing::info!(
            topic = %topic,
            group_id = %config.kafka_consumer_group_id,
            "Kafka consumer started"
        );

        tokio::spawn(async move { Self::consume_topic(&config, &topic, handler).await })
    }

    async fn consume_topic(config: &AppConfig, topic: &str, handler: EventHandler) {
        loop {
            let consumer = match Self::create_consumer(config, topic) {
                Ok(c) => c,
                Err(e) => {
                    tracing::error!("Failed to create Kafka consumer: {}", e);
                    tokio::time::sleep(CREATE_RETRY_DELAY).await;
                    continue;
                }
            };

            tracing::info!("Starting to consume from topic: {}", topic);

            let mut message_stream = consumer.stream();
            while let Some(message_result) = message_stream.next().await {
                let message = match message_result {
                    Ok(message) => message,
                    Err(e) => {
                        tracing::error!("Error receiving Kafka message: {}", e);
                        break;
                    }
                };

                let outcome = match message.payload() {
                    Some(payload) => handler.handle_payload(payload).await.map(|_| ()),
                    None => {
                        tracing::warn!(
                            partition = message.partition(),
                            offset = message.offset(),
                            "Received message with empty payload"
                        );
                        Ok(())
                    }
                };

                if !should_commit(&outcome) {
                    tracing::error!(
                        partition = message.partition(),
                        offset = message.offset(),
                        "Workload event not applied, resuming from last committed offset"
                    );
                    break;
                }

                if let Err(e) = consumer.commit_message(&message, CommitMode::Async) {
                    tracing::error!("Error committing message: {}", e);
                }
            }

            tracing::info!("Kafka consumer stream ended, reconnecting...");
            tokio::time::sleep(RECONNECT_DELAY).await;
        }
    }

    fn create_consumer(config: &AppConfig, topic: &str) -> Result<StreamConsumer> {
        let mut client_config = super::kafka_client_config(config);
        client_config
            .set("group.id", &config.kafka_consumer_group_id)
            .set("client.id", format!("{}-consumer", config.kafka_client_id))
            .set("enable.auto.commit", "false")
            .set("auto.offset.reset", "earliest")
            .set("session.timeout.ms", "6000");

        let consumer: StreamConsumer = client_config.create().map_err(|e| {
            ServiceError::TransportFailure(format!("Failed to create Kafka consumer: {}", e))
        })?;

        consumer.subscribe(&[topic]).map_err(|e| {
            ServiceError::TransportFailure(format!("Failed to subscribe to topic '{}': {}", topic, e))
        })?;

        Ok(consumer)
    }
}
