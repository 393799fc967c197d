//! Event system for trainer workload reporting
//!
//! This module provides the event-driven components of the service: the
//! workload event model, the Kafka producer and consumer, topic provisioning
//! and an in-memory broker used when Kafka is disabled.

pub mod models;
pub mod producer;
pub mod consumer;
pub mod handler;
pub mod topic;
pub mod memory;

pub use models::*;
pub use producer::*;
pub use consumer::*;
pub use handler::*;
pub use topic::*;
pub use memory::*;

use std::sync::Arc;

use rdkafka::config::ClientConfig;

use crate::config::AppConfig;
use crate::core::error::Result;

/// Client settings shared by the producer, consumer and admin client
pub fn kafka_client_config(config: &AppConfig) -> ClientConfig {
    let mut client_config = ClientConfig::new();
    client_config
        .set("bootstrap.servers", &config.kafka_bootstrap_servers)
        .set("client.id", &config.kafka_client_id);

    if let Some(protocol) = &config.kafka_security_protocol {
        client_config.set("security.protocol", protocol);

        if let (Some(mechanism), Some(username), Some(password)) = (
            &config.kafka_sasl_mechanism,
            &config.kafka_sasl_username,
            &config.kafka_sasl_password,
        ) {
            client_config
                .set("sasl.mechanism", mechanism)
                .set("sasl.username", username)
                .set("sasl.password", password);
        }
    }

    client_config
}

/// Transport pieces selected from configuration
#[derive(Clone)]
pub struct EventSystem {
    /// Publisher for workload events
    pub publisher: Arc<dyn WorkloadPublisher>,

    /// Kafka consumer, when the aggregator consumes from Kafka
    pub consumer: Option<KafkaConsumer>,

    /// In-memory broker, when Kafka is disabled
    pub memory_broker: Option<InMemoryBroker>,
}

/// Initialize the event system and provision the workload topic
///
/// With `KAFKA_ENABLE_PRODUCER=false` events go to an in-memory broker, which
/// lets the service run without a cluster.
pub async fn init_event_system(config: &AppConfig) -> Result<EventSystem> {
    let spec = config.topic_spec();

    if config.kafka_enable_producer {
        let provisioner = KafkaTopicProvisioner::new(config)?;
        if let Err(e) = provisioner.ensure_topic(&spec).await {
            tracing::warn!(topic = %spec.name, "Topic provisioning failed: {}", e);
        }

        let producer = KafkaProducer::new(config)?;
        let consumer = if config.kafka_enable_consumer && config.aggregator_enabled {
            Some(KafkaConsumer::new(config))
        } else {
            None
        };

        return Ok(EventSystem {
            publisher: Arc::new(producer),
            consumer,
            memory_broker: None,
        });
    }

    tracing::info!(topic = %spec.name, "Kafka producer disabled, using in-memory broker");
    let broker = InMemoryBroker::new(&spec.name);
    broker.ensure_topic(&spec).await?;

    Ok(EventSystem {
        publisher: Arc::new(broker.clone()),
        consumer: None,
        memory_broker: Some(broker),
    })
}

impl EventSystem {
    /// Start delivering workload events to the handler in the background
    pub fn start_consumers(&self, handler: EventHandler) -> Result<()> {
        if let Some(consumer) = &self.consumer {
            tracing::info!("Starting Kafka consumer");
            consumer.start(handler);
        } else if let Some(broker) = &self.memory_broker {
            broker.spawn_subscriber(self.publisher.topic(), handler)?;
        }

        Ok(())
    }
}
