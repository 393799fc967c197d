//! Topic provisioning for the trainer workload topic

use std::time::Duration;

use async_trait::async_trait;
use rdkafka::admin::{AdminClient, AdminOptions, NewTopic, TopicReplication};
use rdkafka::client::DefaultClientContext;
use rdkafka::types::RDKafkaErrorCode;

use crate::config::AppConfig;
use crate::core::error::{Result, ServiceError};

/// Declaration of a topic: name, partition count and replication factor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicSpec {
    pub name: String,
    pub partitions: u32,
    pub replication_factor: u32,
}

impl TopicSpec {
    /// Build a topic declaration; zero counts mean "unset" and fall back to 1
    pub fn new(name: &str, partitions: u32, replication_factor: u32) -> Self {
        Self {
            name: name.to_string(),
            partitions: partitions.max(1),
            replication_factor: replication_factor.max(1),
        }
    }
}

/// Ensures a topic exists before it is first used
#[async_trait]
pub trait TopicProvisioner: Send + Sync {
    /// Create the topic if missing. Safe to call on every startup.
    async fn ensure_topic(&self, spec: &TopicSpec) -> Result<()>;
}

/// Provisions topics through the Kafka admin API
pub struct KafkaTopicProvisioner {
    admin: AdminClient<DefaultClientContext>,
    operation_timeout: Duration,
}

impl KafkaTopicProvisioner {
    pub fn new(config: &AppConfig) -> Result<Self> {
        let admin: AdminClient<DefaultClientContext> = super::kafka_client_config(config)
            .create()
            .map_err(|e| {
                ServiceError::TransportFailure(format!("Failed to create Kafka admin client: {}", e))
            })?;

        Ok(Self {
            admin,
            operation_timeout: config.kafka_send_timeout,
        })
    }
}

#[async_trait]
impl TopicProvisioner for KafkaTopicProvisioner {
    async fn ensure_topic(&self, spec: &TopicSpec) -> Result<()> {
        let partitions = i32::try_from(spec.partitions).map_err(|_| {
            ServiceError::ConfigurationError(format!("Partition count too large: {}", spec.partitions))
        })?;
        let replicas = i32::try_from(spec.replication_factor).map_err(|_| {
            ServiceError::ConfigurationError(format!(
                "Replication factor too large: {}",
                spec.replication_factor
            ))
        })?;

        let new_topic = NewTopic::new(&spec.name, partitions, TopicReplication::Fixed(replicas));
        let options = AdminOptions::new().operation_timeout(Some(self.operation_timeout));

        tracing::info!(
            topic = %spec.name,
            partitions = spec.partitions,
            replicas = spec.replication_factor,
            "Ensuring Kafka topic exists"
        );

        let results = self
            .admin
            .create_topics(&[new_topic], &options)
            .await
            .map_err(|e| ServiceError::TransportFailure(format!("Failed to create topic: {}", e)))?;

        for result in results {
            match result {
                Ok(name) => tracing::info!(topic = %name, "Kafka topic created"),
                Err((name, RDKafkaErrorCode::TopicAlreadyExists)) => {
                    tracing::info!(topic = %name, "Kafka topic already exists")
                }
                Err((name, code)) => {
                    return Err(ServiceError::ConfigurationError(format!(
                        "Broker rejected topic '{}': {}",
                        name, code
                    )));
                }
            }
        }

        Ok(())
    }
}
