// In-memory broker for local runs and tests
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::core::error::{Result, ServiceError};
use super::handler::EventHandler;
use super::models::WorkloadEvent;
use super::producer::WorkloadPublisher;
use super::topic::{TopicProvisioner, TopicSpec};

const DEFAULT_CHANNEL_SIZE: usize = 1024;

/// Most recent events kept per topic for inspection
pub const DEFAULT_HISTORY_LIMIT: usize = 1024;

struct InMemoryTopic {
    spec: TopicSpec,
    sender: broadcast::Sender<Vec<u8>>,
    history: VecDeque<WorkloadEvent>,
}

/// Broker keeping provisioned topics as broadcast channels
///
/// Topics must be provisioned before publishing, as with a Kafka cluster that
/// has automatic topic creation disabled.
#[derive(Clone)]
pub struct InMemoryBroker {
    /// Topic written by `WorkloadPublisher::publish`
    topic: String,
    topics: Arc<Mutex<HashMap<String, InMemoryTopic>>>,
    available: Arc<AtomicBool>,
    history_limit: usize,
}

impl InMemoryBroker {
    /// Create a broker that publishes workload events to `topic`
    pub fn new(topic: &str) -> Self {
        Self::with_history_limit(topic, DEFAULT_HISTORY_LIMIT)
    }

    /// Create a broker that keeps at most `limit` recent events per topic.
    /// A limit of zero disables the history.
    pub fn with_history_limit(topic: &str, limit: usize) -> Self {
        Self {
            topic: topic.to_string(),
            topics: Arc::new(Mutex::new(HashMap::new())),
            available: Arc::new(AtomicBool::new(true)),
            history_limit: limit,
        }
    }

    fn topics(&self) -> MutexGuard<'_, HashMap<String, InMemoryTopic>> {
        self.topics.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Simulate the broker going away or coming back
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Declared settings of a provisioned topic
    pub fn topic_spec(&self, topic: &str) -> Option<TopicSpec> {
        self.topics().get(topic).map(|t| t.spec.clone())
    }

    /// The most recent events accepted on a topic, oldest first
    pub fn published(&self, topic: &str) -> Vec<WorkloadEvent> {
        self.topics()
            .get(topic)
            .map(|t| t.history.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Deliver every future message on `topic` to `handler` on a background task
    pub fn spawn_subscriber(&self, topic: &str, handler: EventHandler) -> Result<JoinHandle<()>> {
        let mut receiver = {
            let topics = self.topics();
            let entry = topics.get(topic).ok_or_else(|| {
                ServiceError::NotFound(format!("Topic '{}' has not been provisioned", topic))
            })?;
            entry.sender.subscribe()
        };

        let topic_owned = topic.to_string();
        info!(topic = %topic_owned, "Starting in-memory subscriber");

        Ok(tokio::spawn(async move {
            loop {
                match receiver.recv().await {
                    Ok(payload) => {
                        if let Err(e) = handler.handle_payload(&payload).await {
                            error!(topic = %topic_owned, "Error handling in-memory event: {}", e);
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(topic = %topic_owned, skipped, "In-memory subscriber lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }))
    }
}

#[async_trait]
impl WorkloadPublisher for InMemoryBroker {
    async fn publish(&self, event: &WorkloadEvent) -> Result<()> {
        if !self.available.load(Ordering::SeqCst) {
            return Err(ServiceError::TransportFailure(
                "In-memory broker is unavailable".to_string(),
            ));
        }

        let payload = event.to_json()?.into_bytes();
        let mut topics = self.topics();
        let entry = topics.get_mut(&self.topic).ok_or_else(|| {
            ServiceError::TransportFailure(format!("Unknown topic '{}'", self.topic))
        })?;

        if self.history_limit > 0 {
            if entry.history.len() >= self.history_limit {
                entry.history.pop_front();
            }
            entry.history.push_back(event.clone());
        }
        if entry.sender.send(payload).is_err() {
            debug!(topic = %self.topic, "No subscribers for topic, message dropped");
        }

        Ok(())
    }

    fn topic(&self) -> &str {
        &self.topic
    }

    async fn is_connected(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TopicProvisioner for InMemoryBroker {
    async fn ensure_topic(&self, spec: &TopicSpec) -> Result<()> {
        if !self.available.load(Ordering::SeqCst) {
            return Err(ServiceError::TransportFailure(
                "In-memory broker is unavailable".to_string(),
            ));
        }

        let mut topics = self.topics();
        match topics.get(&spec.name) {
            Some(existing) if existing.spec == *spec => {
                debug!(topic = %spec.name, "Topic already exists");
                Ok(())
            }
            Some(existing) => Err(ServiceError::ConfigurationError(format!(
                "Topic '{}' exists with partitions={} replicas={}, requested partitions={} replicas={}",
                spec.name,
                existing.spec.partitions,
                existing.spec.replication_factor,
                spec.partitions,
                spec.replication_factor
            ))),
            None => {
                let (sender, _) = broadcast::channel(DEFAULT_CHANNEL_SIZE);
                topics.insert(
                    spec.name.clone(),
                    InMemoryTopic {
                        spec: spec.clone(),
                        sender,
                        history: VecDeque::with_capacity(self.history_limit.min(DEFAULT_HISTORY_LIMIT)),
                    },
                );
                info!(topic = %spec.name, "Topic created");
                Ok(())
            }
        }
    }
}
