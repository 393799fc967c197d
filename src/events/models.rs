//! Event models for the trainer workload pipeline
//!
//! A `WorkloadEvent` is built once per training-session mutation and then
//! handed to the Kafka producer or to the synchronous workload client. The
//! serialized form is the wire contract shared with the aggregator.

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::error::{Result, ServiceError};

/// Kind of change applied to a trainer's workload
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum ActionType {
    /// A training session was created
    Add,

    /// A training session was removed
    Delete,
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionType::Add => write!(f, "ADD"),
            ActionType::Delete => write!(f, "DELETE"),
        }
    }
}

/// A committed training-session mutation, as handed over by the CRUD layer
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrainingMutation {
    #[serde(default)]
    pub trainer_username: String,

    #[serde(default)]
    pub trainer_first_name: String,

    #[serde(default)]
    pub trainer_last_name: String,

    #[serde(default)]
    pub is_active: bool,

    #[serde(default)]
    pub training_date: Option<NaiveDate>,

    #[serde(default)]
    pub training_duration_minutes: i64,

    pub action_type: ActionType,
}

/// Immutable record of one trainer-workload-affecting action
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", try_from = "RawWorkloadEvent")]
pub struct WorkloadEvent {
    trainer_username: String,
    trainer_first_name: String,
    trainer_last_name: String,
    is_active: bool,
    training_date: NaiveDate,
    training_duration_minutes: u32,
    action_type: ActionType,
    transaction_id: String,
}

/// Unvalidated wire shape; every decoded event goes through `WorkloadEvent::build`
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawWorkloadEvent {
    #[serde(default)]
    trainer_username: String,
    #[serde(default)]
    trainer_first_name: String,
    #[serde(default)]
    trainer_last_name: String,
    #[serde(default)]
    is_active: bool,
    training_date: Option<NaiveDate>,
    #[serde(default)]
    training_duration_minutes: i64,
    action_type: ActionType,
    #[serde(default)]
    transaction_id: String,
}

impl TryFrom<RawWorkloadEvent> for WorkloadEvent {
    type Error = ServiceError;

    fn try_from(raw: RawWorkloadEvent) -> Result<Self> {
        let mutation = TrainingMutation {
            trainer_username: raw.trainer_username,
            trainer_first_name: raw.trainer_first_name,
            trainer_last_name: raw.trainer_last_name,
            is_active: raw.is_active,
            training_date: raw.training_date,
            training_duration_minutes: raw.training_duration_minutes,
            action_type: raw.action_type,
        };
        WorkloadEvent::build(&mutation, raw.transaction_id)
    }
}

fn require(value: &str, field: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ServiceError::InvalidEvent(format!("{} is required", field)));
    }
    Ok(trimmed.to_string())
}

impl WorkloadEvent {
    /// Build the event for a mutation with a freshly generated transaction id
    pub fn from_mutation(mutation: &TrainingMutation) -> Result<Self> {
        Self::build(mutation, Uuid::new_v4().to_string())
    }

    /// Build the event for a mutation with a caller-supplied transaction id
    pub fn with_transaction_id(
        mutation: &TrainingMutation,
        transaction_id: impl Into<String>,
    ) -> Result<Self> {
        Self::build(mutation, transaction_id.into())
    }

    fn build(mutation: &TrainingMutation, transaction_id: String) -> Result<Self> {
        let trainer_username = require(&mutation.trainer_username, "trainerUsername")?;
        let trainer_first_name = require(&mutation.trainer_first_name, "trainerFirstName")?;
        let trainer_last_name = require(&mutation.trainer_last_name, "trainerLastName")?;
        let transaction_id = require(&transaction_id, "transactionId")?;

        let training_date = mutation
            .training_date
            .ok_or_else(|| ServiceError::InvalidEvent("trainingDate is required".to_string()))?;

        let training_duration_minutes = u32::try_from(mutation.training_duration_minutes)
            .map_err(|_| {
                ServiceError::InvalidEvent(format!(
                    "trainingDurationMinutes must be a non-negative number of minutes, got {}",
                    mutation.training_duration_minutes
                ))
            })?;

        Ok(Self {
            trainer_username,
            trainer_first_name,
            trainer_last_name,
            is_active: mutation.is_active,
            training_date,
            training_duration_minutes,
            action_type: mutation.action_type,
            transaction_id,
        })
    }

    pub fn trainer_username(&self) -> &str {
        &self.trainer_username
    }

    pub fn trainer_first_name(&self) -> &str {
        &self.trainer_first_name
    }

    pub fn trainer_last_name(&self) -> &str {
        &self.trainer_last_name
    }

    pub fn is_active(&self) -> bool {
        self.is_active
    }

    pub fn training_date(&self) -> NaiveDate {
        self.training_date
    }

    pub fn training_duration_minutes(&self) -> u32 {
        self.training_duration_minutes
    }

    pub fn action_type(&self) -> ActionType {
        self.action_type
    }

    pub fn transaction_id(&self) -> &str {
        &self.transaction_id
    }

    /// Serialize to the JSON wire format
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| ServiceError::SerializationError(e.to_string()))
    }

    /// Decode and validate an event from a JSON payload
    pub fn from_json_slice(payload: &[u8]) -> Result<Self> {
        serde_json::from_slice(payload).map_err(|e| {
            ServiceError::InvalidEvent(format!("Failed to decode workload event: {}", e))
        })
    }
}
