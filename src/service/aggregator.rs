//! Trainer workload aggregation
//!
//! The aggregator keeps, per trainer, the cumulative training duration grouped
//! by year and month. It is the consumer side of the workload topic and of the
//! `POST /api/v1/trainer-workload` endpoint. Events are applied at most once
//! per transaction id, so redelivery from the at-least-once transport does not
//! double-count.

use std::collections::{BTreeMap, HashMap, HashSet};

use async_trait::async_trait;
use chrono::Datelike;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::core::error::Result;
use crate::events::models::{ActionType, WorkloadEvent};
use crate::metrics;

/// Result of applying one event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplyOutcome {
    /// The event changed the trainer's totals
    Applied,

    /// The transaction id was seen before; nothing changed
    Duplicate,
}

/// Total minutes for one month
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthSummary {
    pub month: u32,
    pub training_duration_minutes: u64,
}

/// Monthly totals for one year
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct YearSummary {
    pub year: i32,
    pub months: Vec<MonthSummary>,
}

/// Workload summary of a trainer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrainerWorkloadSummary {
    pub trainer_username: String,
    pub trainer_first_name: String,
    pub trainer_last_name: String,
    pub is_active: bool,
    pub years: Vec<YearSummary>,
}

impl TrainerWorkloadSummary {
    /// Minutes recorded for a month, zero when nothing was recorded
    pub fn minutes_for(&self, year: i32, month: u32) -> u64 {
        self.years
            .iter()
            .find(|y| y.year == year)
            .and_then(|y| y.months.iter().find(|m| m.month == month))
            .map(|m| m.training_duration_minutes)
            .unwrap_or(0)
    }
}

/// Contract of the downstream workload aggregator
#[async_trait]
pub trait WorkloadAggregator: Send + Sync {
    /// Apply an ADD (increment) or DELETE (decrement), once per transaction id
    async fn apply(&self, event: &WorkloadEvent) -> Result<ApplyOutcome>;

    /// Current totals for a trainer, if any event was ever applied
    async fn summary(&self, trainer_username: &str) -> Result<Option<TrainerWorkloadSummary>>;
}

#[derive(Debug, Default)]
struct TrainerLedger {
    first_name: String,
    last_name: String,
    is_active: bool,
    /// year -> month -> minutes
    minutes: BTreeMap<i32, BTreeMap<u32, u64>>,
}

#[derive(Debug, Default)]
struct LedgerState {
    trainers: HashMap<String, TrainerLedger>,
    seen_transactions: HashSet<String>,
}

/// Aggregator keeping its ledger in process memory
#[derive(Debug, Default)]
pub struct InMemoryWorkloadLedger {
    state: RwLock<LedgerState>,
}

impl InMemoryWorkloadLedger {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl WorkloadAggregator for InMemoryWorkloadLedger {
    async fn apply(&self, event: &WorkloadEvent) -> Result<ApplyOutcome> {
        let mut state = self.state.write().await;

        if !state.seen_transactions.insert(event.transaction_id().to_string()) {
            tracing::info!(
                transaction_id = %event.transaction_id(),
                trainer = %event.trainer_username(),
                "Skipping already applied workload transaction"
            );
            metrics::record_aggregator_event("duplicate");
            return Ok(ApplyOutcome::Duplicate);
        }

        let ledger = state
            .trainers
            .entry(event.trainer_username().to_string())
            .or_default();
        ledger.first_name = event.trainer_first_name().to_string();
        ledger.last_name = event.trainer_last_name().to_string();
        ledger.is_active = event.is_active();

        let date = event.training_date();
        let bucket = ledger
            .minutes
            .entry(date.year())
            .or_default()
            .entry(date.month())
            .or_insert(0);
        let duration = u64::from(event.training_duration_minutes());

        match event.action_type() {
            ActionType::Add => *bucket += duration,
            ActionType::Delete => {
                if *bucket < duration {
                    tracing::warn!(
                        trainer = %event.trainer_username(),
                        transaction_id = %event.transaction_id(),
                        recorded = *bucket,
                        requested = duration,
                        "DELETE exceeds recorded workload, clamping month to zero"
                    );
                }
                *bucket = bucket.saturating_sub(duration);
            }
        }

        tracing::debug!(
            trainer = %event.trainer_username(),
            year = date.year(),
            month = date.month(),
            minutes = *bucket,
            "Workload updated"
        );
        metrics::record_aggregator_event("applied");
        Ok(ApplyOutcome::Applied)
    }

    async fn summary(&self, trainer_username: &str) -> Result<Option<TrainerWorkloadSummary>> {
        let state = self.state.read().await;

        Ok(state.trainers.get(trainer_username).map(|ledger| TrainerWorkloadSummary {
            trainer_username: trainer_username.to_string(),
            trainer_first_name: ledger.first_name.clone(),
            trainer_last_name: ledger.last_name.clone(),
            is_active: ledger.is_active,
            years: ledger
                .minutes
                .iter()
                .map(|(year, months)| YearSummary {
                    year: *year,
                    months: months
                        .iter()
                        .map(|(month, minutes)| MonthSummary {
                            month: *month,
                            training_duration_minutes: *minutes,
                        })
                        .collect(),
                })
                .collect(),
        }))
    }
}
