//! Synchronous workload delivery
//!
//! `HttpWorkloadClient` posts events straight to the workload service.
//! `CircuitBreakerWorkloadClient` guards it with a `CircuitBreaker` and hands
//! denied or failed calls to a fallback client, so a reporting call never
//! fails because the workload service is down.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::config::AppConfig;
use crate::core::circuit_breaker::CircuitBreaker;
use crate::core::error::{Result, ServiceError};
use crate::events::models::WorkloadEvent;
use crate::metrics;

/// Path of the workload update endpoint on the workload service
pub const WORKLOAD_UPDATE_PATH: &str = "/api/v1/trainer-workload";

/// Delivers a workload event to the workload service
#[async_trait]
pub trait WorkloadClient: Send + Sync {
    async fn update_workload(&self, event: &WorkloadEvent, auth_token: &str) -> Result<()>;
}

/// Client calling the workload service over HTTP
#[derive(Debug, Clone)]
pub struct HttpWorkloadClient {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpWorkloadClient {
    /// Create a client for the service at `base_url`, bounding every call by `timeout`
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| {
                ServiceError::ConfigurationError(format!("Failed to build HTTP client: {}", e))
            })?;

        Ok(Self {
            client,
            endpoint: format!("{}{}", base_url.trim_end_matches('/'), WORKLOAD_UPDATE_PATH),
        })
    }

    pub fn from_config(config: &AppConfig) -> Result<Self> {
        Self::new(&config.workload_service_url, config.workload_service_timeout)
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl WorkloadClient for HttpWorkloadClient {
    async fn update_workload(&self, event: &WorkloadEvent, auth_token: &str) -> Result<()> {
        let mut request = self.client.post(&self.endpoint).json(event);
        if !auth_token.trim().is_empty() {
            request = request.bearer_auth(auth_token.trim());
        }

        let _timer = metrics::Timer::new("workload_http_call");
        let response = request.send().await.map_err(|e| {
            ServiceError::TransportFailure(format!(
                "Workload service call to {} failed: {}",
                self.endpoint, e
            ))
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ServiceError::TransportFailure(format!(
                "Workload service returned {} for transaction {}",
                status,
                event.transaction_id()
            )));
        }

        tracing::debug!(
            trainer = %event.trainer_username(),
            transaction_id = %event.transaction_id(),
            "Workload service accepted update"
        );
        Ok(())
    }
}

/// Fallback used while the workload service is unavailable
///
/// Only logs; the update is not delivered.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingFallbackClient;

#[async_trait]
impl WorkloadClient for LoggingFallbackClient {
    async fn update_workload(&self, event: &WorkloadEvent, _auth_token: &str) -> Result<()> {
        tracing::warn!(
            trainer = %event.trainer_username(),
            transaction_id = %event.transaction_id(),
            action = %event.action_type(),
            "Workload service unavailable, update for trainer {} not delivered",
            event.trainer_username()
        );
        Ok(())
    }
}

/// Breaker-guarded client: primary when allowed, fallback otherwise
pub struct CircuitBreakerWorkloadClient {
    primary: Arc<dyn WorkloadClient>,
    fallback: Arc<dyn WorkloadClient>,
    breaker: Arc<CircuitBreaker>,
}

impl CircuitBreakerWorkloadClient {
    pub fn new(
        primary: Arc<dyn WorkloadClient>,
        fallback: Arc<dyn WorkloadClient>,
        breaker: Arc<CircuitBreaker>,
    ) -> Self {
        Self {
            primary,
            fallback,
            breaker,
        }
    }

    pub fn breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }

    async fn run_fallback(&self, event: &WorkloadEvent, auth_token: &str) {
        if let Err(e) = self.fallback.update_workload(event, auth_token).await {
            tracing::error!(
                transaction_id = %event.transaction_id(),
                "Workload fallback failed: {}",
                e
            );
        }
    }
}

#[async_trait]
impl WorkloadClient for CircuitBreakerWorkloadClient {
    /// Always resolves `Ok(())`; transport failures end in the fallback
    async fn update_workload(&self, event: &WorkloadEvent, auth_token: &str) -> Result<()> {
        let Some(permit) = self.breaker.allow_request() else {
            tracing::debug!(
                circuit = %self.breaker.name(),
                state = %self.breaker.state(),
                transaction_id = %event.transaction_id(),
                "Circuit open, skipping workload service"
            );
            metrics::record_circuit_breaker_call("short_circuited");
            self.run_fallback(event, auth_token).await;
            return Ok(());
        };

        // Dropping this future before the primary resolves drops the permit
        match self.primary.update_workload(event, auth_token).await {
            Ok(()) => {
                permit.success();
                metrics::record_circuit_breaker_call("success");
            }
            Err(e) => {
                permit.failure();
                metrics::record_circuit_breaker_call("failure");
                tracing::error!(
                    circuit = %self.breaker.name(),
                    trainer = %event.trainer_username(),
                    transaction_id = %event.transaction_id(),
                    consecutive_failures = self.breaker.consecutive_failures(),
                    "Workload service call failed: {}",
                    e
                );
                self.run_fallback(event, auth_token).await;
            }
        }

        Ok(())
    }
}
