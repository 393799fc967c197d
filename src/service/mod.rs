pub mod aggregator;
pub mod workload_client;
pub mod workload_service;

pub use aggregator::{ApplyOutcome, InMemoryWorkloadLedger, TrainerWorkloadSummary, WorkloadAggregator};
pub use workload_client::{
    CircuitBreakerWorkloadClient, HttpWorkloadClient, LoggingFallbackClient, WorkloadClient,
};
pub use workload_service::WorkloadReporter;

use std::sync::Arc;
use std::time::SystemTime;

use crate::config::AppConfig;
use crate::core::circuit_breaker::CircuitBreaker;
use crate::core::error::Result;
use crate::events::producer::WorkloadPublisher;

/// Name of the breaker guarding the workload service
pub const WORKLOAD_BREAKER_NAME: &str = "workload-service";

/// Build information structure for the service
#[derive(Debug, Clone)]
pub struct BuildInfo {
    pub version: String,
    pub build_timestamp: String,
    pub start_time: SystemTime,
}

impl BuildInfo {
    pub fn current() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            build_timestamp: chrono::Utc::now().to_rfc3339(),
            start_time: SystemTime::now(),
        }
    }
}

/// Application state that contains shared components
#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub reporter: WorkloadReporter,

    /// Breaker shared with the synchronous client, exposed for the admin routes
    pub breaker: Arc<CircuitBreaker>,

    /// Present when this instance also aggregates workload
    pub aggregator: Option<Arc<dyn WorkloadAggregator>>,

    pub publisher: Option<Arc<dyn WorkloadPublisher>>,
    pub build_info: BuildInfo,
}

impl AppState {
    /// Wire the reporter from configuration around an existing publisher and aggregator
    pub fn from_config(
        config: AppConfig,
        publisher: Option<Arc<dyn WorkloadPublisher>>,
        aggregator: Option<Arc<dyn WorkloadAggregator>>,
    ) -> Result<Self> {
        let breaker = Arc::new(CircuitBreaker::new(
            WORKLOAD_BREAKER_NAME,
            config.circuit_breaker_config(),
        ));
        let client: Arc<dyn WorkloadClient> = Arc::new(CircuitBreakerWorkloadClient::new(
            Arc::new(HttpWorkloadClient::from_config(&config)?),
            Arc::new(LoggingFallbackClient),
            breaker.clone(),
        ));

        Ok(Self::new(config, publisher, client, breaker, aggregator))
    }

    pub fn new(
        config: AppConfig,
        publisher: Option<Arc<dyn WorkloadPublisher>>,
        client: Arc<dyn WorkloadClient>,
        breaker: Arc<CircuitBreaker>,
        aggregator: Option<Arc<dyn WorkloadAggregator>>,
    ) -> Self {
        let reporter = WorkloadReporter::new(config.reporting_mode, publisher.clone(), client);

        Self {
            config,
            reporter,
            breaker,
            aggregator,
            publisher,
            build_info: BuildInfo::current(),
        }
    }
}
