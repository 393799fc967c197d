// Re-export all modules to make them accessible to tests
pub mod api;
pub mod service;
pub mod models;
pub mod core;
pub mod config;
pub mod events;
pub mod metrics;

use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

/// Trainer workload reporting library
///
/// Reports training-session mutations to the trainer workload aggregator,
/// either through a Kafka topic or synchronously over HTTP behind a circuit
/// breaker. The entry point is `service::WorkloadReporter::report`; the
/// binary in `main.rs` wires it to an axum router.
pub struct GymWorkload;

impl GymWorkload {
    pub fn version() -> &'static str {
        env!("CARGO_PKG_VERSION")
    }
}

/// Initialize logging for the application
///
/// `RUST_LOG` takes precedence over `log_level` when set.
pub fn init_logging(log_level: &str) {
    let result = tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level)))
        .with(
            fmt::layer()
                .with_span_events(fmt::format::FmtSpan::CLOSE)
                .with_target(true)
                .compact(),
        )
        .try_init();

    if let Err(e) = result {
        eprintln!("Logging already initialized: {}", e);
    }
}
