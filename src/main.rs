use std::net::SocketAddr;
use std::sync::Arc;

use tokio::signal;

use gym_workload::config::AppConfig;
use gym_workload::events::{self, EventHandler};
use gym_workload::service::{AppState, InMemoryWorkloadLedger, WorkloadAggregator};
use gym_workload::{api, init_logging, metrics, GymWorkload};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env before reading configuration so logging picks it up
    dotenvy::dotenv().ok();

    let config = AppConfig::from_env()?;
    init_logging(&config.log_level);

    tracing::info!("Starting trainer workload service v{}", GymWorkload::version());
    config.print_config();

    metrics::init_metrics();

    let start_time = std::time::Instant::now();
    let event_system = match events::init_event_system(&config).await {
        Ok(system) => system,
        Err(err) => {
            tracing::error!("Failed to initialize event system: {}", err);
            return Err(err.into());
        }
    };

    let aggregator: Option<Arc<dyn WorkloadAggregator>> = if config.aggregator_enabled {
        let ledger: Arc<dyn WorkloadAggregator> = Arc::new(InMemoryWorkloadLedger::new());
        event_system.start_consumers(EventHandler::new(ledger.clone()))?;
        Some(ledger)
    } else {
        None
    };

    let app_state = AppState::from_config(
        config.clone(),
        Some(event_system.publisher.clone()),
        aggregator,
    )?;
    tracing::info!("Workload service initialized in {:?}", start_time.elapsed());

    let app = api::build_router(Arc::new(app_state));

    let host: std::net::IpAddr = config.host.parse()?;
    let addr = SocketAddr::from((host, config.port));
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Trainer workload service listening on {}", addr);

    if let Err(err) = axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        tracing::error!("Server error: {}", err);
        return Err(err.into());
    }

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}
