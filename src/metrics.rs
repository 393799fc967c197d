use lazy_static::lazy_static;
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Instant;

// Global Prometheus recorder, installed on first use
lazy_static! {
    static ref PROMETHEUS: Option<PrometheusHandle> = {
        const EXPONENTIAL_SECONDS: &[f64] = &[
            0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
        ];

        let installed = PrometheusBuilder::new()
            .set_buckets_for_metric(
                Matcher::Full("operation_duration_seconds".to_string()),
                EXPONENTIAL_SECONDS,
            )
            .and_then(|builder| builder.install_recorder());

        match installed {
            Ok(handle) => Some(handle),
            Err(e) => {
                tracing::error!("Failed to install Prometheus recorder: {}", e);
                None
            }
        }
    };
}

/// Records the duration of an operation when dropped
///
/// ```ignore
/// let _timer = metrics::Timer::new("kafka_send");
/// // ... timed work ...
/// ```
pub struct Timer {
    name: String,
    start: Instant,
}

impl Timer {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            start: Instant::now(),
        }
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        let duration = self.start.elapsed();
        histogram!("operation_duration_seconds", duration.as_secs_f64(), "operation" => self.name.clone());
    }
}

/// Gather and return Prometheus metrics
pub fn gather_metrics() -> String {
    PROMETHEUS
        .as_ref()
        .map(|handle| handle.render())
        .unwrap_or_default()
}

/// Record request count for a specific endpoint
pub fn record_request(endpoint: &str, status_code: u16) {
    counter!("api_requests_total", 1, "endpoint" => endpoint.to_string(), "status" => status_code.to_string());
}

/// Record Kafka events
pub fn record_kafka_event(topic: &str, status: &str) {
    counter!("kafka_events_total", 1, "topic" => topic.to_string(), "status" => status.to_string());
}

/// Record the outcome of one workload report
pub fn record_workload_report(mode: &str, status: &str) {
    counter!("workload_reports_total", 1, "mode" => mode.to_string(), "status" => status.to_string());
}

/// Record how a breaker-guarded call was served
///
/// Outcomes: `success`, `failure` (primary failed, fallback served) and
/// `short_circuited` (breaker denied the call).
pub fn record_circuit_breaker_call(outcome: &str) {
    counter!("circuit_breaker_calls_total", 1, "outcome" => outcome.to_string());
}

/// Record an aggregator event outcome
pub fn record_aggregator_event(outcome: &str) {
    counter!("aggregator_events_total", 1, "outcome" => outcome.to_string());
}

/// Track success rate for operations
pub fn record_operation_result(operation: &str, success: bool) {
    let status = if success { "success" } else { "failure" };
    counter!("operation_results_total", 1, "operation" => operation.to_string(), "status" => status.to_string());
}

/// Install the recorder and register baseline series
pub fn init_metrics() {
    if PROMETHEUS.is_none() {
        tracing::warn!("Metrics recorder unavailable, /metrics will be empty");
    }

    gauge!("service_info", 1.0,
        "version" => env!("CARGO_PKG_VERSION").to_string()
    );

    // Zero-valued series so dashboards see them before the first event
    counter!("api_requests_total", 0, "endpoint" => "health", "status" => "200");
    counter!("api_requests_total", 0, "endpoint" => "report_workload", "status" => "202");
    counter!("workload_reports_total", 0, "mode" => "async", "status" => "success");
    counter!("workload_reports_total", 0, "mode" => "sync", "status" => "success");
    counter!("circuit_breaker_calls_total", 0, "outcome" => "short_circuited");

    tracing::info!("Metrics system initialized");
}
