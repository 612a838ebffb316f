//! Observability infrastructure for the forecasting service
//!
//! Provides:
//! - Prometheus metrics (cycle latency, collection results, backend failures, anomalies)
//! - Structured JSON logging with tracing

use crate::models::{Anomaly, Severity};
use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, register_int_gauge,
    Histogram, IntCounter, IntCounterVec, IntGauge,
};
use std::sync::OnceLock;
use tracing::{error, info, warn};

/// Histogram buckets for cycle durations (in seconds)
const CYCLE_BUCKETS: &[f64] = &[0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<ServiceMetricsInner> = OnceLock::new();

/// Inner metrics structure that holds the actual Prometheus metrics
struct ServiceMetricsInner {
    cycle_duration_seconds: Histogram,
    cycles: IntCounterVec,
    agents_collected: IntGauge,
    collection_errors: IntCounter,
    backend_failures: IntCounterVec,
    forecast_backends: IntGauge,
    anomalies_detected: IntGauge,
    history_entries: IntGauge,
}

impl ServiceMetricsInner {
    fn new() -> Self {
        Self {
            cycle_duration_seconds: register_histogram!(
                "cloudpulse_cycle_duration_seconds",
                "Time spent running one forecasting cycle",
                CYCLE_BUCKETS.to_vec()
            )
            .expect("Failed to register cycle_duration_seconds"),

            cycles: register_int_counter_vec!(
                "cloudpulse_cycles_total",
                "Forecasting cycles by outcome",
                &["outcome"]
            )
            .expect("Failed to register cycles_total"),

            agents_collected: register_int_gauge!(
                "cloudpulse_agents_collected",
                "Agents that returned metrics in the latest cycle"
            )
            .expect("Failed to register agents_collected"),

            collection_errors: register_int_counter!(
                "cloudpulse_collection_errors_total",
                "Total number of failed agent fetches"
            )
            .expect("Failed to register collection_errors"),

            backend_failures: register_int_counter_vec!(
                "cloudpulse_backend_failures_total",
                "Forecast backend failures by backend and stage",
                &["backend", "stage"]
            )
            .expect("Failed to register backend_failures"),

            forecast_backends: register_int_gauge!(
                "cloudpulse_forecast_backends",
                "Backends that contributed to the latest combined forecast"
            )
            .expect("Failed to register forecast_backends"),

            anomalies_detected: register_int_gauge!(
                "cloudpulse_anomalies_detected",
                "Anomalies detected in the latest cycle"
            )
            .expect("Failed to register anomalies_detected"),

            history_entries: register_int_gauge!(
                "cloudpulse_history_entries",
                "Cycles currently held in the history cache"
            )
            .expect("Failed to register history_entries"),
        }
    }
}

/// Service metrics for Prometheus exposition
///
/// This is a lightweight handle to the global metrics instance.
/// Multiple clones share the same underlying metrics.
#[derive(Clone)]
pub struct ServiceMetrics {
    _private: (),
}

impl Default for ServiceMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl ServiceMetrics {
    /// Create a new metrics handle (initializes global metrics if needed)
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(ServiceMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &ServiceMetricsInner {
        GLOBAL_METRICS.get_or_init(ServiceMetricsInner::new)
    }

    pub fn observe_cycle_duration(&self, duration_secs: f64) {
        self.inner().cycle_duration_seconds.observe(duration_secs);
    }

    /// Count a cycle outcome (`completed`, `skipped`, `failed`)
    pub fn inc_cycle(&self, outcome: &str) {
        self.inner().cycles.with_label_values(&[outcome]).inc();
    }

    pub fn record_collection(&self, collected: usize, errors: usize) {
        self.inner().agents_collected.set(collected as i64);
        self.inner().collection_errors.inc_by(errors as u64);
    }

    pub fn inc_backend_failure(&self, backend: &str, stage: &str) {
        self.inner()
            .backend_failures
            .with_label_values(&[backend, stage])
            .inc();
    }

    pub fn set_forecast_backends(&self, count: usize) {
        self.inner().forecast_backends.set(count as i64);
    }

    pub fn set_anomalies_detected(&self, count: usize) {
        self.inner().anomalies_detected.set(count as i64);
    }

    pub fn set_history_entries(&self, count: usize) {
        self.inner().history_entries.set(count as i64);
    }
}

/// Structured logger for service events
///
/// Provides consistent JSON-formatted logging for cycles, anomalies
/// and backend failures.
#[derive(Clone)]
pub struct StructuredLogger {
    service: String,
}

impl StructuredLogger {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    pub fn log_startup(&self, version: &str, agents: usize, interval_secs: u64) {
        info!(
            event = "service_started",
            service = %self.service,
            version = %version,
            agents = agents,
            interval_secs = interval_secs,
            "Forecasting service started"
        );
    }

    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "service_shutdown",
            service = %self.service,
            reason = %reason,
            "Forecasting service shutting down"
        );
    }

    pub fn log_cycle_completed(
        &self,
        rows: usize,
        backends: usize,
        anomalies: usize,
        duration_ms: u128,
    ) {
        info!(
            event = "cycle_completed",
            service = %self.service,
            rows = rows,
            backends = backends,
            anomalies = anomalies,
            duration_ms = duration_ms as u64,
            "Forecasting cycle completed"
        );
        if anomalies > 0 {
            warn!(service = %self.service, anomalies = anomalies, "Detected anomalies");
        }
    }

    pub fn log_cycle_skipped(&self, reason: &str) {
        warn!(
            event = "cycle_skipped",
            service = %self.service,
            reason = %reason,
            "Forecasting cycle skipped"
        );
    }

    pub fn log_cycle_failed(&self, error: &dyn std::fmt::Display) {
        error!(
            event = "cycle_failed",
            service = %self.service,
            error = %error,
            "Forecasting cycle aborted"
        );
    }

    pub fn log_backend_failure(&self, backend: &str, stage: &str, error: &dyn std::fmt::Display) {
        error!(
            event = "backend_failed",
            service = %self.service,
            backend = %backend,
            stage = %stage,
            error = %error,
            "Forecast backend failed"
        );
    }

    pub fn log_anomaly(&self, anomaly: &Anomaly) {
        match anomaly.severity {
            Severity::High => {
                warn!(
                    event = "anomaly_detected",
                    service = %self.service,
                    metric = %anomaly.metric,
                    severity = anomaly.severity.as_str(),
                    value = anomaly.value,
                    z_score = anomaly.z_score,
                    timestamp = %anomaly.timestamp,
                    "High severity anomaly detected"
                );
            }
            Severity::Medium => {
                info!(
                    event = "anomaly_detected",
                    service = %self.service,
                    metric = %anomaly.metric,
                    severity = anomaly.severity.as_str(),
                    value = anomaly.value,
                    z_score = anomaly.z_score,
                    timestamp = %anomaly.timestamp,
                    "Anomaly detected"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_metrics_creation() {
        let metrics = ServiceMetrics::new();

        metrics.observe_cycle_duration(0.2);
        metrics.inc_cycle("completed");
        metrics.record_collection(3, 1);
        metrics.inc_backend_failure("sequence", "predict");
        metrics.set_forecast_backends(2);
        metrics.set_anomalies_detected(4);
        metrics.set_history_entries(10);

        let families = prometheus::gather();
        assert!(families
            .iter()
            .any(|f| f.get_name() == "cloudpulse_cycles_total"));
    }

    #[test]
    fn test_structured_logger_creation() {
        let logger = StructuredLogger::new("cloudpulse-ml");
        assert_eq!(logger.service, "cloudpulse-ml");
    }
}
