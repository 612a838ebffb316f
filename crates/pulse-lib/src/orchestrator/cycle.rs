//! One forecasting cycle, end to end
//!
//! collect → process → aggregate → forecast → combine → detect → publish.
//! Results become visible to readers only at the publish step, as a single
//! `Arc` swap, so a reader never observes forecasts and anomalies from
//! different cycles.

use crate::anomaly::AnomalyDetector;
use crate::collector::{MetricsProcessor, MetricsSource, NodeAggregator, PipelineError};
use crate::ensemble::{CombinedForecast, EnsembleCombiner};
use crate::forecast::{ForecastBackend, ForecastError, ForecastSeries, DEFAULT_HORIZON};
use crate::health::{components, HealthRegistry};
use crate::history::{SnapshotHistory, DEFAULT_HISTORY_CAPACITY};
use crate::models::{AggregatedSnapshot, Anomaly};
use crate::observability::{ServiceMetrics, StructuredLogger};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

/// Stage a cycle is currently in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleState {
    Idle,
    Collecting,
    Processing,
    Aggregating,
    Forecasting,
    Combining,
    Detecting,
    Publishing,
}

impl fmt::Display for CycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CycleState::Idle => "idle",
            CycleState::Collecting => "collecting",
            CycleState::Processing => "processing",
            CycleState::Aggregating => "aggregating",
            CycleState::Forecasting => "forecasting",
            CycleState::Combining => "combining",
            CycleState::Detecting => "detecting",
            CycleState::Publishing => "publishing",
        };
        f.write_str(name)
    }
}

/// Errors that abort a whole cycle
#[derive(Debug, Error)]
pub enum CycleError {
    #[error("processing failed: {0}")]
    Pipeline(#[from] PipelineError),
}

/// Latest published results, read by the query surface
#[derive(Debug, Clone, Default, Serialize)]
pub struct CycleResults {
    pub forecasts: Option<CombinedForecast>,
    pub anomalies: Vec<Anomaly>,
    pub published_at: Option<DateTime<Utc>>,
}

/// State shared between the cycle task and the query surface
#[derive(Debug, Clone)]
pub struct SharedState {
    results: Arc<RwLock<Arc<CycleResults>>>,
    history: Arc<RwLock<SnapshotHistory>>,
}

impl Default for SharedState {
    fn default() -> Self {
        Self::new()
    }
}

impl SharedState {
    pub fn new() -> Self {
        Self::with_history_capacity(DEFAULT_HISTORY_CAPACITY)
    }

    pub fn with_history_capacity(capacity: usize) -> Self {
        Self {
            results: Arc::new(RwLock::new(Arc::new(CycleResults::default()))),
            history: Arc::new(RwLock::new(SnapshotHistory::new(capacity))),
        }
    }

    /// Snapshot of the last published results
    pub async fn latest(&self) -> Arc<CycleResults> {
        Arc::clone(&*self.results.read().await)
    }

    /// Swap in a new result set
    pub async fn publish(&self, results: CycleResults) {
        let mut guard = self.results.write().await;
        *guard = Arc::new(results);
    }

    /// Snapshot set of the most recent cycle, if any
    pub async fn latest_snapshots(&self) -> Option<Vec<AggregatedSnapshot>> {
        self.history.read().await.latest().cloned()
    }

    pub async fn history_len(&self) -> usize {
        self.history.read().await.len()
    }

    pub async fn flatten_history(&self) -> Vec<AggregatedSnapshot> {
        self.history.read().await.flatten_history()
    }

    /// Append a cycle's snapshots, returning the resulting cache size
    pub async fn record_snapshots(
        &self,
        cycle_start: DateTime<Utc>,
        snapshots: Vec<AggregatedSnapshot>,
    ) -> usize {
        let mut history = self.history.write().await;
        history.put(cycle_start, snapshots);
        history.len()
    }
}

/// Tunables for the orchestrator
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Number of future steps requested from each backend
    pub horizon: usize,
    pub anomaly_threshold: f64,
    /// Directory holding `<backend>_model_*` artifacts
    pub model_dir: PathBuf,
    /// Train untrained backends on the history cache before predicting
    pub auto_train: bool,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            horizon: DEFAULT_HORIZON,
            anomaly_threshold: crate::anomaly::DEFAULT_Z_THRESHOLD,
            model_dir: PathBuf::from("./models"),
            auto_train: false,
        }
    }
}

/// Summary of a completed cycle
#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    pub started_at: DateTime<Utc>,
    pub documents: usize,
    pub collection_errors: usize,
    /// Aggregated rows (distinct timestamps) in this cycle
    pub rows: usize,
    /// Backends that contributed to the combined forecast
    pub backends: Vec<String>,
    pub failed_backends: Vec<String>,
    pub anomalies: usize,
    #[serde(skip)]
    pub duration: Duration,
}

/// How a cycle ended when it did not error
#[derive(Debug, Clone)]
pub enum CycleOutcome {
    /// No documents were collected; nothing was overwritten
    Skipped,
    Completed(CycleReport),
}

/// Outcome of a `train_models` call
#[derive(Debug, Clone, Default)]
pub struct TrainingSummary {
    pub trained: Vec<String>,
    pub failed: Vec<String>,
}

/// Runs forecasting cycles against a fixed set of backends
pub struct CycleOrchestrator {
    source: Arc<dyn MetricsSource>,
    backends: Mutex<Vec<Box<dyn ForecastBackend>>>,
    processor: MetricsProcessor,
    aggregator: NodeAggregator,
    combiner: EnsembleCombiner,
    detector: AnomalyDetector,
    config: OrchestratorConfig,
    shared: SharedState,
    state: RwLock<CycleState>,
    health: HealthRegistry,
    metrics: ServiceMetrics,
    logger: StructuredLogger,
}

impl CycleOrchestrator {
    pub fn new(
        source: Arc<dyn MetricsSource>,
        backends: Vec<Box<dyn ForecastBackend>>,
        config: OrchestratorConfig,
        shared: SharedState,
        health: HealthRegistry,
    ) -> Self {
        Self {
            source,
            backends: Mutex::new(backends),
            processor: MetricsProcessor::new(),
            aggregator: NodeAggregator::new(),
            combiner: EnsembleCombiner::new(),
            detector: AnomalyDetector::new(config.anomaly_threshold),
            config,
            shared,
            state: RwLock::new(CycleState::Idle),
            health,
            metrics: ServiceMetrics::new(),
            logger: StructuredLogger::new("cloudpulse-ml"),
        }
    }

    pub fn shared(&self) -> &SharedState {
        &self.shared
    }

    pub async fn state(&self) -> CycleState {
        *self.state.read().await
    }

    pub async fn backend_names(&self) -> Vec<String> {
        self.backends
            .lock()
            .await
            .iter()
            .map(|b| b.name().to_string())
            .collect()
    }

    /// Register the collector and every backend with the health registry
    pub async fn register_components(&self) {
        self.health.register(components::COLLECTOR).await;
        for name in self.backend_names().await {
            self.health.register(&components::backend(&name)).await;
        }
    }

    fn model_prefix(&self, backend: &str) -> PathBuf {
        model_prefix(&self.config.model_dir, backend)
    }

    /// Restore every backend from disk; returns how many loaded
    pub async fn load_models(&self) -> usize {
        let mut backends = self.backends.lock().await;
        let mut loaded = 0;

        for backend in backends.iter_mut() {
            let name = backend.name().to_string();
            let prefix = self.model_prefix(&name);
            match backend.load(&prefix) {
                Ok(()) => {
                    info!(backend = %name, prefix = ?prefix, "Loaded persisted model");
                    self.health.backend_ready(&name).await;
                    loaded += 1;
                }
                Err(e) => {
                    warn!(backend = %name, error = %e, "Could not load persisted model");
                    self.health.backend_degraded(&name, "model not trained").await;
                }
            }
        }

        loaded
    }

    /// Train and persist every backend on the given history
    pub async fn train_models(&self, history: &[AggregatedSnapshot]) -> TrainingSummary {
        let mut backends = self.backends.lock().await;
        let mut summary = TrainingSummary::default();

        for backend in backends.iter_mut() {
            let name = backend.name().to_string();
            match self.train_backend(&mut **backend, history).await {
                Ok(()) => summary.trained.push(name),
                Err(_) => summary.failed.push(name),
            }
        }

        summary
    }

    async fn train_backend(
        &self,
        backend: &mut dyn ForecastBackend,
        history: &[AggregatedSnapshot],
    ) -> Result<(), ForecastError> {
        let name = backend.name().to_string();
        let prefix = self.model_prefix(&name);

        let result = backend.train(history).map_err(|e| ("train", e)).and_then(|()| {
            backend.save(&prefix).map_err(|e| ("save", e))
        });

        match result {
            Ok(()) => {
                info!(backend = %name, samples = history.len(), "Trained and saved model");
                self.health.backend_ready(&name).await;
                Ok(())
            }
            Err((stage, e)) => {
                self.metrics.inc_backend_failure(&name, stage);
                self.logger.log_backend_failure(&name, stage, &e);
                if !backend.is_trained() {
                    self.health.backend_degraded(&name, e.to_string()).await;
                }
                Err(e)
            }
        }
    }

    async fn transition(&self, next: CycleState) {
        let mut state = self.state.write().await;
        let previous = *state;
        debug!(from = %previous, to = %next, "Cycle state transition");
        *state = next;
    }

    /// Run one full cycle
    ///
    /// Returns `Skipped` when no agent produced data and an error when a
    /// document violates the metrics contract; in both cases the published
    /// results and the history cache are left untouched.
    pub async fn run_cycle(&self) -> Result<CycleOutcome, CycleError> {
        let started = Instant::now();
        let started_at = Utc::now();

        let mut result = self.execute(started_at).await;
        self.transition(CycleState::Idle).await;

        let elapsed = started.elapsed();
        self.metrics.observe_cycle_duration(elapsed.as_secs_f64());

        match &mut result {
            Ok(CycleOutcome::Completed(report)) => {
                report.duration = elapsed;
                self.metrics.inc_cycle("completed");
                self.logger.log_cycle_completed(
                    report.rows,
                    report.backends.len(),
                    report.anomalies,
                    elapsed.as_millis(),
                );
            }
            Ok(CycleOutcome::Skipped) => {
                self.metrics.inc_cycle("skipped");
                self.logger.log_cycle_skipped("no metrics collected from agents");
            }
            Err(e) => {
                self.metrics.inc_cycle("failed");
                self.logger.log_cycle_failed(&*e);
            }
        }

        result
    }

    async fn execute(&self, started_at: DateTime<Utc>) -> Result<CycleOutcome, CycleError> {
        self.transition(CycleState::Collecting).await;
        let collected = self.source.collect().await;
        self.metrics
            .record_collection(collected.success_count(), collected.error_count);

        self.health
            .record_collection(collected.success_count(), collected.error_count)
            .await;
        if collected.documents.is_empty() {
            return Ok(CycleOutcome::Skipped);
        }

        self.transition(CycleState::Processing).await;
        let records = self.processor.process(&collected.documents)?;

        self.transition(CycleState::Aggregating).await;
        let snapshots = self.aggregator.aggregate(&records);
        let entries = self
            .shared
            .record_snapshots(started_at, snapshots.clone())
            .await;
        self.metrics.set_history_entries(entries);

        self.transition(CycleState::Forecasting).await;
        let (forecasts, failed_backends) = self.forecast(&snapshots).await;

        self.transition(CycleState::Combining).await;
        let combined = self.combiner.combine(&forecasts);
        let backends = combined
            .as_ref()
            .map(|c| c.backends.clone())
            .unwrap_or_default();
        self.metrics.set_forecast_backends(backends.len());

        self.transition(CycleState::Detecting).await;
        let anomalies = self.detector.detect(&snapshots);
        for anomaly in &anomalies {
            self.logger.log_anomaly(anomaly);
        }
        self.metrics.set_anomalies_detected(anomalies.len());

        self.transition(CycleState::Publishing).await;
        let anomaly_count = anomalies.len();
        self.shared
            .publish(CycleResults {
                forecasts: combined,
                anomalies,
                published_at: Some(Utc::now()),
            })
            .await;

        Ok(CycleOutcome::Completed(CycleReport {
            started_at,
            documents: collected.documents.len(),
            collection_errors: collected.error_count,
            rows: snapshots.len(),
            backends,
            failed_backends,
            anomalies: anomaly_count,
            duration: Duration::ZERO,
        }))
    }

    /// Ask every backend for a forecast; failures are isolated per backend
    async fn forecast(
        &self,
        snapshots: &[AggregatedSnapshot],
    ) -> (Vec<(String, ForecastSeries)>, Vec<String>) {
        let mut backends = self.backends.lock().await;

        if self.config.auto_train && backends.iter().any(|b| !b.is_trained()) {
            let history = self.shared.flatten_history().await;
            for backend in backends.iter_mut().filter(|b| !b.is_trained()) {
                // Failure is already logged and counted
                let _ = self.train_backend(&mut **backend, &history).await;
            }
        }

        let mut forecasts = Vec::with_capacity(backends.len());
        let mut failed = Vec::new();

        for backend in backends.iter() {
            let name = backend.name().to_string();
            match backend.predict(snapshots, self.config.horizon) {
                Ok(series) => {
                    self.health.backend_ready(&name).await;
                    forecasts.push((name, series));
                }
                Err(e) => {
                    self.metrics.inc_backend_failure(&name, "predict");
                    self.logger.log_backend_failure(&name, "predict", &e);
                    self.health.backend_degraded(&name, e.to_string()).await;
                    failed.push(name);
                }
            }
        }

        (forecasts, failed)
    }
}

/// Artifact prefix for a backend inside the model directory
pub fn model_prefix(model_dir: &Path, backend: &str) -> PathBuf {
    model_dir.join(format!("{}_model", backend))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::{async_trait, CollectionResults};
    use crate::forecast::test_support::synthetic_history;
    use crate::forecast::{future_axis, MetricForecast, StatisticalForecaster};
    use crate::health::ComponentStatus;
    use crate::models::{Metric, RawMetricDocument};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Serves the same documents on every collect
    struct StaticSource {
        documents: Vec<RawMetricDocument>,
        calls: AtomicUsize,
    }

    impl StaticSource {
        fn new(documents: Vec<RawMetricDocument>) -> Arc<Self> {
            Arc::new(Self {
                documents,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl MetricsSource for StaticSource {
        async fn collect(&self) -> CollectionResults {
            self.calls.fetch_add(1, Ordering::SeqCst);
            CollectionResults {
                documents: self.documents.clone(),
                error_count: 0,
            }
        }
    }

    /// Predicts a constant per metric
    struct ConstantBackend {
        name: String,
        value: f64,
        fail: bool,
        trained: bool,
    }

    impl ConstantBackend {
        fn boxed(name: &str, value: f64) -> Box<dyn ForecastBackend> {
            Box::new(Self {
                name: name.to_string(),
                value,
                fail: false,
                trained: true,
            })
        }

        fn failing(name: &str) -> Box<dyn ForecastBackend> {
            Box::new(Self {
                name: name.to_string(),
                value: 0.0,
                fail: true,
                trained: true,
            })
        }
    }

    impl ForecastBackend for ConstantBackend {
        fn name(&self) -> &str {
            &self.name
        }

        fn tracked_metrics(&self) -> Vec<Metric> {
            Metric::ALL.to_vec()
        }

        fn is_trained(&self) -> bool {
            self.trained
        }

        fn train(&mut self, _history: &[AggregatedSnapshot]) -> Result<(), ForecastError> {
            self.trained = true;
            Ok(())
        }

        fn predict(
            &self,
            context: &[AggregatedSnapshot],
            horizon: usize,
        ) -> Result<ForecastSeries, ForecastError> {
            if self.fail {
                return Err(ForecastError::Fit("boom".to_string()));
            }
            let last = context.last().ok_or(ForecastError::EmptyContext)?;
            let mut series =
                ForecastSeries::new(future_axis(last.timestamp, chrono::Duration::minutes(5), horizon));
            for metric in Metric::ALL {
                series.insert(metric, MetricForecast::point(vec![self.value; horizon]));
            }
            Ok(series)
        }

        fn save(&self, _prefix: &Path) -> Result<(), ForecastError> {
            Ok(())
        }

        fn load(&mut self, _prefix: &Path) -> Result<(), ForecastError> {
            Err(ForecastError::NotTrained)
        }
    }

    fn document(node: &str, minute: u32, cpu: f64) -> RawMetricDocument {
        RawMetricDocument {
            node_endpoint: format!("http://{}:8080", node),
            body: json!({
                "timestamp": format!("2024-01-01T00:{:02}:00Z", minute),
                "node_id": node,
                "cpu": {"usage_percent": cpu},
                "memory": {"used_percent": 40.0},
                "network": {"bytes_sent": 100.0, "bytes_recv": 50.0}
            }),
        }
    }

    fn config(horizon: usize) -> OrchestratorConfig {
        OrchestratorConfig {
            horizon,
            model_dir: std::env::temp_dir().join("cloudpulse-unused"),
            ..OrchestratorConfig::default()
        }
    }

    fn orchestrator(
        source: Arc<dyn MetricsSource>,
        backends: Vec<Box<dyn ForecastBackend>>,
    ) -> CycleOrchestrator {
        CycleOrchestrator::new(
            source,
            backends,
            config(3),
            SharedState::new(),
            HealthRegistry::new(),
        )
    }

    #[tokio::test]
    async fn test_zero_documents_leaves_state_unchanged() {
        let orch = orchestrator(StaticSource::new(vec![]), vec![ConstantBackend::boxed("a", 1.0)]);
        let before = orch.shared().latest().await;

        let outcome = orch.run_cycle().await.unwrap();

        assert!(matches!(outcome, CycleOutcome::Skipped));
        let after = orch.shared().latest().await;
        assert!(Arc::ptr_eq(&before, &after));
        assert_eq!(orch.shared().history_len().await, 0);
        assert_eq!(orch.state().await, CycleState::Idle);
    }

    /// Serves each scripted batch once, then nothing with every agent failing
    struct OutageSource {
        batches: std::sync::Mutex<Vec<Vec<RawMetricDocument>>>,
    }

    #[async_trait]
    impl MetricsSource for OutageSource {
        async fn collect(&self) -> CollectionResults {
            match self.batches.lock().unwrap().pop() {
                Some(documents) => CollectionResults {
                    documents,
                    error_count: 0,
                },
                None => CollectionResults {
                    documents: Vec::new(),
                    error_count: 2,
                },
            }
        }
    }

    #[tokio::test]
    async fn test_agent_outage_keeps_previous_results() {
        // One spike in ten minutes is flagged against a flat baseline
        let documents = (0..10)
            .map(|minute| document("a", minute, if minute == 9 { 100.0 } else { 10.0 }))
            .collect();
        let source = Arc::new(OutageSource {
            batches: std::sync::Mutex::new(vec![documents]),
        });
        let health = HealthRegistry::new();
        let orch = CycleOrchestrator::new(
            source,
            vec![ConstantBackend::boxed("x", 7.0)],
            config(2),
            SharedState::new(),
            health.clone(),
        );
        orch.register_components().await;

        tokio_test::assert_ok!(orch.run_cycle().await);
        let published = orch.shared().latest().await;
        assert!(published.forecasts.is_some());
        assert_eq!(published.anomalies.len(), 1);
        assert_eq!(published.anomalies[0].metric, Metric::CpuUsage);

        let outcome = tokio_test::assert_ok!(orch.run_cycle().await);

        assert!(matches!(outcome, CycleOutcome::Skipped));
        let served = orch.shared().latest().await;
        assert!(Arc::ptr_eq(&published, &served));
        assert_eq!(
            served.forecasts.as_ref().unwrap().column("cpu_usage_ensemble").unwrap(),
            vec![Some(7.0); 2]
        );
        assert_eq!(served.anomalies.len(), 1);
        assert_eq!(orch.shared().history_len().await, 1);
        assert_eq!(
            health.status(components::COLLECTOR).await,
            Some(ComponentStatus::Degraded)
        );
    }

    #[tokio::test]
    async fn test_completed_cycle_publishes_results() {
        let source = StaticSource::new(vec![
            document("a", 0, 10.0),
            document("b", 0, 20.0),
            document("a", 1, 30.0),
        ]);
        let orch = orchestrator(
            source.clone(),
            vec![ConstantBackend::boxed("x", 10.0), ConstantBackend::boxed("y", 30.0)],
        );

        let outcome = tokio_test::assert_ok!(orch.run_cycle().await);

        let CycleOutcome::Completed(report) = outcome else {
            panic!("expected a completed cycle");
        };
        assert_eq!(report.documents, 3);
        assert_eq!(report.rows, 2);
        assert_eq!(report.backends, vec!["x".to_string(), "y".to_string()]);
        assert!(report.failed_backends.is_empty());

        let latest = orch.shared().latest().await;
        let forecasts = latest.forecasts.as_ref().unwrap();
        assert_eq!(forecasts.rows.len(), 3);
        assert_eq!(
            forecasts.column("cpu_usage_ensemble").unwrap(),
            vec![Some(20.0); 3]
        );
        assert!(latest.published_at.is_some());

        let cached = orch.shared().latest_snapshots().await.unwrap();
        assert_eq!(cached.len(), 2);
        assert_eq!(cached[0].cpu_usage, 15.0);
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_malformed_document_aborts_cycle() {
        let mut bad = document("a", 0, 10.0);
        bad.body["cpu"] = json!("not an object");
        let source = StaticSource::new(vec![document("b", 0, 10.0), bad]);
        let orch = orchestrator(source, vec![ConstantBackend::boxed("x", 1.0)]);
        let before = orch.shared().latest().await;

        let err = tokio_test::assert_err!(orch.run_cycle().await);

        assert!(matches!(err, CycleError::Pipeline(_)));
        assert!(Arc::ptr_eq(&before, &orch.shared().latest().await));
        assert_eq!(orch.shared().history_len().await, 0);
        assert_eq!(orch.state().await, CycleState::Idle);
    }

    #[tokio::test]
    async fn test_failing_backend_is_isolated() {
        let health = HealthRegistry::new();
        let orch = CycleOrchestrator::new(
            StaticSource::new(vec![document("a", 0, 10.0)]),
            vec![ConstantBackend::failing("broken"), ConstantBackend::boxed("ok", 5.0)],
            config(2),
            SharedState::new(),
            health.clone(),
        );
        orch.register_components().await;

        let CycleOutcome::Completed(report) = orch.run_cycle().await.unwrap() else {
            panic!("expected a completed cycle");
        };

        assert_eq!(report.backends, vec!["ok".to_string()]);
        assert_eq!(report.failed_backends, vec!["broken".to_string()]);
        let latest = orch.shared().latest().await;
        let forecasts = latest.forecasts.as_ref().unwrap();
        assert!(forecasts.has_column("cpu_usage_ok"));
        assert!(!forecasts.has_column("cpu_usage_broken"));
        assert_eq!(
            health.status("backend:broken").await,
            Some(ComponentStatus::Degraded)
        );
        assert_eq!(
            health.status("backend:ok").await,
            Some(ComponentStatus::Healthy)
        );
    }

    #[tokio::test]
    async fn test_all_backends_failing_publishes_empty_forecast() {
        let orch = orchestrator(
            StaticSource::new(vec![document("a", 0, 10.0)]),
            vec![ConstantBackend::failing("broken")],
        );

        orch.run_cycle().await.unwrap();

        let latest = orch.shared().latest().await;
        assert!(latest.forecasts.is_none());
        assert!(latest.published_at.is_some());
    }

    #[tokio::test]
    async fn test_untrained_statistical_backend_is_absent_without_auto_train() {
        let orch = orchestrator(
            StaticSource::new(vec![document("a", 0, 10.0)]),
            vec![
                Box::new(StatisticalForecaster::default()),
                ConstantBackend::boxed("x", 1.0),
            ],
        );

        let CycleOutcome::Completed(report) = orch.run_cycle().await.unwrap() else {
            panic!("expected a completed cycle");
        };

        assert_eq!(report.backends, vec!["x".to_string()]);
        assert_eq!(report.failed_backends, vec!["statistical".to_string()]);
    }

    #[tokio::test]
    async fn test_train_then_load_models_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = OrchestratorConfig {
            model_dir: dir.path().to_path_buf(),
            ..OrchestratorConfig::default()
        };
        let history = synthetic_history(40);

        let trainer = CycleOrchestrator::new(
            StaticSource::new(vec![]),
            crate::forecast::default_backends(),
            cfg.clone(),
            SharedState::new(),
            HealthRegistry::new(),
        );
        let summary = trainer.train_models(&history).await;
        assert_eq!(
            summary.trained,
            vec!["sequence".to_string(), "statistical".to_string()]
        );
        assert!(summary.failed.is_empty());
        assert!(dir.path().join("sequence_model_metadata.json").exists());
        assert!(dir.path().join("statistical_model_metadata.json").exists());

        let fresh = CycleOrchestrator::new(
            StaticSource::new(vec![]),
            crate::forecast::default_backends(),
            cfg,
            SharedState::new(),
            HealthRegistry::new(),
        );
        assert_eq!(fresh.load_models().await, 2);
    }

    #[tokio::test]
    async fn test_train_models_isolates_insufficient_data() {
        let dir = tempfile::tempdir().unwrap();
        let orch = CycleOrchestrator::new(
            StaticSource::new(vec![]),
            crate::forecast::default_backends(),
            OrchestratorConfig {
                model_dir: dir.path().to_path_buf(),
                ..OrchestratorConfig::default()
            },
            SharedState::new(),
            HealthRegistry::new(),
        );

        // Enough for the statistical model, too short for a 12-step window
        let summary = orch.train_models(&synthetic_history(11)).await;

        assert_eq!(summary.trained, vec!["statistical".to_string()]);
        assert_eq!(summary.failed, vec!["sequence".to_string()]);
    }

    #[tokio::test]
    async fn test_auto_train_uses_history_cache() {
        let dir = tempfile::tempdir().unwrap();
        let shared = SharedState::new();
        for (i, chunk) in synthetic_history(30).chunks(10).enumerate() {
            let key = Utc::now() - chrono::Duration::hours(3 - i as i64);
            shared.record_snapshots(key, chunk.to_vec()).await;
        }

        let orch = CycleOrchestrator::new(
            StaticSource::new(vec![document("a", 0, 10.0)]),
            vec![Box::new(StatisticalForecaster::default())],
            OrchestratorConfig {
                horizon: 4,
                model_dir: dir.path().to_path_buf(),
                auto_train: true,
                ..OrchestratorConfig::default()
            },
            shared,
            HealthRegistry::new(),
        );

        let CycleOutcome::Completed(report) = orch.run_cycle().await.unwrap() else {
            panic!("expected a completed cycle");
        };

        assert_eq!(report.backends, vec!["statistical".to_string()]);
        let latest = orch.shared().latest().await;
        assert_eq!(latest.forecasts.as_ref().unwrap().rows.len(), 4);
    }

    #[test]
    fn test_model_prefix_layout() {
        assert_eq!(
            model_prefix(Path::new("/models"), "sequence"),
            PathBuf::from("/models/sequence_model")
        );
    }
}
