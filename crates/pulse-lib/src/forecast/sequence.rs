//! Windowed autoregressive forecaster
//!
//! Each metric is min-max scaled and modeled as a ridge-regularized linear
//! function of its previous `window` values. Multi-step forecasts feed each
//! prediction back into the window.

use super::persistence::{artifact_path, read_json, write_json};
use super::series::{future_axis, ForecastSeries, MetricForecast};
use super::{check_predict_args, ForecastBackend, ForecastError, DEFAULT_STRIDE_SECS};
use crate::models::{AggregatedSnapshot, Metric};
use crate::stats::solve_linear_system;
use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use std::path::Path;
use tracing::{debug, info};

/// Default number of lagged samples per prediction (1 hour at 5 minutes)
pub const DEFAULT_WINDOW: usize = 12;

const DEFAULT_RIDGE: f64 = 1e-3;

/// Per-metric min/max bounds observed during training
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct MinMaxScaler {
    bounds: BTreeMap<Metric, (f64, f64)>,
}

impl MinMaxScaler {
    fn fit(history: &[AggregatedSnapshot], metrics: &[Metric]) -> Self {
        let bounds = metrics
            .iter()
            .map(|&m| {
                let (lo, hi) = history.iter().map(|row| row.value(m)).fold(
                    (f64::INFINITY, f64::NEG_INFINITY),
                    |(lo, hi), v| (lo.min(v), hi.max(v)),
                );
                (m, (lo, hi))
            })
            .collect();
        Self { bounds }
    }

    fn transform(&self, metric: Metric, value: f64) -> f64 {
        match self.bounds.get(&metric) {
            Some(&(lo, hi)) if hi - lo > f64::EPSILON => (value - lo) / (hi - lo),
            _ => 0.0,
        }
    }

    fn inverse(&self, metric: Metric, scaled: f64) -> f64 {
        match self.bounds.get(&metric) {
            Some(&(lo, hi)) => scaled * (hi - lo) + lo,
            None => scaled,
        }
    }
}

/// Lag weights (oldest first) and intercept for one metric
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct LagModel {
    weights: Vec<f64>,
    intercept: f64,
}

impl LagModel {
    fn step(&self, window: &VecDeque<f64>) -> f64 {
        self.intercept
            + self
                .weights
                .iter()
                .zip(window.iter())
                .map(|(w, x)| w * x)
                .sum::<f64>()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SequenceMetadata {
    window: usize,
    features: Vec<Metric>,
    stride_secs: i64,
    is_trained: bool,
    model_checksum: String,
}

/// Autoregressive stand-in for a recurrent sequence model
pub struct SequenceForecaster {
    window: usize,
    ridge: f64,
    stride: Duration,
    features: Vec<Metric>,
    scaler: Option<MinMaxScaler>,
    models: BTreeMap<Metric, LagModel>,
    is_trained: bool,
}

impl SequenceForecaster {
    pub fn new(window: usize) -> Self {
        Self {
            window: window.max(1),
            ridge: DEFAULT_RIDGE,
            stride: Duration::seconds(DEFAULT_STRIDE_SECS),
            features: Metric::ALL.to_vec(),
            scaler: None,
            models: BTreeMap::new(),
            is_trained: false,
        }
    }

    pub fn with_stride(mut self, stride: Duration) -> Self {
        self.stride = stride;
        self
    }

    pub fn window(&self) -> usize {
        self.window
    }

    fn fit_metric(&self, scaled: &[f64]) -> Result<LagModel, ForecastError> {
        let p = self.window;
        let dim = p + 1;
        let mut xtx = vec![vec![0.0; dim]; dim];
        let mut xty = vec![0.0; dim];

        for t in p..scaled.len() {
            // Lags followed by a constant term for the intercept
            let mut row: Vec<f64> = scaled[t - p..t].to_vec();
            row.push(1.0);
            for i in 0..dim {
                xty[i] += row[i] * scaled[t];
                for j in 0..dim {
                    xtx[i][j] += row[i] * row[j];
                }
            }
        }
        for (i, r) in xtx.iter_mut().enumerate().take(p) {
            r[i] += self.ridge;
        }

        let mut solution = solve_linear_system(xtx, xty)
            .ok_or_else(|| ForecastError::Fit("singular lag matrix".to_string()))?;
        let intercept = solution.pop().unwrap_or(0.0);
        Ok(LagModel {
            weights: solution,
            intercept,
        })
    }

    fn model_paths(prefix: &Path) -> (std::path::PathBuf, std::path::PathBuf, std::path::PathBuf) {
        (
            artifact_path(prefix, "model.json"),
            artifact_path(prefix, "scaler.json"),
            artifact_path(prefix, "metadata.json"),
        )
    }
}

impl Default for SequenceForecaster {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW)
    }
}

impl ForecastBackend for SequenceForecaster {
    fn name(&self) -> &str {
        "sequence"
    }

    fn tracked_metrics(&self) -> Vec<Metric> {
        self.features.clone()
    }

    fn is_trained(&self) -> bool {
        self.is_trained
    }

    fn train(&mut self, history: &[AggregatedSnapshot]) -> Result<(), ForecastError> {
        let required = self.window + 1;
        if history.len() < required {
            return Err(ForecastError::InsufficientData {
                required,
                actual: history.len(),
            });
        }

        let mut rows = history.to_vec();
        rows.sort_by_key(|r| r.timestamp);

        let scaler = MinMaxScaler::fit(&rows, &self.features);
        let mut models = BTreeMap::new();
        for &metric in &self.features {
            let scaled: Vec<f64> = rows
                .iter()
                .map(|r| scaler.transform(metric, r.value(metric)))
                .collect();
            models.insert(metric, self.fit_metric(&scaled)?);
        }

        self.scaler = Some(scaler);
        self.models = models;
        self.is_trained = true;

        info!(
            samples = rows.len(),
            window = self.window,
            "Sequence model training completed"
        );
        Ok(())
    }

    fn predict(
        &self,
        context: &[AggregatedSnapshot],
        horizon: usize,
    ) -> Result<ForecastSeries, ForecastError> {
        check_predict_args(self.is_trained, context, horizon)?;
        let scaler = self.scaler.as_ref().ok_or(ForecastError::NotTrained)?;

        let tail = &context[context.len().saturating_sub(self.window)..];
        let last_timestamp = tail[tail.len() - 1].timestamp;
        let mut series = ForecastSeries::new(future_axis(last_timestamp, self.stride, horizon));

        for (&metric, model) in &self.models {
            // Short contexts are left-padded with their earliest row
            let mut window: VecDeque<f64> = VecDeque::with_capacity(self.window);
            let pad = self.window - tail.len();
            for _ in 0..pad {
                window.push_back(scaler.transform(metric, tail[0].value(metric)));
            }
            for row in tail {
                window.push_back(scaler.transform(metric, row.value(metric)));
            }

            let mut values = Vec::with_capacity(horizon);
            for _ in 0..horizon {
                let next = model.step(&window);
                window.pop_front();
                window.push_back(next);
                values.push(scaler.inverse(metric, next));
            }
            series.insert(metric, MetricForecast::point(values));
        }

        debug!(horizon, context_rows = context.len(), "Sequence forecast generated");
        Ok(series)
    }

    fn save(&self, prefix: &Path) -> Result<(), ForecastError> {
        if !self.is_trained {
            return Err(ForecastError::NotTrained);
        }
        let scaler = self.scaler.as_ref().ok_or(ForecastError::NotTrained)?;
        let (model_path, scaler_path, metadata_path) = Self::model_paths(prefix);

        let model_checksum = write_json(&model_path, &self.models)?;
        write_json(&scaler_path, scaler)?;
        write_json(
            &metadata_path,
            &SequenceMetadata {
                window: self.window,
                features: self.features.clone(),
                stride_secs: self.stride.num_seconds(),
                is_trained: self.is_trained,
                model_checksum,
            },
        )?;

        info!(prefix = %prefix.display(), "Sequence model saved");
        Ok(())
    }

    fn load(&mut self, prefix: &Path) -> Result<(), ForecastError> {
        let (model_path, scaler_path, metadata_path) = Self::model_paths(prefix);

        let metadata: SequenceMetadata = read_json(&metadata_path, None)?;
        let models: BTreeMap<Metric, LagModel> =
            read_json(&model_path, Some(&metadata.model_checksum))?;
        let scaler: MinMaxScaler = read_json(&scaler_path, None)?;

        if metadata.window == 0 {
            return Err(ForecastError::Fit("window must be at least 1".to_string()));
        }
        if metadata.stride_secs <= 0 {
            return Err(ForecastError::Fit(format!(
                "stride must be positive, got {}s",
                metadata.stride_secs
            )));
        }
        if models.values().any(|m| m.weights.len() != metadata.window) {
            return Err(ForecastError::Fit(format!(
                "lag weights do not match window {}",
                metadata.window
            )));
        }

        self.window = metadata.window;
        self.features = metadata.features;
        self.stride = Duration::seconds(metadata.stride_secs);
        self.is_trained = metadata.is_trained;
        self.models = models;
        self.scaler = Some(scaler);

        info!(prefix = %prefix.display(), "Sequence model loaded");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forecast::test_support::synthetic_history;
    use tempfile::TempDir;

    #[test]
    fn test_train_requires_window_plus_one() {
        let mut model = SequenceForecaster::new(12);
        let err = model.train(&synthetic_history(12)).unwrap_err();
        assert!(matches!(
            err,
            ForecastError::InsufficientData { required: 13, actual: 12 }
        ));
        assert!(!model.is_trained());
    }

    #[test]
    fn test_predict_before_train_fails() {
        let model = SequenceForecaster::default();
        let err = model.predict(&synthetic_history(5), 3).unwrap_err();
        assert!(matches!(err, ForecastError::NotTrained));
    }

    #[test]
    fn test_predict_shape_and_axis() {
        let history = synthetic_history(60);
        let mut model = SequenceForecaster::default();
        model.train(&history).unwrap();

        let series = model.predict(&history, 24).unwrap();

        assert_eq!(series.len(), 24);
        assert_eq!(series.timestamps[0], history[59].timestamp + Duration::minutes(5));
        for metric in Metric::ALL {
            let column = series.get(metric).unwrap();
            assert_eq!(column.values.len(), 24);
            assert!(column.values.iter().all(|v| v.is_finite()));
            assert!(column.lower.is_none());
        }
    }

    #[test]
    fn test_learns_constant_series() {
        let mut history = synthetic_history(40);
        for row in &mut history {
            row.memory_usage = 70.0;
        }
        let mut model = SequenceForecaster::new(4);
        model.train(&history).unwrap();

        let series = model.predict(&history, 5).unwrap();
        for v in &series.get(Metric::MemoryUsage).unwrap().values {
            assert!((v - 70.0).abs() < 1e-6, "got {}", v);
        }
    }

    #[test]
    fn test_short_context_is_padded() {
        let history = synthetic_history(40);
        let mut model = SequenceForecaster::default();
        model.train(&history).unwrap();

        let series = model.predict(&history[..2], 3).unwrap();
        assert_eq!(series.len(), 3);
        assert_eq!(series.timestamps[0], history[1].timestamp + Duration::minutes(5));
    }

    #[test]
    fn test_save_load_reproduces_predictions() {
        let dir = TempDir::new().unwrap();
        let prefix = dir.path().join("sequence_model");
        let history = synthetic_history(50);

        let mut model = SequenceForecaster::default();
        model.train(&history).unwrap();
        model.save(&prefix).unwrap();

        let mut restored = SequenceForecaster::new(3);
        restored.load(&prefix).unwrap();

        assert!(restored.is_trained());
        assert_eq!(restored.window(), DEFAULT_WINDOW);
        assert_eq!(
            model.predict(&history[30..], 12).unwrap(),
            restored.predict(&history[30..], 12).unwrap()
        );
    }

    #[test]
    fn test_load_rejects_tampered_weights() {
        let dir = TempDir::new().unwrap();
        let prefix = dir.path().join("sequence_model");
        let mut model = SequenceForecaster::new(3);
        model.train(&synthetic_history(20)).unwrap();
        model.save(&prefix).unwrap();

        let weights = artifact_path(&prefix, "model.json");
        let mut content = std::fs::read_to_string(&weights).unwrap();
        content.push(' ');
        std::fs::write(&weights, content).unwrap();

        let mut restored = SequenceForecaster::default();
        let err = restored.load(&prefix).unwrap_err();
        assert!(matches!(err, ForecastError::ChecksumMismatch { .. }));
        assert!(!restored.is_trained());
    }

    /// Rewrite a saved artifact set with an empty model and edited metadata
    fn rewrite_metadata(prefix: &Path, edit: impl FnOnce(&mut SequenceMetadata)) {
        let (model_path, _, metadata_path) = SequenceForecaster::model_paths(prefix);
        let mut metadata: SequenceMetadata = read_json(&metadata_path, None).unwrap();
        metadata.model_checksum =
            write_json(&model_path, &BTreeMap::<Metric, LagModel>::new()).unwrap();
        edit(&mut metadata);
        write_json(&metadata_path, &metadata).unwrap();
    }

    #[test]
    fn test_load_rejects_degenerate_metadata() {
        let dir = TempDir::new().unwrap();
        let prefix = dir.path().join("sequence_model");
        let mut model = SequenceForecaster::new(3);
        model.train(&synthetic_history(20)).unwrap();
        model.save(&prefix).unwrap();

        rewrite_metadata(&prefix, |m| m.window = 0);
        let mut restored = SequenceForecaster::default();
        assert!(matches!(restored.load(&prefix), Err(ForecastError::Fit(_))));
        assert!(!restored.is_trained());

        rewrite_metadata(&prefix, |m| {
            m.window = 3;
            m.stride_secs = 0;
        });
        assert!(matches!(restored.load(&prefix), Err(ForecastError::Fit(_))));
        assert!(!restored.is_trained());
    }

    #[test]
    fn test_save_untrained_fails() {
        let dir = TempDir::new().unwrap();
        let model = SequenceForecaster::default();
        assert!(matches!(
            model.save(&dir.path().join("m")),
            Err(ForecastError::NotTrained)
        ));
    }
}
