//! Trend plus daily-seasonality forecaster with uncertainty intervals
//!
//! For each metric a least-squares linear trend is fitted over time, then
//! the mean residual per hour of day is kept as a seasonal offset. The
//! spread of what remains gives symmetric prediction intervals.

use super::persistence::{artifact_path, read_json, write_json};
use super::series::{future_axis, ForecastSeries, MetricForecast};
use super::{check_predict_args, ForecastBackend, ForecastError, DEFAULT_STRIDE_SECS};
use crate::models::{AggregatedSnapshot, Metric};
use crate::stats::{linear_fit, mean, sample_std};
use chrono::{DateTime, Duration, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info, warn};

/// Minimum samples needed to fit one metric
pub const MIN_TRAINING_SAMPLES: usize = 10;

/// Two-sided z value for an 80% interval
pub const INTERVAL_Z: f64 = 1.2816;

const HOURS_PER_DAY: usize = 24;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct TrendModel {
    origin: DateTime<Utc>,
    slope_per_sec: f64,
    intercept: f64,
    hourly_offsets: Vec<Option<f64>>,
    residual_std: f64,
}

impl TrendModel {
    fn fit(rows: &[AggregatedSnapshot], metric: Metric) -> Self {
        let origin = rows[0].timestamp;
        let xs: Vec<f64> = rows.iter().map(|r| seconds_since(origin, r.timestamp)).collect();
        let ys: Vec<f64> = rows.iter().map(|r| r.value(metric)).collect();
        let (slope, intercept) = linear_fit(&xs, &ys);

        let residuals: Vec<f64> = xs
            .iter()
            .zip(&ys)
            .map(|(x, y)| y - (intercept + slope * x))
            .collect();

        let mut buckets: Vec<Vec<f64>> = vec![Vec::new(); HOURS_PER_DAY];
        for (row, r) in rows.iter().zip(&residuals) {
            buckets[row.timestamp.hour() as usize].push(*r);
        }
        let hourly_offsets: Vec<Option<f64>> = buckets
            .iter()
            .map(|b| (!b.is_empty()).then(|| mean(b)))
            .collect();

        let remainder: Vec<f64> = rows
            .iter()
            .zip(&residuals)
            .map(|(row, r)| r - hourly_offsets[row.timestamp.hour() as usize].unwrap_or(0.0))
            .collect();

        Self {
            origin,
            slope_per_sec: slope,
            intercept,
            hourly_offsets,
            residual_std: sample_std(&remainder).unwrap_or(0.0),
        }
    }

    fn point(&self, at: DateTime<Utc>) -> f64 {
        let seasonal = self
            .hourly_offsets
            .get(at.hour() as usize)
            .copied()
            .flatten()
            .unwrap_or(0.0);
        self.intercept + self.slope_per_sec * seconds_since(self.origin, at) + seasonal
    }
}

fn seconds_since(origin: DateTime<Utc>, at: DateTime<Utc>) -> f64 {
    (at - origin).num_milliseconds() as f64 / 1000.0
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StatisticalMetadata {
    metrics: Vec<Metric>,
    stride_secs: i64,
    is_trained: bool,
}

/// Per-metric trend/seasonality models
pub struct StatisticalForecaster {
    metrics: Vec<Metric>,
    stride: Duration,
    min_samples: usize,
    models: BTreeMap<Metric, TrendModel>,
    is_trained: bool,
}

impl StatisticalForecaster {
    pub fn new(metrics: Vec<Metric>) -> Self {
        Self {
            metrics,
            stride: Duration::seconds(DEFAULT_STRIDE_SECS),
            min_samples: MIN_TRAINING_SAMPLES,
            models: BTreeMap::new(),
            is_trained: false,
        }
    }

    pub fn with_stride(mut self, stride: Duration) -> Self {
        self.stride = stride;
        self
    }

    fn model_path(prefix: &Path, metric: Metric) -> std::path::PathBuf {
        artifact_path(prefix, &format!("{}_model.json", metric.as_str()))
    }
}

impl Default for StatisticalForecaster {
    fn default() -> Self {
        Self::new(Metric::ALL.to_vec())
    }
}

impl ForecastBackend for StatisticalForecaster {
    fn name(&self) -> &str {
        "statistical"
    }

    fn tracked_metrics(&self) -> Vec<Metric> {
        if self.is_trained {
            self.models.keys().copied().collect()
        } else {
            self.metrics.clone()
        }
    }

    fn is_trained(&self) -> bool {
        self.is_trained && !self.models.is_empty()
    }

    fn train(&mut self, history: &[AggregatedSnapshot]) -> Result<(), ForecastError> {
        let mut rows: Vec<AggregatedSnapshot> = history
            .iter()
            .filter(|r| Metric::ALL.iter().all(|&m| r.value(m).is_finite()))
            .cloned()
            .collect();
        rows.sort_by_key(|r| r.timestamp);

        let mut models = BTreeMap::new();
        for &metric in &self.metrics {
            if rows.len() < self.min_samples {
                warn!(metric = %metric, samples = rows.len(), "Insufficient data for metric, skipping");
                continue;
            }
            models.insert(metric, TrendModel::fit(&rows, metric));
            debug!(metric = %metric, "Statistical model fitted");
        }

        if models.is_empty() {
            return Err(ForecastError::InsufficientData {
                required: self.min_samples,
                actual: rows.len(),
            });
        }

        info!(metrics = models.len(), samples = rows.len(), "Statistical models training completed");
        self.models = models;
        self.is_trained = true;
        Ok(())
    }

    fn predict(
        &self,
        context: &[AggregatedSnapshot],
        horizon: usize,
    ) -> Result<ForecastSeries, ForecastError> {
        check_predict_args(self.is_trained(), context, horizon)?;

        let last = context[context.len() - 1].timestamp;
        let mut series = ForecastSeries::new(future_axis(last, self.stride, horizon));

        for (&metric, model) in &self.models {
            let spread = INTERVAL_Z * model.residual_std;
            let values: Vec<f64> = series.timestamps.iter().map(|&t| model.point(t)).collect();
            let lower = values.iter().map(|v| v - spread).collect();
            let upper = values.iter().map(|v| v + spread).collect();
            series.insert(metric, MetricForecast::with_bounds(values, lower, upper));
        }

        Ok(series)
    }

    fn save(&self, prefix: &Path) -> Result<(), ForecastError> {
        if !self.is_trained() {
            return Err(ForecastError::NotTrained);
        }

        for (&metric, model) in &self.models {
            let path = Self::model_path(prefix, metric);
            write_json(&path, model)?;
            debug!(metric = %metric, path = %path.display(), "Statistical model saved");
        }

        write_json(
            &artifact_path(prefix, "metadata.json"),
            &StatisticalMetadata {
                metrics: self.models.keys().copied().collect(),
                stride_secs: self.stride.num_seconds(),
                is_trained: self.is_trained,
            },
        )?;

        info!(prefix = %prefix.display(), "Statistical models saved");
        Ok(())
    }

    fn load(&mut self, prefix: &Path) -> Result<(), ForecastError> {
        let metadata: StatisticalMetadata = read_json(&artifact_path(prefix, "metadata.json"), None)?;
        if metadata.stride_secs <= 0 {
            return Err(ForecastError::Fit(format!(
                "stride must be positive, got {}s",
                metadata.stride_secs
            )));
        }

        let mut models = BTreeMap::new();
        for &metric in &metadata.metrics {
            let model: TrendModel = read_json(&Self::model_path(prefix, metric), None)?;
            models.insert(metric, model);
        }

        self.models = models;
        self.stride = Duration::seconds(metadata.stride_secs);
        self.is_trained = metadata.is_trained;

        info!(prefix = %prefix.display(), metrics = self.models.len(), "Statistical models loaded");
        Ok(())
    }
}
