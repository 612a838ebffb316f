//! Pluggable forecasting backends
//!
//! Every backend is trainable, predictable and persistable through the
//! `ForecastBackend` trait. The orchestrator treats backends as independent:
//! one failing backend never affects another.

mod persistence;
mod sequence;
mod series;
mod statistical;

pub use persistence::{artifact_path, compute_checksum};
pub use sequence::{SequenceForecaster, DEFAULT_WINDOW};
pub use series::{future_axis, ForecastSeries, MetricForecast};
pub use statistical::{StatisticalForecaster, INTERVAL_Z, MIN_TRAINING_SAMPLES};

use crate::models::{AggregatedSnapshot, Metric};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Default number of future steps requested per cycle
pub const DEFAULT_HORIZON: usize = 24;

/// Default spacing between forecast timestamps (5 minutes)
pub const DEFAULT_STRIDE_SECS: i64 = 5 * 60;

/// Longest forecast a backend will produce, one week of 5-minute steps
pub const MAX_HORIZON: usize = 7 * 24 * 12;

/// Errors raised by forecasting backends
#[derive(Debug, Error)]
pub enum ForecastError {
    #[error("insufficient data for training: need at least {required} samples, got {actual}")]
    InsufficientData { required: usize, actual: usize },

    #[error("model must be trained or loaded first")]
    NotTrained,

    #[error("forecast horizon must be between 1 and {}", MAX_HORIZON)]
    InvalidHorizon,

    #[error("prediction context is empty")]
    EmptyContext,

    #[error("model fitting failed: {0}")]
    Fit(String),

    #[error("I/O error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to (de)serialize {path:?}: {source}")]
    Serialization {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("checksum mismatch for {path:?}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        path: PathBuf,
        expected: String,
        actual: String,
    },
}

/// Capability contract for a forecasting model
pub trait ForecastBackend: Send + Sync {
    /// Short identifier used in qualified column names (`cpu_usage_<name>`)
    fn name(&self) -> &str;

    /// Metrics this backend produces forecasts for
    fn tracked_metrics(&self) -> Vec<Metric>;

    /// Whether `predict` can be called
    fn is_trained(&self) -> bool;

    /// Fit the model on a chronological history
    fn train(&mut self, history: &[AggregatedSnapshot]) -> Result<(), ForecastError>;

    /// Forecast `horizon` steps past the last context row
    fn predict(
        &self,
        context: &[AggregatedSnapshot],
        horizon: usize,
    ) -> Result<ForecastSeries, ForecastError>;

    /// Persist trained state under `prefix` (artifacts are suffixed)
    fn save(&self, prefix: &Path) -> Result<(), ForecastError>;

    /// Restore state previously written by `save`
    fn load(&mut self, prefix: &Path) -> Result<(), ForecastError>;
}

/// Shared argument checks for `predict` implementations
pub(crate) fn check_predict_args(
    trained: bool,
    context: &[AggregatedSnapshot],
    horizon: usize,
) -> Result<(), ForecastError> {
    if !trained {
        return Err(ForecastError::NotTrained);
    }
    if horizon == 0 || horizon > MAX_HORIZON {
        return Err(ForecastError::InvalidHorizon);
    }
    if context.is_empty() {
        return Err(ForecastError::EmptyContext);
    }
    Ok(())
}

/// The two standard backends, in combination order
pub fn default_backends() -> Vec<Box<dyn ForecastBackend>> {
    vec![
        Box::new(SequenceForecaster::default()),
        Box::new(StatisticalForecaster::default()),
    ]
}
