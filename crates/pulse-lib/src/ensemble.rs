//! Cross-backend ensemble of forecast series
//!
//! Every backend column is kept under a backend-qualified name and, for each
//! metric reported by all backends, a row-wise mean (`<metric>_ensemble`)
//! and sample standard deviation (`<metric>_std`) are added.

use crate::forecast::ForecastSeries;
use crate::models::Metric;
use crate::stats::{mean, sample_std};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// One forecast timestamp with all combined columns
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombinedRow {
    pub timestamp: DateTime<Utc>,
    /// `null` only for a standard deviation over fewer than two backends
    #[serde(flatten)]
    pub values: BTreeMap<String, Option<f64>>,
}

/// Merged forecast published to the query surface
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombinedForecast {
    /// Backends that contributed, in combination order
    pub backends: Vec<String>,
    /// Column names in the order they were added
    pub columns: Vec<String>,
    pub rows: Vec<CombinedRow>,
}

impl CombinedForecast {
    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c == name)
    }

    /// Values of one column, `None` if the column does not exist
    pub fn column(&self, name: &str) -> Option<Vec<Option<f64>>> {
        if !self.has_column(name) {
            return None;
        }
        Some(
            self.rows
                .iter()
                .map(|row| row.values.get(name).copied().flatten())
                .collect(),
        )
    }

    pub fn timestamps(&self) -> Vec<DateTime<Utc>> {
        self.rows.iter().map(|r| r.timestamp).collect()
    }
}

pub fn qualified_column(metric: Metric, backend: &str) -> String {
    format!("{}_{}", metric.as_str(), backend)
}

pub fn ensemble_column(metric: Metric) -> String {
    format!("{}_ensemble", metric.as_str())
}

pub fn std_column(metric: Metric) -> String {
    format!("{}_std", metric.as_str())
}

/// Merges per-backend forecasts that share one timestamp axis
#[derive(Debug, Default, Clone, Copy)]
pub struct EnsembleCombiner;

impl EnsembleCombiner {
    pub fn new() -> Self {
        Self
    }

    /// Combine forecasts; `None` when no backend produced one
    pub fn combine(&self, forecasts: &[(String, ForecastSeries)]) -> Option<CombinedForecast> {
        let (_, first) = forecasts.first()?;
        let axis = first.timestamps.clone();

        let accepted: Vec<&(String, ForecastSeries)> = forecasts
            .iter()
            .filter(|(backend, series)| {
                let aligned = series.timestamps == axis;
                if !aligned {
                    warn!(
                        backend = %backend,
                        expected_steps = axis.len(),
                        actual_steps = series.timestamps.len(),
                        expected_start = ?axis.first(),
                        actual_start = ?series.timestamps.first(),
                        "Forecast axis mismatch, dropping backend from ensemble"
                    );
                }
                aligned
            })
            .collect();

        let mut rows: Vec<CombinedRow> = axis
            .iter()
            .map(|&timestamp| CombinedRow {
                timestamp,
                values: BTreeMap::new(),
            })
            .collect();
        let mut columns = Vec::new();

        let mut add_column = |name: String, values: &[f64], rows: &mut Vec<CombinedRow>| {
            for (row, v) in rows.iter_mut().zip(values) {
                row.values.insert(name.clone(), Some(*v));
            }
            columns.push(name);
        };

        for (backend, series) in &accepted {
            for (&metric, forecast) in &series.columns {
                let base = qualified_column(metric, backend);
                if let Some(lower) = &forecast.lower {
                    add_column(format!("{}_lower", base), lower.as_slice(), &mut rows);
                }
                if let Some(upper) = &forecast.upper {
                    add_column(format!("{}_upper", base), upper.as_slice(), &mut rows);
                }
                add_column(base, forecast.values.as_slice(), &mut rows);
            }
        }

        for metric in Metric::ALL {
            let per_backend: Option<Vec<&Vec<f64>>> = accepted
                .iter()
                .map(|(_, series)| series.get(metric).map(|f| &f.values))
                .collect();
            let Some(per_backend) = per_backend else {
                debug!(metric = %metric, "Metric not reported by every backend, no ensemble");
                continue;
            };

            let ensemble = ensemble_column(metric);
            let spread = std_column(metric);
            for (i, row) in rows.iter_mut().enumerate() {
                let samples: Vec<f64> = per_backend.iter().filter_map(|v| v.get(i).copied()).collect();
                row.values.insert(ensemble.clone(), Some(mean(&samples)));
                row.values.insert(spread.clone(), sample_std(&samples));
            }
            columns.push(ensemble);
            columns.push(spread);
        }

        Some(CombinedForecast {
            backends: accepted.iter().map(|(name, _)| name.clone()).collect(),
            columns,
            rows,
        })
    }
}
