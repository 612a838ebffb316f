//! Per-backend forecast output

use crate::models::Metric;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Forecast values for one metric, aligned with the series timestamps
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricForecast {
    pub values: Vec<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lower: Option<Vec<f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upper: Option<Vec<f64>>,
}

impl MetricForecast {
    pub fn point(values: Vec<f64>) -> Self {
        Self {
            values,
            lower: None,
            upper: None,
        }
    }

    pub fn with_bounds(values: Vec<f64>, lower: Vec<f64>, upper: Vec<f64>) -> Self {
        Self {
            values,
            lower: Some(lower),
            upper: Some(upper),
        }
    }
}

/// Ordered future timestamps with one column per forecast metric
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastSeries {
    pub timestamps: Vec<DateTime<Utc>>,
    pub columns: BTreeMap<Metric, MetricForecast>,
}

impl ForecastSeries {
    pub fn new(timestamps: Vec<DateTime<Utc>>) -> Self {
        Self {
            timestamps,
            columns: BTreeMap::new(),
        }
    }

    pub fn insert(&mut self, metric: Metric, forecast: MetricForecast) {
        self.columns.insert(metric, forecast);
    }

    pub fn get(&self, metric: Metric) -> Option<&MetricForecast> {
        self.columns.get(&metric)
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }
}

/// `horizon` timestamps spaced by `stride`, starting one stride after `last`
///
/// Stops early instead of overflowing past the representable time range.
pub fn future_axis(last: DateTime<Utc>, stride: Duration, horizon: usize) -> Vec<DateTime<Utc>> {
    (1..=horizon)
        .map_while(|step| {
            let step = i32::try_from(step).ok()?;
            last.checked_add_signed(stride.checked_mul(step)?)
        })
        .collect()
}
