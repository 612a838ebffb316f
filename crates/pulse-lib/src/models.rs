//! Core data models for the forecasting service

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Resource metrics tracked across the cluster
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    CpuUsage,
    MemoryUsage,
    NetworkIo,
}

impl Metric {
    /// All tracked metrics, in column order
    pub const ALL: [Metric; 3] = [Metric::CpuUsage, Metric::MemoryUsage, Metric::NetworkIo];

    /// Canonical column name
    pub fn as_str(&self) -> &'static str {
        match self {
            Metric::CpuUsage => "cpu_usage",
            Metric::MemoryUsage => "memory_usage",
            Metric::NetworkIo => "network_io",
        }
    }

    /// Parse a canonical column name
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.as_str() == name)
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw payload served by an agent on `GET /metrics`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricDocument {
    pub timestamp: DateTime<Utc>,
    pub node_id: String,
    pub cpu: CpuInfo,
    pub memory: MemoryInfo,
    pub network: NetworkInfo,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CpuInfo {
    pub usage_percent: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryInfo {
    pub used_percent: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkInfo {
    pub bytes_sent: f64,
    pub bytes_recv: f64,
}

/// Undecoded agent response tagged with the endpoint it came from
#[derive(Debug, Clone)]
pub struct RawMetricDocument {
    pub node_endpoint: String,
    pub body: serde_json::Value,
}

/// Normalized per-node row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricRecord {
    pub timestamp: DateTime<Utc>,
    pub node_id: String,
    pub cpu_usage: f64,
    pub memory_usage: f64,
    pub network_io: f64,
}

/// Cluster-wide reading at a single timestamp
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedSnapshot {
    pub timestamp: DateTime<Utc>,
    pub cpu_usage: f64,
    pub memory_usage: f64,
    pub network_io: f64,
}

impl AggregatedSnapshot {
    pub fn value(&self, metric: Metric) -> f64 {
        match metric {
            Metric::CpuUsage => self.cpu_usage,
            Metric::MemoryUsage => self.memory_usage,
            Metric::NetworkIo => self.network_io,
        }
    }
}

/// Anomaly severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Medium,
    High,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Medium => "medium",
            Severity::High => "high",
        }
    }
}

/// Out-of-distribution point in the current snapshot set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Anomaly {
    pub timestamp: DateTime<Utc>,
    pub metric: Metric,
    pub value: f64,
    pub z_score: f64,
    pub severity: Severity,
}
