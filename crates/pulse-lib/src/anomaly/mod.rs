//! Anomaly detection over the aggregated cluster signal
//!
//! Detection is stateless and per cycle: each metric is compared against the
//! mean and spread of the current snapshot set only.

mod zscore;

pub use zscore::{AnomalyDetector, DEFAULT_Z_THRESHOLD, HIGH_SEVERITY_Z};
