//! Z-score outlier detection
//!
//! A point is anomalous when its distance from the snapshot-set mean exceeds
//! `threshold` population standard deviations. Constant metrics are never
//! flagged since the z-score is undefined for them.

use crate::models::{AggregatedSnapshot, Anomaly, Metric, Severity};
use crate::stats::{mean, population_std};

/// Default z-score threshold
pub const DEFAULT_Z_THRESHOLD: f64 = 2.0;

/// Z-scores strictly above this are reported as high severity
pub const HIGH_SEVERITY_Z: f64 = 3.0;

/// Flags out-of-distribution rows in a snapshot set
#[derive(Debug, Clone)]
pub struct AnomalyDetector {
    /// Number of standard deviations to consider anomalous
    pub threshold: f64,
}

impl AnomalyDetector {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    /// Detect anomalies, ordered by row then by metric
    pub fn detect(&self, snapshots: &[AggregatedSnapshot]) -> Vec<Anomaly> {
        let baselines: Vec<(Metric, f64, f64)> = Metric::ALL
            .iter()
            .map(|&metric| {
                let values: Vec<f64> = snapshots.iter().map(|s| s.value(metric)).collect();
                (metric, mean(&values), population_std(&values))
            })
            .collect();

        let mut anomalies = Vec::new();
        for snapshot in snapshots {
            for &(metric, mean, std_dev) in &baselines {
                if std_dev <= 0.0 {
                    continue;
                }
                let value = snapshot.value(metric);
                let z_score = (value - mean).abs() / std_dev;
                if z_score > self.threshold {
                    anomalies.push(Anomaly {
                        timestamp: snapshot.timestamp,
                        metric,
                        value,
                        z_score,
                        severity: severity_for(z_score),
                    });
                }
            }
        }
        anomalies
    }
}

impl Default for AnomalyDetector {
    fn default() -> Self {
        Self::new(DEFAULT_Z_THRESHOLD)
    }
}

fn severity_for(z_score: f64) -> Severity {
    if z_score > HIGH_SEVERITY_Z {
        Severity::High
    } else {
        Severity::Medium
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn rows(cpu: &[f64]) -> Vec<AggregatedSnapshot> {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        cpu.iter()
            .enumerate()
            .map(|(i, &c)| AggregatedSnapshot {
                timestamp: start + Duration::minutes(i as i64),
                cpu_usage: c,
                memory_usage: 50.0,
                network_io: 1000.0,
            })
            .collect()
    }

    #[test]
    fn test_flags_exactly_rows_over_threshold() {
        let mut cpu = vec![10.0; 19];
        cpu.push(100.0);
        let snapshots = rows(&cpu);

        let anomalies = AnomalyDetector::default().detect(&snapshots);

        assert_eq!(anomalies.len(), 1);
        let a = &anomalies[0];
        assert_eq!(a.metric, Metric::CpuUsage);
        assert_eq!(a.value, 100.0);
        assert_eq!(a.timestamp, snapshots[19].timestamp);

        let values: Vec<f64> = snapshots.iter().map(|s| s.cpu_usage).collect();
        let expected = (100.0 - mean(&values)).abs() / population_std(&values);
        assert!((a.z_score - expected).abs() < 1e-12);
        assert_eq!(a.severity, Severity::High);
    }

    #[test]
    fn test_medium_severity_between_threshold_and_three() {
        // A single unit deviation among n rows has population z = sqrt(n - 1)
        let mut cpu = vec![0.0; 6];
        cpu.push(1.0);
        let anomalies = AnomalyDetector::default().detect(&rows(&cpu));

        assert_eq!(anomalies.len(), 1);
        assert!((anomalies[0].z_score - 6.0_f64.sqrt()).abs() < 1e-9);
        assert_eq!(anomalies[0].severity, Severity::Medium);
    }

    #[test]
    fn test_constant_series_never_flagged() {
        let anomalies = AnomalyDetector::new(0.0).detect(&rows(&[5.0, 5.0, 5.0]));
        assert!(anomalies.is_empty());
    }

    #[test]
    fn test_single_row_never_flagged() {
        assert!(AnomalyDetector::new(0.0).detect(&rows(&[42.0])).is_empty());
        assert!(AnomalyDetector::default().detect(&[]).is_empty());
    }

    #[test]
    fn test_threshold_is_strict() {
        // Two rows: each sits exactly one population std from the mean
        let anomalies = AnomalyDetector::new(1.0).detect(&rows(&[0.0, 10.0]));
        assert!(anomalies.is_empty());

        let anomalies = AnomalyDetector::new(0.5).detect(&rows(&[0.0, 10.0]));
        assert_eq!(anomalies.len(), 2);
        assert!(anomalies.iter().all(|a| a.severity == Severity::Medium));
    }
}
