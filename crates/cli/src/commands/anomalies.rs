//! Anomaly listing command

use anyhow::Result;
use tabled::Tabled;

use crate::client::{AnomalyReport, ApiClient};
use crate::output::{color_severity, format_timestamp, print_info, print_json, print_table, OutputFormat};

/// Row for anomalies table
#[derive(Tabled, serde::Serialize)]
struct AnomalyRow {
    #[tabled(rename = "Timestamp")]
    timestamp: String,
    #[tabled(rename = "Metric")]
    metric: String,
    #[tabled(rename = "Value")]
    value: String,
    #[tabled(rename = "Z-Score")]
    z_score: String,
    #[tabled(rename = "Severity")]
    severity: String,
}

/// Keep anomalies matching an optional severity and metric
pub fn filter_anomalies(
    anomalies: Vec<AnomalyReport>,
    severity: Option<&str>,
    metric: Option<&str>,
) -> Vec<AnomalyReport> {
    anomalies
        .into_iter()
        .filter(|a| severity.map_or(true, |s| a.severity.eq_ignore_ascii_case(s)))
        .filter(|a| metric.map_or(true, |m| a.metric == m))
        .collect()
}

/// List anomalies from the latest cycle
pub async fn list_anomalies(
    client: &ApiClient,
    severity: Option<String>,
    metric: Option<String>,
    format: OutputFormat,
) -> Result<()> {
    let anomalies = filter_anomalies(
        client.anomalies().await?,
        severity.as_deref(),
        metric.as_deref(),
    );

    match format {
        OutputFormat::Json => print_json(&anomalies),
        OutputFormat::Table => {
            if anomalies.is_empty() {
                print_info("No anomalies detected in the latest cycle");
                return Ok(());
            }

            let rows: Vec<AnomalyRow> = anomalies
                .iter()
                .map(|a| AnomalyRow {
                    timestamp: format_timestamp(&a.timestamp),
                    metric: a.metric.clone(),
                    value: format!("{:.2}", a.value),
                    z_score: format!("{:.2}", a.z_score),
                    severity: color_severity(&a.severity),
                })
                .collect();
            print_table(&rows, format);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn anomaly(metric: &str, severity: &str) -> AnomalyReport {
        AnomalyReport {
            timestamp: "2024-01-01T00:00:00Z".to_string(),
            metric: metric.to_string(),
            value: 1.0,
            z_score: 2.5,
            severity: severity.to_string(),
        }
    }

    #[test]
    fn test_filter_by_severity_and_metric() {
        let all = vec![
            anomaly("cpu_usage", "high"),
            anomaly("cpu_usage", "medium"),
            anomaly("memory_usage", "high"),
        ];

        assert_eq!(filter_anomalies(all.clone(), Some("HIGH"), None).len(), 2);
        assert_eq!(filter_anomalies(all.clone(), None, Some("cpu_usage")).len(), 2);
        assert_eq!(
            filter_anomalies(all, Some("high"), Some("memory_usage")).len(),
            1
        );
    }
}
