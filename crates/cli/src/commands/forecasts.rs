//! Forecast display command

use anyhow::Result;
use colored::Colorize;
use std::collections::BTreeMap;

use crate::client::{ApiClient, ForecastReport};
use crate::output::{
    format_cell, format_timestamp, print_dynamic_table, print_info, print_json, OutputFormat,
};

/// Columns to display
///
/// With a metric every column for that metric is shown; otherwise only the
/// ensemble columns, falling back to all columns when there is no ensemble.
pub fn select_columns(report: &ForecastReport, metric: Option<&str>) -> Vec<String> {
    let columns = report.columns();

    match metric {
        Some(metric) => {
            let prefix = format!("{}_", metric);
            columns
                .into_iter()
                .filter(|c| c.starts_with(&prefix))
                .collect()
        }
        None => {
            let ensembles: Vec<String> = columns
                .iter()
                .filter(|c| c.ends_with("_ensemble"))
                .cloned()
                .collect();
            if ensembles.is_empty() {
                columns
            } else {
                ensembles
            }
        }
    }
}

/// Show the latest combined forecast
pub async fn show_forecasts(
    client: &ApiClient,
    metric: Option<String>,
    limit: Option<usize>,
    format: OutputFormat,
) -> Result<()> {
    let report = client.forecasts().await?;

    if report.is_empty() {
        match format {
            OutputFormat::Json => print_json(&report),
            OutputFormat::Table => print_info("No forecast published yet"),
        }
        return Ok(());
    }

    let columns = select_columns(&report, metric.as_deref());
    let limit = limit.unwrap_or(report.rows.len());

    let rows: Vec<BTreeMap<String, serde_json::Value>> = report
        .rows
        .iter()
        .take(limit)
        .map(|row| {
            row.iter()
                .filter(|(k, _)| k.as_str() == "timestamp" || columns.contains(k))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect()
        })
        .collect();

    match format {
        OutputFormat::Json => print_json(&rows),
        OutputFormat::Table => {
            println!("{}", "Resource Forecast".bold());
            println!("{}", "=".repeat(60));
            if let Some(generated_at) = &report.generated_at {
                println!("Generated: {}", format_timestamp(generated_at));
            }
            println!("Backends:  {}", report.backends.join(", ").cyan());
            println!();

            if columns.is_empty() {
                print_info("No forecast columns match the requested metric");
                return Ok(());
            }

            let mut header = vec!["Timestamp".to_string()];
            header.extend(columns.iter().cloned());

            let records: Vec<Vec<String>> = rows
                .iter()
                .map(|row| {
                    let timestamp = row
                        .get("timestamp")
                        .and_then(|t| t.as_str())
                        .map(format_timestamp)
                        .unwrap_or_default();
                    std::iter::once(timestamp)
                        .chain(columns.iter().map(|c| {
                            row.get(c).map(format_cell).unwrap_or_else(|| "-".to_string())
                        }))
                        .collect()
                })
                .collect();
            print_dynamic_table(&header, records);
        }
    }

    Ok(())
}
