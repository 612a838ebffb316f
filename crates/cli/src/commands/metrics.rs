//! Latest aggregated metrics command

use anyhow::Result;
use tabled::Tabled;

use crate::client::ApiClient;
use crate::output::{format_bytes, format_percent, format_timestamp, print_info, print_json, print_table, OutputFormat};

/// Row for the cluster metrics table
#[derive(Tabled, serde::Serialize)]
struct SnapshotTableRow {
    #[tabled(rename = "Timestamp")]
    timestamp: String,
    #[tabled(rename = "CPU")]
    cpu: String,
    #[tabled(rename = "Memory")]
    memory: String,
    #[tabled(rename = "Network I/O")]
    network: String,
}

/// Show the most recent cluster-wide snapshot set
pub async fn show_metrics(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let rows = client.latest_metrics().await?;

    match format {
        OutputFormat::Json => print_json(&rows),
        OutputFormat::Table => {
            if rows.is_empty() {
                print_info("No metrics collected yet");
                return Ok(());
            }

            let table: Vec<SnapshotTableRow> = rows
                .iter()
                .map(|r| SnapshotTableRow {
                    timestamp: format_timestamp(&r.timestamp),
                    cpu: format_percent(r.cpu_usage),
                    memory: format_percent(r.memory_usage),
                    network: format_bytes(r.network_io),
                })
                .collect();
            print_table(&table, format);
        }
    }

    Ok(())
}
