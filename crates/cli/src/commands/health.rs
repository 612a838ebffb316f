//! Service health command

use anyhow::Result;
use colored::Colorize;
use tabled::Tabled;

use crate::client::ApiClient;
use crate::output::{
    color_status, format_timestamp, print_json, print_table, print_warning, OutputFormat,
};

/// Row for the component table
#[derive(Tabled, serde::Serialize)]
struct ComponentRow {
    #[tabled(rename = "Component")]
    component: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Message")]
    message: String,
    #[tabled(rename = "Checked")]
    checked_at: String,
}

/// Show service health and per-component status
pub async fn show_health(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let health = client.health().await?;

    match format {
        OutputFormat::Json => print_json(&health),
        OutputFormat::Table => {
            println!("{}", "Service Health".bold());
            println!("{}", "=".repeat(50));
            println!("Service:   {}", health.service.cyan());
            println!("Status:    {}", color_status(&health.status));
            println!("Checked:   {}", format_timestamp(&health.timestamp));
            println!();

            let rows: Vec<ComponentRow> = health
                .components
                .iter()
                .map(|(name, component)| ComponentRow {
                    component: name.clone(),
                    status: color_status(&component.status),
                    message: component.message.clone().unwrap_or_default(),
                    checked_at: format_timestamp(&component.checked_at),
                })
                .collect();
            print_table(&rows, format);

            if health.status != "healthy" {
                println!();
                print_warning("Some components are not healthy; forecasts may be stale");
            }
        }
    }

    Ok(())
}
