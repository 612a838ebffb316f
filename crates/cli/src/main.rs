//! CloudPulse CLI
//!
//! A command-line tool for querying forecasts, anomalies and cluster
//! metrics from the CloudPulse forecasting service.

mod client;
mod commands;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use commands::{anomalies, forecasts, health, metrics};

/// CloudPulse CLI
#[derive(Parser)]
#[command(name = "cpulse")]
#[command(author, version, about = "CLI for the CloudPulse forecasting service", long_about = None)]
pub struct Cli {
    /// Service URL (can also be set via CLOUDPULSE_API_URL env var)
    #[arg(long, env = "CLOUDPULSE_API_URL", default_value = "http://localhost:5000")]
    pub api_url: String,

    /// Output format
    #[arg(long, short, default_value = "table")]
    pub format: output::OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Metrics tracked by the service
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum MetricArg {
    CpuUsage,
    MemoryUsage,
    NetworkIo,
}

impl MetricArg {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricArg::CpuUsage => "cpu_usage",
            MetricArg::MemoryUsage => "memory_usage",
            MetricArg::NetworkIo => "network_io",
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum SeverityArg {
    Medium,
    High,
}

impl SeverityArg {
    pub fn as_str(&self) -> &'static str {
        match self {
            SeverityArg::Medium => "medium",
            SeverityArg::High => "high",
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show service and component health
    Health,

    /// Show the latest combined forecast
    Forecasts {
        /// Show every column for one metric instead of the ensembles
        #[arg(long, short)]
        metric: Option<MetricArg>,

        /// Maximum number of forecast steps to show
        #[arg(long, short)]
        limit: Option<usize>,
    },

    /// List anomalies from the latest cycle
    Anomalies {
        /// Filter by severity
        #[arg(long, short)]
        severity: Option<SeverityArg>,

        /// Filter by metric
        #[arg(long, short)]
        metric: Option<MetricArg>,
    },

    /// Show the latest aggregated cluster metrics
    Metrics,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize client
    let client = client::ApiClient::new(&cli.api_url)?;

    // Execute command
    match cli.command {
        Commands::Health => {
            health::show_health(&client, cli.format).await?;
        }
        Commands::Forecasts { metric, limit } => {
            forecasts::show_forecasts(
                &client,
                metric.map(|m| m.as_str().to_string()),
                limit,
                cli.format,
            )
            .await?;
        }
        Commands::Anomalies { severity, metric } => {
            anomalies::list_anomalies(
                &client,
                severity.map(|s| s.as_str().to_string()),
                metric.map(|m| m.as_str().to_string()),
                cli.format,
            )
            .await?;
        }
        Commands::Metrics => {
            metrics::show_metrics(&client, cli.format).await?;
        }
    }

    Ok(())
}
