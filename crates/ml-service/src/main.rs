//! CloudPulse ML - cluster resource forecasting service
//!
//! Polls node agents on a fixed interval, forecasts cluster-wide resource
//! usage with an ensemble of backends, flags anomalies and serves the
//! latest results over HTTP.

use anyhow::{Context, Result};
use pulse_lib::{
    api::{self, AppState, SERVICE_NAME},
    collector::AgentMetricsCollector,
    forecast::default_backends,
    health::HealthRegistry,
    observability::StructuredLogger,
    orchestrator::{CycleOrchestrator, ScheduledRunner, SharedState},
};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod config;

const SERVICE_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!("Starting {}", SERVICE_NAME);

    let config = config::ServiceConfig::load()?;
    let endpoints = config.endpoints();
    info!(
        agents = ?endpoints,
        model_dir = ?config.model_save_path,
        "Service configured"
    );

    std::fs::create_dir_all(&config.model_save_path).with_context(|| {
        format!(
            "failed to create model directory {}",
            config.model_save_path.display()
        )
    })?;

    let health_registry = HealthRegistry::new();
    let shared = SharedState::new();

    let collector = AgentMetricsCollector::new(endpoints.clone())?;
    let orchestrator = Arc::new(CycleOrchestrator::new(
        Arc::new(collector),
        default_backends(),
        config.orchestrator_config(),
        shared.clone(),
        health_registry.clone(),
    ));
    orchestrator.register_components().await;

    let logger = StructuredLogger::new(SERVICE_NAME);
    logger.log_startup(SERVICE_VERSION, endpoints.len(), config.forecast_interval_secs);

    // Start the forecasting loop
    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let runner = Arc::new(ScheduledRunner::new(
        orchestrator,
        config.forecast_interval(),
        health_registry.clone(),
    ));
    let runner_handle = tokio::spawn(runner.run(shutdown_rx));

    // Start query API
    let app_state = Arc::new(AppState::new(health_registry.clone(), shared));
    let host = config.host.clone();
    let port = config.port;
    let api_handle = tokio::spawn(async move { api::serve(&host, port, app_state).await });

    health_registry.set_ready(true).await;

    tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            signal.context("failed to listen for shutdown signal")?;
            logger.log_shutdown("SIGINT received");
        }
        served = api_handle => {
            logger.log_shutdown("API server exited");
            served.context("API server task failed")??;
        }
    }

    // Let an in-flight cycle finish before exiting
    let _ = shutdown_tx.send(());
    runner_handle
        .await
        .context("forecasting scheduler task failed")?;
    info!("Shutdown complete");

    Ok(())
}
