//! Subcommand implementations

pub mod anomalies;
pub mod forecasts;
pub mod health;
pub mod metrics;
