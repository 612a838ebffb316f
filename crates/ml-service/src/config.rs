//! Service configuration

use anyhow::{bail, Context, Result};
use pulse_lib::forecast::MAX_HORIZON;
use pulse_lib::orchestrator::OrchestratorConfig;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Environment variable prefix, e.g. `CLOUDPULSE_PORT`
pub const ENV_PREFIX: &str = "CLOUDPULSE";

/// Forecasting service configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    /// Base URLs of the node agents
    #[serde(default = "default_agent_endpoints")]
    pub agent_endpoints: Vec<String>,

    /// Directory for persisted model artifacts
    #[serde(default = "default_model_save_path")]
    pub model_save_path: PathBuf,

    /// Seconds between forecasting cycles
    #[serde(default = "default_forecast_interval")]
    pub forecast_interval_secs: u64,

    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Future steps requested per cycle
    #[serde(default = "default_forecast_horizon")]
    pub forecast_horizon: usize,

    #[serde(default = "default_anomaly_threshold")]
    pub anomaly_threshold: f64,

    /// Train untrained backends from the history cache
    #[serde(default)]
    pub auto_train: bool,
}

fn default_agent_endpoints() -> Vec<String> {
    vec!["http://localhost:8080".to_string()]
}

fn default_model_save_path() -> PathBuf {
    PathBuf::from("./models")
}

fn default_forecast_interval() -> u64 {
    300
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5000
}

fn default_forecast_horizon() -> usize {
    24
}

fn default_anomaly_threshold() -> f64 {
    2.0
}

impl ServiceConfig {
    /// Load configuration from the process environment
    pub fn load() -> Result<Self> {
        Self::from_environment(Self::environment())
    }

    fn environment() -> config::Environment {
        config::Environment::with_prefix(ENV_PREFIX)
            .try_parsing(true)
            .list_separator(",")
            .with_list_parse_key("agent_endpoints")
    }

    fn from_environment(source: config::Environment) -> Result<Self> {
        let config = config::Config::builder()
            .add_source(source)
            .build()
            .context("failed to read configuration")?;

        let config: ServiceConfig = config
            .try_deserialize()
            .context("invalid CLOUDPULSE_* configuration")?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.agent_endpoints.iter().all(|e| e.trim().is_empty()) {
            bail!("at least one agent endpoint is required");
        }
        if self.forecast_interval_secs == 0 {
            bail!("forecast_interval_secs must be positive");
        }
        if self.forecast_horizon == 0 || self.forecast_horizon > MAX_HORIZON {
            bail!("forecast_horizon must be between 1 and {}", MAX_HORIZON);
        }
        if !self.anomaly_threshold.is_finite() || self.anomaly_threshold < 0.0 {
            bail!("anomaly_threshold must be a non-negative number");
        }
        Ok(())
    }

    /// Endpoints with surrounding whitespace and empty entries removed
    pub fn endpoints(&self) -> Vec<String> {
        self.agent_endpoints
            .iter()
            .map(|e| e.trim().to_string())
            .filter(|e| !e.is_empty())
            .collect()
    }

    pub fn forecast_interval(&self) -> Duration {
        Duration::from_secs(self.forecast_interval_secs)
    }

    pub fn orchestrator_config(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            horizon: self.forecast_horizon,
            anomaly_threshold: self.anomaly_threshold,
            model_dir: self.model_save_path.clone(),
            auto_train: self.auto_train,
        }
    }
}
