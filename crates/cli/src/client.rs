//! API client for communicating with the forecasting service

use anyhow::{Context, Result};
use reqwest::{Client, Response, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::BTreeMap;
use url::Url;

/// API client for the forecasting service query API
pub struct ApiClient {
    client: Client,
    base_url: Url,
}

impl ApiClient {
    /// Create a new API client
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        let base_url = Url::parse(base_url).context("Invalid API URL")?;

        Ok(Self { client, base_url })
    }

    async fn send(&self, path: &str) -> Result<Response> {
        let url = self.base_url.join(path).context("Invalid path")?;

        self.client
            .get(url)
            .send()
            .await
            .context("Failed to send request")
    }

    /// Make a GET request
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let response = self.send(path).await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("API error ({}): {}", status, body);
        }

        response.json().await.context("Failed to parse response")
    }

    /// Service health; an unhealthy service still reports its components
    pub async fn health(&self) -> Result<HealthReport> {
        let response = self.send("health").await?;
        let status = response.status();

        if !status.is_success() && status != StatusCode::SERVICE_UNAVAILABLE {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("API error ({}): {}", status, body);
        }

        response.json().await.context("Failed to parse response")
    }

    pub async fn forecasts(&self) -> Result<ForecastReport> {
        self.get("api/forecasts").await
    }

    pub async fn anomalies(&self) -> Result<Vec<AnomalyReport>> {
        self.get("api/anomalies").await
    }

    /// Latest aggregated rows; the service answers `{}` before its first cycle
    pub async fn latest_metrics(&self) -> Result<Vec<SnapshotRow>> {
        let value: serde_json::Value = self.get("api/metrics").await?;
        match value {
            serde_json::Value::Array(_) => {
                serde_json::from_value(value).context("Failed to parse metrics rows")
            }
            _ => Ok(Vec::new()),
        }
    }
}

// API response types

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: String,
    pub service: String,
    pub timestamp: String,
    #[serde(default)]
    pub components: BTreeMap<String, ComponentReport>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentReport {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub checked_at: String,
}

/// Combined forecast; every field is absent before the first forecast
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ForecastReport {
    #[serde(default)]
    pub rows: Vec<BTreeMap<String, serde_json::Value>>,
    #[serde(default)]
    pub backends: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generated_at: Option<String>,
}

impl ForecastReport {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Value columns (everything but `timestamp`) in first-row order
    pub fn columns(&self) -> Vec<String> {
        self.rows
            .first()
            .map(|row| {
                row.keys()
                    .filter(|k| k.as_str() != "timestamp")
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnomalyReport {
    pub timestamp: String,
    pub metric: String,
    pub value: f64,
    pub z_score: f64,
    pub severity: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotRow {
    pub timestamp: String,
    pub cpu_usage: f64,
    pub memory_usage: f64,
    pub network_io: f64,
}
