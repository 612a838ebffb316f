//! HTTP collection from node agents
//!
//! Each agent serves its current readings on `GET {endpoint}/metrics`.
//! Every fetch is individually time-bounded and a failing agent is skipped
//! for the pass without affecting the others.

use super::{async_trait, CollectionResults, MetricsSource};
use crate::models::RawMetricDocument;
use anyhow::{Context, Result};
use reqwest::{Client, StatusCode};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info, warn};
use url::Url;

/// Upper bound on a single agent fetch
pub const AGENT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Reasons a single agent produced no data
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("invalid agent endpoint: {0}")]
    InvalidEndpoint(#[from] url::ParseError),
    #[error("agent responded with status {0}")]
    Status(StatusCode),
    #[error("request timed out")]
    Timeout,
    #[error("transport error: {0}")]
    Transport(#[source] reqwest::Error),
    #[error("response body is not JSON: {0}")]
    Decode(#[source] reqwest::Error),
}

/// Pulls metric documents from a fixed set of agents
pub struct AgentMetricsCollector {
    client: Client,
    endpoints: Vec<String>,
}

impl AgentMetricsCollector {
    /// Create a collector with the default fetch timeout
    pub fn new(endpoints: Vec<String>) -> Result<Self> {
        Self::with_timeout(endpoints, AGENT_FETCH_TIMEOUT)
    }

    /// Create a collector with a custom per-agent timeout
    pub fn with_timeout(endpoints: Vec<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client, endpoints })
    }

    pub fn endpoints(&self) -> &[String] {
        &self.endpoints
    }

    /// Fetch the current document from one agent
    pub async fn fetch(&self, endpoint: &str) -> Result<serde_json::Value, FetchError> {
        let url = metrics_url(endpoint)?;

        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout
            } else {
                FetchError::Transport(e)
            }
        })?;

        if response.status() != StatusCode::OK {
            return Err(FetchError::Status(response.status()));
        }

        response.json().await.map_err(FetchError::Decode)
    }
}

#[async_trait]
impl MetricsSource for AgentMetricsCollector {
    async fn collect(&self) -> CollectionResults {
        let mut results = CollectionResults::default();

        for endpoint in &self.endpoints {
            match self.fetch(endpoint).await {
                Ok(body) => {
                    debug!(endpoint = %endpoint, "Collected metrics from agent");
                    results.documents.push(RawMetricDocument {
                        node_endpoint: endpoint.clone(),
                        body,
                    });
                }
                Err(FetchError::Status(status)) => {
                    results.error_count += 1;
                    warn!(endpoint = %endpoint, status = %status, "Agent returned non-OK status");
                }
                Err(e) => {
                    results.error_count += 1;
                    error!(endpoint = %endpoint, error = %e, "Failed to collect metrics from agent");
                }
            }
        }

        info!(
            collected = results.success_count(),
            errors = results.error_count,
            "Agent collection pass complete"
        );

        results
    }
}

/// Build `{endpoint}/metrics`, tolerating a trailing slash on the endpoint
fn metrics_url(endpoint: &str) -> Result<Url, url::ParseError> {
    Url::parse(&format!("{}/metrics", endpoint.trim_end_matches('/')))
}
