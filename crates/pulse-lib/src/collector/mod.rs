//! Metrics collection from cluster agents
//!
//! This module pulls raw metric documents from remote agents, normalizes
//! them into per-node records and collapses those into a single
//! cluster-wide series per timestamp.

mod agent;
mod aggregator;
mod processor;


pub use agent::{AgentMetricsCollector, FetchError, AGENT_FETCH_TIMEOUT};
pub use aggregator::NodeAggregator;
pub use processor::MetricsProcessor;

use crate::models::RawMetricDocument;
use thiserror::Error;

pub use async_trait::async_trait;

/// Errors that abort a cycle's processing stage
#[derive(Debug, Error)]
pub enum PipelineError {
    /// An agent served a document that does not honor the metrics contract
    #[error("malformed metric document from {endpoint}: {source}")]
    MalformedDocument {
        endpoint: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Results from one collection pass over all agents
#[derive(Debug, Default)]
pub struct CollectionResults {
    pub documents: Vec<RawMetricDocument>,
    pub error_count: usize,
}

impl CollectionResults {
    pub fn success_count(&self) -> usize {
        self.documents.len()
    }
}

/// Source of raw metric documents for a cycle
#[async_trait]
pub trait MetricsSource: Send + Sync {
    /// Gather the current documents. An empty result means no data this cycle.
    async fn collect(&self) -> CollectionResults;
}
