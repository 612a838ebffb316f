//! Normalization of agent documents into per-node records

use super::PipelineError;
use crate::models::{MetricDocument, MetricRecord, RawMetricDocument};

/// Maps raw agent documents to `MetricRecord`s
///
/// Unlike collection, a malformed document is not tolerated individually:
/// the first one fails the whole batch.
#[derive(Debug, Default, Clone, Copy)]
pub struct MetricsProcessor;

impl MetricsProcessor {
    pub fn new() -> Self {
        Self
    }

    pub fn process(&self, documents: &[RawMetricDocument]) -> Result<Vec<MetricRecord>, PipelineError> {
        documents.iter().map(|doc| self.process_document(doc)).collect()
    }

    pub fn process_document(&self, raw: &RawMetricDocument) -> Result<MetricRecord, PipelineError> {
        let doc: MetricDocument =
            serde_json::from_value(raw.body.clone()).map_err(|source| {
                PipelineError::MalformedDocument {
                    endpoint: raw.node_endpoint.clone(),
                    source,
                }
            })?;

        Ok(MetricRecord {
            timestamp: doc.timestamp,
            node_id: doc.node_id,
            cpu_usage: doc.cpu.usage_percent,
            memory_usage: doc.memory.used_percent,
            network_io: doc.network.bytes_sent + doc.network.bytes_recv,
        })
    }
}
