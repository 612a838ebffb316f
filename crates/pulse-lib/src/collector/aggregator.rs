//! Cluster-wide aggregation of per-node records

use crate::models::{AggregatedSnapshot, MetricRecord};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

#[derive(Default)]
struct Accumulator {
    cpu: f64,
    memory: f64,
    network: f64,
    count: usize,
}

/// Collapses per-node records into one row per timestamp
#[derive(Debug, Default, Clone, Copy)]
pub struct NodeAggregator;

impl NodeAggregator {
    pub fn new() -> Self {
        Self
    }

    /// Mean of each metric across nodes sharing a timestamp, oldest first
    pub fn aggregate(&self, records: &[MetricRecord]) -> Vec<AggregatedSnapshot> {
        let mut groups: BTreeMap<DateTime<Utc>, Accumulator> = BTreeMap::new();

        for record in records {
            let acc = groups.entry(record.timestamp).or_default();
            acc.cpu += record.cpu_usage;
            acc.memory += record.memory_usage;
            acc.network += record.network_io;
            acc.count += 1;
        }

        groups
            .into_iter()
            .map(|(timestamp, acc)| {
                let n = acc.count as f64;
                AggregatedSnapshot {
                    timestamp,
                    cpu_usage: acc.cpu / n,
                    memory_usage: acc.memory / n,
                    network_io: acc.network / n,
                }
            })
            .collect()
    }
}
