//! Bounded history of aggregated snapshots
//!
//! Keeps one entry per cycle, keyed by the cycle's execution instant.
//! When the capacity is exceeded the entry with the smallest key is evicted,
//! one eviction per overflowing insert.

use crate::models::AggregatedSnapshot;
use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use tracing::debug;

/// Default number of cycles retained
pub const DEFAULT_HISTORY_CAPACITY: usize = 1000;

/// Insertion-ordered map with a hard size bound
#[derive(Debug, Clone)]
pub struct BoundedHistoryCache<K, V> {
    entries: VecDeque<(K, V)>,
    capacity: usize,
}

/// History keyed by cycle start instant
pub type SnapshotHistory = BoundedHistoryCache<DateTime<Utc>, Vec<AggregatedSnapshot>>;

impl<K: Ord + Clone, V> BoundedHistoryCache<K, V> {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity.min(DEFAULT_HISTORY_CAPACITY) + 1),
            capacity,
        }
    }

    /// Insert a value; an existing key keeps its position and gets the new value
    pub fn put(&mut self, key: K, value: V) {
        if let Some(slot) = self.entries.iter_mut().find(|(k, _)| *k == key) {
            slot.1 = value;
            return;
        }

        self.entries.push_back((key, value));

        if self.entries.len() > self.capacity {
            self.evict_oldest();
        }
    }

    fn evict_oldest(&mut self) {
        let oldest = self
            .entries
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| a.0.cmp(&b.0))
            .map(|(i, _)| i);

        if let Some(index) = oldest {
            self.entries.remove(index);
            debug!(capacity = self.capacity, "Evicted oldest history entry");
        }
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Values in insertion order
    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.entries.iter().map(|(_, v)| v)
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.entries.iter().map(|(k, _)| k)
    }

    /// Most recently inserted value
    pub fn latest(&self) -> Option<&V> {
        self.entries.back().map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl<K: Ord + Clone, V> Default for BoundedHistoryCache<K, V> {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}

impl SnapshotHistory {
    /// All cached rows as one chronological series, one row per timestamp
    ///
    /// A timestamp seen in several cycles keeps the row from the latest insert.
    pub fn flatten_history(&self) -> Vec<AggregatedSnapshot> {
        let mut rows: std::collections::BTreeMap<DateTime<Utc>, AggregatedSnapshot> =
            std::collections::BTreeMap::new();
        for snapshot in self.values().flatten() {
            rows.insert(snapshot.timestamp, snapshot.clone());
        }
        rows.into_values().collect()
    }
}
