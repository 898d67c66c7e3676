//! DashMap Latency Store
//!
//! Implements LatencyStore as a per-target append log behind DashMap.

use crate::domain::entities::LatencyRecord;
use crate::domain::ports::LatencyStore;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::RwLock;
use std::collections::VecDeque;
use std::time::Duration;

/// Records kept per target unless configured otherwise.
pub const DEFAULT_RETENTION: usize = 1000;

/// DashMap-backed latency store.
///
/// Each target owns its own log, so appends to different targets never
/// contend. Aggregation holds a target's read lock only while scanning.
/// Logs are capped at `retention` records; the oldest are dropped first.
pub struct DashMapLatencyStore {
    logs: DashMap<String, RwLock<VecDeque<LatencyRecord>>>,
    retention: usize,
}

impl DashMapLatencyStore {
    /// Create a new store with the default retention.
    pub fn new() -> Self {
        Self::with_retention(DEFAULT_RETENTION)
    }

    /// Create a store keeping at most `retention` records per target.
    pub fn with_retention(retention: usize) -> Self {
        Self {
            logs: DashMap::new(),
            retention: retention.max(1),
        }
    }

    /// Number of records currently kept for a target.
    pub fn len(&self, target_url: &str) -> usize {
        self.logs
            .get(target_url)
            .map(|log| log.read().len())
            .unwrap_or(0)
    }

    /// Get all target urls with recorded history.
    pub fn target_urls(&self) -> Vec<String> {
        self.logs.iter().map(|e| e.key().clone()).collect()
    }
}

impl Default for DashMapLatencyStore {
    fn default() -> Self {
        Self::new()
    }
}

impl LatencyStore for DashMapLatencyStore {
    fn record(&self, record: LatencyRecord) {
        // Shard read lock on the common path; the entry API only for new targets
        if let Some(log) = self.logs.get(&record.target_url) {
            push_capped(&log, record, self.retention);
            return;
        }
        let log = self.logs.entry(record.target_url.clone()).or_default();
        push_capped(&log, record, self.retention);
    }

    fn rolling_average_at(
        &self,
        target_url: &str,
        limit: usize,
        window: Duration,
        now: DateTime<Utc>,
    ) -> f64 {
        let Some(log) = self.logs.get(target_url) else {
            return 0.0;
        };
        let cutoff = chrono::Duration::from_std(window)
            .ok()
            .and_then(|window| now.checked_sub_signed(window))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);

        // Newest append first, so equal start times resolve to the later record
        let mut recent: Vec<(DateTime<Utc>, i64)> = log
            .read()
            .iter()
            .rev()
            .filter(|r| r.started_at >= cutoff)
            .filter_map(|r| r.duration_micros().map(|d| (r.started_at, d)))
            .collect();

        // Stable sort keeps the newest-append order among equal start times
        recent.sort_by(|a, b| b.0.cmp(&a.0));
        recent.truncate(limit);

        if recent.is_empty() {
            return 0.0;
        }
        let total: i64 = recent.iter().map(|(_, d)| d).sum();
        total as f64 / recent.len() as f64
    }
}

fn push_capped(log: &RwLock<VecDeque<LatencyRecord>>, record: LatencyRecord, retention: usize) {
    let mut log = log.write();
    if log.len() >= retention {
        log.pop_front();
    }
    log.push_back(record);
}
