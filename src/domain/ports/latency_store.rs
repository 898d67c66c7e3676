//! Latency Store Port
//!
//! Defines the interface for recording round trips and reading
//! rolling latency averages per target.

use crate::domain::entities::LatencyRecord;
use chrono::{DateTime, Utc};
use std::time::Duration;

/// Store for per-target latency observations.
///
/// Append-only: records are never mutated once recorded. The selector
/// reads aggregates from it to make `rolling_avg` decisions.
pub trait LatencyStore: Send + Sync {
    /// Append one record to its target's log.
    fn record(&self, record: LatencyRecord);

    /// Rolling average evaluated at an explicit instant.
    ///
    /// Mean duration in microseconds of the most recent `limit` records of
    /// `target_url` that started within `window` of `now` and have a defined
    /// positive duration. Returns `0.0` when no record qualifies.
    fn rolling_average_at(
        &self,
        target_url: &str,
        limit: usize,
        window: Duration,
        now: DateTime<Utc>,
    ) -> f64;

    /// Rolling average evaluated now.
    fn rolling_average(&self, target_url: &str, limit: usize, window: Duration) -> f64 {
        self.rolling_average_at(target_url, limit, window, Utc::now())
    }
}
