//! Domain Entities - Core business objects
//!
//! These entities represent the core concepts of the balancer domain:
//! upstream targets, latency observations and forwarded messages.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An upstream SMS provider endpoint eligible to receive forwarded messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Target {
    /// Address of the provider endpoint, unique within the registry
    pub url: String,
    /// Relative weight for weighted random selection (need not sum to 1)
    pub weight: f64,
}

impl Target {
    pub fn new(url: impl Into<String>, weight: f64) -> Self {
        Self {
            url: url.into(),
            weight,
        }
    }

    /// Number of slots this target occupies in the weighted random pool.
    ///
    /// Weights are scaled by 100 and rounded to the nearest integer, so a
    /// weight of `0.29` yields exactly 29 slots. Negative and NaN weights
    /// yield no slots.
    pub fn pool_slots(&self) -> usize {
        let scaled = (self.weight * 100.0).round();
        if scaled.is_nan() || scaled <= 0.0 {
            0
        } else {
            scaled as usize
        }
    }
}

/// Outcome of one observed round trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    Pending,
    Success,
    Failed,
}

/// One observed round trip to one target.
#[derive(Debug, Clone, PartialEq)]
pub struct LatencyRecord {
    pub target_url: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub outcome: Outcome,
}

impl LatencyRecord {
    /// A completed round trip.
    pub fn success(
        target_url: impl Into<String>,
        started_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
    ) -> Self {
        Self {
            target_url: target_url.into(),
            started_at,
            finished_at: Some(finished_at),
            outcome: Outcome::Success,
        }
    }

    /// A failed attempt. It never carries a finish time.
    pub fn failed(target_url: impl Into<String>, started_at: DateTime<Utc>) -> Self {
        Self {
            target_url: target_url.into(),
            started_at,
            finished_at: None,
            outcome: Outcome::Failed,
        }
    }

    /// Duration in microseconds.
    ///
    /// Only defined for successful records with a finish time strictly after
    /// the start. Everything else contributes nothing to latency aggregates.
    pub fn duration_micros(&self) -> Option<i64> {
        if self.outcome != Outcome::Success {
            return None;
        }
        let finished = self.finished_at?;
        (finished - self.started_at)
            .num_microseconds()
            .filter(|micros| *micros > 0)
    }
}

/// Persistent record of one forwarded message.
#[derive(Debug, Clone, PartialEq)]
pub struct SentMessage {
    /// Local identifier (uuid v4)
    pub id: String,
    /// Identifier assigned by the provider that accepted the message
    pub provider_id: Option<String>,
    /// Recipient identifier (phone number)
    pub destination: String,
    /// `pending`, `failed_to_send`, or a status reported by a delivery callback
    pub status: String,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    /// Target that accepted the message
    pub target_url: Option<String>,
}

impl SentMessage {
    pub const STATUS_PENDING: &'static str = "pending";
    pub const STATUS_FAILED_TO_SEND: &'static str = "failed_to_send";

    /// Start a new pending message record.
    pub fn pending(destination: impl Into<String>, start_time: DateTime<Utc>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            provider_id: None,
            destination: destination.into(),
            status: Self::STATUS_PENDING.to_string(),
            start_time,
            end_time: None,
            target_url: None,
        }
    }
}
