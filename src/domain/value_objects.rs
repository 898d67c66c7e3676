//! Value Objects - Immutable domain primitives
//!
//! Value objects are identified by their value rather than identity.
//! They are immutable and can be freely shared.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Load balancing strategy used to pick a target for one dispatch attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Draw uniformly from a pool where each target appears `round(weight * 100)` times
    WeightedRandom,
    /// Pick the target with the lowest rolling average latency
    RollingAvg,
    /// Cycle through the targets in registry order
    RoundRobin,
}

impl Strategy {
    /// Every strategy the selector accepts, in allow-list order.
    pub const ALL: [Strategy; 3] = [
        Strategy::WeightedRandom,
        Strategy::RollingAvg,
        Strategy::RoundRobin,
    ];

    /// Parse a strategy from its wire name.
    ///
    /// Returns None for names outside the allow-list.
    ///
    /// # Examples
    /// ```
    /// use sms_balancer::Strategy;
    ///
    /// assert_eq!(Strategy::from_name("round_robin"), Some(Strategy::RoundRobin));
    /// assert_eq!(Strategy::from_name("round_rogers"), None);
    /// ```
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "weighted_random" => Some(Self::WeightedRandom),
            "rolling_avg" => Some(Self::RollingAvg),
            "round_robin" => Some(Self::RoundRobin),
            _ => None,
        }
    }

    /// Convert to the wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::WeightedRandom => "weighted_random",
            Self::RollingAvg => "rolling_avg",
            Self::RoundRobin => "round_robin",
        }
    }

    pub(crate) fn to_tag(self) -> u8 {
        match self {
            Self::WeightedRandom => 0,
            Self::RollingAvg => 1,
            Self::RoundRobin => 2,
        }
    }

    pub(crate) fn from_tag(tag: u8) -> Self {
        match tag {
            1 => Self::RollingAvg,
            2 => Self::RoundRobin,
            _ => Self::WeightedRandom,
        }
    }
}

impl Default for Strategy {
    fn default() -> Self {
        Self::WeightedRandom
    }
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Parameters of the rolling latency average used by `rolling_avg`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LatencyWindow {
    /// Maximum number of most recent records considered
    pub limit: usize,
    /// Only records started within this duration of now are considered
    pub window: Duration,
}

impl Default for LatencyWindow {
    fn default() -> Self {
        Self {
            limit: 5,
            window: Duration::from_secs(5 * 60),
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn test_strategy_from_name() {
        assert_eq!(Strategy::from_name("weighted_random"), Some(Strategy::WeightedRandom));
        assert_eq!(Strategy::from_name("rolling_avg"), Some(Strategy::RollingAvg));
        assert_eq!(Strategy::from_name("round_robin"), Some(Strategy::RoundRobin));
    }

    #[test]
    fn test_strategy_from_name_rejects_unknown() {
        assert_eq!(Strategy::from_name("round_rogers"), None);
        assert_eq!(Strategy::from_name(""), None);
        // Names are matched exactly
        assert_eq!(Strategy::from_name("Round_Robin"), None);
    }

    #[test]
    fn test_strategy_name_roundtrip() {
        for strategy in Strategy::ALL {
            assert_eq!(Strategy::from_name(strategy.as_str()), Some(strategy));
            assert_eq!(Strategy::from_tag(strategy.to_tag()), strategy);
        }
    }

    #[test]
    fn test_strategy_default() {
        assert_eq!(Strategy::default(), Strategy::WeightedRandom);
    }

    #[test]
    fn test_strategy_display() {
        assert_eq!(format!("{}", Strategy::RollingAvg), "rolling_avg");
    }

    #[test]
    fn test_strategy_serde_uses_wire_names() {
        let json = serde_json::to_string(&Strategy::RoundRobin).unwrap();
        assert_eq!(json, "\"round_robin\"");
        let parsed: Strategy = serde_json::from_str("\"weighted_random\"").unwrap();
        assert_eq!(parsed, Strategy::WeightedRandom);
    }

    #[test]
    fn test_latency_window_default() {
        let window = LatencyWindow::default();
        assert_eq!(window.limit, 5);
        assert_eq!(window.window, Duration::from_secs(300));
    }
}
