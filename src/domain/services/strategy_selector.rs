//! Strategy Selector Service
//!
//! Pure domain logic for picking one target per dispatch attempt.
//! Strategy and round-robin cursor live here as atomics, so a single
//! selector instance can be shared by every concurrent dispatch.

use crate::domain::entities::Target;
use crate::domain::error::SelectionError;
use crate::domain::ports::LatencyStore;
use crate::domain::value_objects::{LatencyWindow, Strategy};
use rand::Rng;
use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};

/// Selector for the target of a single dispatch attempt.
///
/// The active strategy can be switched at runtime. A selection uses the
/// strategy active at the instant it reads it; in-flight selections are
/// not linearized with updates.
pub struct StrategySelector {
    strategy: AtomicU8,
    cursor: AtomicUsize,
    latency_window: LatencyWindow,
}

impl StrategySelector {
    /// Create a selector with an initial strategy and the rolling average
    /// parameters used by `rolling_avg`.
    pub fn new(strategy: Strategy, latency_window: LatencyWindow) -> Self {
        Self {
            strategy: AtomicU8::new(strategy.to_tag()),
            cursor: AtomicUsize::new(0),
            latency_window,
        }
    }

    /// Get the currently active strategy.
    pub fn strategy(&self) -> Strategy {
        Strategy::from_tag(self.strategy.load(Ordering::Acquire))
    }

    /// Switch the active strategy by wire name.
    ///
    /// Unknown names leave the previous strategy in place. Returns whether
    /// the name was accepted.
    pub fn set_strategy(&self, name: &str) -> bool {
        match Strategy::from_name(name) {
            Some(strategy) => {
                self.strategy.store(strategy.to_tag(), Ordering::Release);
                tracing::info!("load balancing strategy set to {}", strategy);
                true
            }
            None => {
                tracing::debug!("ignoring unknown strategy {:?}", name);
                false
            }
        }
    }

    pub fn latency_window(&self) -> LatencyWindow {
        self.latency_window
    }

    /// Select a target using the active strategy.
    ///
    /// # Arguments
    /// * `targets` - Snapshot of the registry, in registry order
    /// * `latency` - Latency history used by `rolling_avg`
    ///
    /// # Returns
    /// A clone of the selected target, or `NoTargetsAvailable`
    pub fn select(
        &self,
        targets: &[Target],
        latency: &dyn LatencyStore,
    ) -> Result<Target, SelectionError> {
        if targets.is_empty() {
            return Err(SelectionError::NoTargetsAvailable);
        }

        let strategy = self.strategy();
        let target = match strategy {
            Strategy::WeightedRandom => Self::pick_weighted(targets, &mut rand::thread_rng()),
            Strategy::RollingAvg => {
                let LatencyWindow { limit, window } = self.latency_window;
                Self::pick_lowest_latency(targets, |url| {
                    latency.rolling_average(url, limit, window)
                })
            }
            Strategy::RoundRobin => self.pick_round_robin(targets),
        }
        .ok_or(SelectionError::NoTargetsAvailable)?;

        tracing::debug!("{} selected target {}", strategy, target.url);
        Ok(target.clone())
    }

    /// Uniform draw from the virtual pool where each target occupies
    /// `pool_slots()` entries.
    ///
    /// The pool is never materialized: the draw is mapped back to a target
    /// through the running slot count, which is equivalent.
    pub fn pick_weighted<'a, R: Rng>(
        targets: &'a [Target],
        rng: &mut R,
    ) -> Option<&'a Target> {
        let total: usize = targets.iter().map(Target::pool_slots).sum();
        if total == 0 {
            return None;
        }

        let mut draw = rng.gen_range(0..total);
        for target in targets {
            let slots = target.pool_slots();
            if draw < slots {
                return Some(target);
            }
            draw -= slots;
        }
        None
    }

    /// Target with the minimum rolling average; first occurrence wins ties.
    ///
    /// A target without data reports `0.0` and is therefore preferred over
    /// every target with observed latency.
    pub fn pick_lowest_latency<F>(targets: &[Target], average: F) -> Option<&Target>
    where
        F: Fn(&str) -> f64,
    {
        let mut best: Option<(&Target, f64)> = None;

        for target in targets {
            let avg = average(&target.url);
            match best {
                Some((_, best_avg)) if avg < best_avg => best = Some((target, avg)),
                None => best = Some((target, avg)),
                _ => {}
            }
        }

        best.map(|(target, _)| target)
    }

    /// Next target in registry order. The cursor is advanced with a single
    /// atomic increment and reduced modulo the snapshot length.
    fn pick_round_robin<'a>(&self, targets: &'a [Target]) -> Option<&'a Target> {
        if targets.is_empty() {
            return None;
        }
        // Wrapping at usize::MAX may repeat one slot when len does not divide 2^64
        let index = self.cursor.fetch_add(1, Ordering::Relaxed) % targets.len();
        targets.get(index)
    }
}

impl Default for StrategySelector {
    fn default() -> Self {
        Self::new(Strategy::default(), LatencyWindow::default())
    }
}
