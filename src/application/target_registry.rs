//! Target Registry
//!
//! Read-through snapshot of the configured targets. Readers get an
//! `Arc` to an immutable list, so a refresh never exposes a partially
//! updated set to an in-progress selection.

use crate::domain::entities::Target;
use crate::domain::error::StorageError;
use crate::domain::ports::TargetRepository;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub struct TargetRegistry {
    repo: Arc<dyn TargetRepository>,
    snapshot: RwLock<Arc<Vec<Target>>>,
    version: AtomicU64,
}

impl TargetRegistry {
    /// Create an empty registry. Call `refresh` to load the first snapshot.
    pub fn new(repo: Arc<dyn TargetRepository>) -> Self {
        Self {
            repo,
            snapshot: RwLock::new(Arc::new(Vec::new())),
            version: AtomicU64::new(0),
        }
    }

    /// Current snapshot, in storage order.
    pub fn list(&self) -> Arc<Vec<Target>> {
        self.snapshot.read().clone()
    }

    /// Number of snapshots loaded so far.
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::SeqCst)
    }

    /// Reload targets from storage and swap the snapshot.
    ///
    /// On error the previous snapshot stays in place.
    pub async fn refresh(&self) -> Result<usize, StorageError> {
        let targets = self.repo.list_targets().await?;
        let count = targets.len();
        *self.snapshot.write() = Arc::new(targets);
        self.version.fetch_add(1, Ordering::SeqCst);
        Ok(count)
    }

    /// Start the background reload task.
    #[cfg_attr(coverage_nightly, coverage(off))]
    pub fn start_sync(self: &Arc<Self>, interval: Duration) {
        let registry = self.clone();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // First tick fires immediately; the boot sequence already loaded once
            ticker.tick().await;
            loop {
                ticker.tick().await;
                match registry.refresh().await {
                    Ok(count) => tracing::debug!(
                        "target reload ok, version={} targets={}",
                        registry.version(),
                        count
                    ),
                    Err(e) => tracing::error!("error reading targets: {:?}", e),
                }
            }
        });
    }
}
