//! Graceful Shutdown Handler
//!
//! Coordinates termination of the HTTP server with the dispatches it has
//! in flight.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, Notify};

/// Shutdown coordinator for graceful termination.
///
/// Tracks in-flight dispatches and signals shutdown to all components.
#[derive(Clone)]
pub struct ShutdownController {
    shutdown_initiated: Arc<AtomicBool>,
    in_flight: Arc<AtomicUsize>,
    shutdown_tx: broadcast::Sender<()>,
    drain_complete: Arc<Notify>,
}

impl ShutdownController {
    pub fn new() -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            shutdown_initiated: Arc::new(AtomicBool::new(false)),
            in_flight: Arc::new(AtomicUsize::new(0)),
            shutdown_tx,
            drain_complete: Arc::new(Notify::new()),
        }
    }

    /// Subscribe to shutdown notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.shutdown_tx.subscribe()
    }

    /// Initiate graceful shutdown. Idempotent.
    pub fn shutdown(&self) {
        if !self.shutdown_initiated.swap(true, Ordering::SeqCst) {
            tracing::info!("initiating graceful shutdown");
            let _ = self.shutdown_tx.send(());
        }
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown_initiated.load(Ordering::SeqCst)
    }

    /// Number of dispatches currently holding a guard.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Resolves once shutdown has been initiated.
    ///
    /// Suitable for axum's `with_graceful_shutdown`.
    pub async fn wait_for_shutdown(&self) {
        let mut rx = self.subscribe();
        if self.is_shutdown() {
            return;
        }
        let _ = rx.recv().await;
    }

    /// Wait for in-flight dispatches to finish, up to `timeout`.
    pub async fn wait_for_drain(&self, timeout: Duration) -> bool {
        let drained = self.drain_complete.notified();
        tokio::pin!(drained);
        // Register before checking so a guard dropped in between is not missed
        drained.as_mut().enable();

        if self.in_flight() == 0 {
            return true;
        }

        tokio::select! {
            _ = drained => true,
            _ = tokio::time::sleep(timeout) => {
                tracing::warn!(
                    "drain timeout: {} dispatches still in flight",
                    self.in_flight()
                );
                false
            }
        }
    }

    /// Track one dispatch until the returned guard is dropped.
    ///
    /// Returns `None` once shutdown has begun.
    pub fn dispatch_guard(&self) -> Option<DispatchGuard> {
        if self.is_shutdown() {
            return None;
        }
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        Some(DispatchGuard {
            controller: self.clone(),
        })
    }

    fn dispatch_ended(&self) {
        let prev = self.in_flight.fetch_sub(1, Ordering::SeqCst);
        if prev == 1 && self.is_shutdown() {
            self.drain_complete.notify_waiters();
        }
    }
}

impl Default for ShutdownController {
    fn default() -> Self {
        Self::new()
    }
}

/// RAII guard for one in-flight dispatch.
pub struct DispatchGuard {
    controller: ShutdownController,
}

impl Drop for DispatchGuard {
    fn drop(&mut self) {
        self.controller.dispatch_ended();
    }
}

/// Wait for SIGINT or SIGTERM, then initiate shutdown.
#[cfg_attr(coverage_nightly, coverage(off))]
pub async fn shutdown_signal(controller: ShutdownController) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("received Ctrl+C, initiating shutdown");
        }
        _ = terminate => {
            tracing::info!("received SIGTERM, initiating shutdown");
        }
    }

    controller.shutdown();
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn test_shutdown_controller_new() {
        let controller = ShutdownController::default();
        assert!(!controller.is_shutdown());
        assert_eq!(controller.in_flight(), 0);
    }

    #[test]
    fn test_shutdown_initiates_once() {
        let controller = ShutdownController::new();
        let mut rx = controller.subscribe();

        controller.shutdown();
        controller.shutdown();

        assert!(controller.is_shutdown());
        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_dispatch_guard_tracks_in_flight() {
        let controller = ShutdownController::new();

        let first = controller.dispatch_guard().unwrap();
        let second = controller.dispatch_guard().unwrap();
        assert_eq!(controller.in_flight(), 2);

        drop(first);
        assert_eq!(controller.in_flight(), 1);
        drop(second);
        assert_eq!(controller.in_flight(), 0);
    }

    #[test]
    fn test_no_guard_after_shutdown() {
        let controller = ShutdownController::new();
        controller.shutdown();

        assert!(controller.dispatch_guard().is_none());
        assert_eq!(controller.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_wait_for_shutdown_resolves() {
        let controller = ShutdownController::new();
        let waiter = controller.clone();
        let handle = tokio::spawn(async move { waiter.wait_for_shutdown().await });

        controller.shutdown();

        let result = tokio::time::timeout(Duration::from_millis(200), handle).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_wait_for_shutdown_after_initiated() {
        let controller = ShutdownController::new();
        controller.shutdown();

        let result =
            tokio::time::timeout(Duration::from_millis(100), controller.wait_for_shutdown()).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_wait_for_drain_immediate() {
        let controller = ShutdownController::new();
        controller.shutdown();

        assert!(controller.wait_for_drain(Duration::from_millis(100)).await);
    }

    #[tokio::test]
    async fn test_wait_for_drain_with_dispatches() {
        let controller = ShutdownController::new();
        let guard = controller.dispatch_guard().unwrap();
        controller.shutdown();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            drop(guard);
        });

        assert!(controller.wait_for_drain(Duration::from_millis(500)).await);
    }

    #[tokio::test]
    async fn test_wait_for_drain_timeout() {
        let controller = ShutdownController::new();
        let _guard = controller.dispatch_guard().unwrap();
        controller.shutdown();

        assert!(!controller.wait_for_drain(Duration::from_millis(50)).await);
    }
}
