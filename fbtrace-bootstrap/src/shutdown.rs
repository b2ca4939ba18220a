// /////////////////////////////////////////////////////////////////////////////
// fbtrace
// /////////////////////////////////////////////////////////////////////////////

//! Shutdown coordination for the `record` subcommand: a cancellation
//! token propagated to the synthetic producer and the sink's worker
//! teardown, triggered by Ctrl-C or an optional `--duration`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

/// Lightweight clone-able token that can be handed to async tasks so
/// they can race their work against a shutdown signal.
#[derive(Clone)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl CancellationToken {
    fn new() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
            notify: Arc::new(Notify::new()),
        }
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    pub async fn cancelled(&self) {
        if self.is_cancelled() {
            return;
        }
        self.notify.notified().await;
    }
}

/// Coordinates a single shutdown across the `record` subcommand's
/// producer task and the sink teardown that follows it.
#[derive(Clone)]
pub struct ShutdownCoordinator {
    token: CancellationToken,
    shutdown_initiated: Arc<AtomicBool>,
}

impl ShutdownCoordinator {
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
            shutdown_initiated: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutdown_initiated.load(Ordering::SeqCst)
    }

    /// Idempotent: the first caller wins, later calls are no-ops.
    pub fn initiate_shutdown(&self) {
        if self
            .shutdown_initiated
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            tracing::info!("initiating graceful shutdown");
            self.token.cancel();
        }
    }

    /// Waits for Ctrl-C or `duration`, whichever comes first, then
    /// initiates shutdown. Used by `record` when `--duration` is set;
    /// with no duration the caller should just await Ctrl-C directly.
    pub async fn run_until(&self, duration: Option<Duration>) {
        match duration {
            Some(duration) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = tokio::time::sleep(duration) => {}
                }
            }
            None => {
                let _ = tokio::signal::ctrl_c().await;
            }
        }
        self.initiate_shutdown();
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_coordinator_is_not_shutting_down() {
        let coordinator = ShutdownCoordinator::new();
        assert!(!coordinator.is_shutting_down());
        assert!(!coordinator.token().is_cancelled());
    }

    #[test]
    fn initiate_shutdown_cancels_every_outstanding_token() {
        let coordinator = ShutdownCoordinator::new();
        let token = coordinator.token();

        coordinator.initiate_shutdown();

        assert!(coordinator.is_shutting_down());
        assert!(token.is_cancelled());
    }

    #[test]
    fn initiate_shutdown_is_idempotent() {
        let coordinator = ShutdownCoordinator::new();
        coordinator.initiate_shutdown();
        coordinator.initiate_shutdown();
        assert!(coordinator.is_shutting_down());
    }

    #[tokio::test]
    async fn run_until_returns_when_duration_elapses() {
        let coordinator = ShutdownCoordinator::new();
        coordinator.run_until(Some(Duration::from_millis(10))).await;
        assert!(coordinator.is_shutting_down());
    }

    #[tokio::test]
    async fn cancelled_future_resolves_immediately_once_already_cancelled() {
        let token = ShutdownCoordinator::new().token();
        token.cancel();
        token.cancelled().await;
        assert!(token.is_cancelled());
    }
}
