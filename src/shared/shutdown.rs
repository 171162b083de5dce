//! Graceful shutdown plumbing
//!
//! The reconciliation sweep and the aggregation scheduler run as
//! detached tokio tasks; a watch channel carries the stop request to
//! them. The flag is level-triggered, so a task that only starts
//! selecting after the request was made still sees it.

use std::future::Future;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{info, warn};

/// Cloneable handle background tasks select on.
#[derive(Clone)]
pub struct ShutdownSignal {
    rx: watch::Receiver<bool>,
}

impl ShutdownSignal {
    /// Resolves once shutdown has been requested; returns immediately
    /// when the request predates the call.
    pub async fn wait(&self) {
        let mut rx = self.rx.clone();
        loop {
            if *rx.borrow() {
                return;
            }
            if rx.changed().await.is_err() {
                // Sender dropped: the process is tearing down anyway.
                return;
            }
        }
    }

    pub fn is_triggered(&self) -> bool {
        *self.rx.borrow()
    }
}

/// Owning side, held by `main`.
pub struct ShutdownCoordinator {
    tx: watch::Sender<bool>,
    grace_secs: u64,
}

impl ShutdownCoordinator {
    pub fn new(grace_secs: u64) -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx, grace_secs }
    }

    pub fn signal(&self) -> ShutdownSignal {
        ShutdownSignal {
            rx: self.tx.subscribe(),
        }
    }

    pub fn trigger(&self) {
        if !self.tx.send_replace(true) {
            info!("🛑 Shutdown requested");
        }
    }

    /// Spawn the OS signal listener (SIGTERM, SIGINT).
    pub fn listen_for_signals(&self) {
        let tx = self.tx.clone();
        tokio::spawn(async move {
            wait_for_os_signal().await;
            if !tx.send_replace(true) {
                info!("🛑 Shutdown requested");
            }
        });
    }

    /// Block until shutdown is requested, then run `cleanup` bounded by
    /// the grace period. Returns `false` when the deadline passed.
    pub async fn finish<F>(&self, cleanup: F) -> bool
    where
        F: Future<Output = ()>,
    {
        self.signal().wait().await;
        info!("⏳ Shutting down (grace period: {}s)", self.grace_secs);
        match tokio::time::timeout(Duration::from_secs(self.grace_secs), cleanup).await {
            Ok(()) => true,
            Err(_) => {
                warn!("Cleanup did not finish within {}s", self.grace_secs);
                false
            }
        }
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new(30)
    }
}

async fn wait_for_os_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm = signal(SignalKind::terminate()).expect("Failed to install SIGTERM handler");
        let mut sigint = signal(SignalKind::interrupt()).expect("Failed to install SIGINT handler");

        tokio::select! {
            _ = sigterm.recv() => info!("📡 Received SIGTERM signal"),
            _ = sigint.recv() => info!("📡 Received SIGINT signal (Ctrl+C)"),
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
        info!("📡 Received Ctrl+C signal");
    }
}

// ── Tests ──────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn wait_resolves_after_trigger() {
        let coordinator = ShutdownCoordinator::new(5);
        let signal = coordinator.signal();

        let waiter = tokio::spawn(async move { signal.wait().await });
        coordinator.trigger();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter should resolve")
            .unwrap();
    }

    #[tokio::test]
    async fn late_subscriber_sees_prior_trigger() {
        let coordinator = ShutdownCoordinator::new(5);
        coordinator.trigger();

        let signal = coordinator.signal();
        assert!(signal.is_triggered());
        tokio::time::timeout(Duration::from_secs(1), signal.wait())
            .await
            .expect("level-triggered wait should resolve immediately");
    }

    #[tokio::test]
    async fn finish_times_out_on_stuck_cleanup() {
        let coordinator = ShutdownCoordinator::new(0);
        coordinator.trigger();
        assert!(!coordinator.finish(std::future::pending()).await);
    }

    #[tokio::test]
    async fn finish_runs_cleanup_within_grace() {
        let coordinator = ShutdownCoordinator::new(5);
        coordinator.trigger();
        let mut ran = false;
        assert!(coordinator.finish(async { ran = true }).await);
        assert!(ran);
    }
}
