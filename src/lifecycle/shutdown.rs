//! Shutdown coordination.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;

use crate::lifecycle::coordinator::LifecycleCoordinator;
use crate::lifecycle::signals::SignalSource;

/// Default drain deadline for process shutdown.
pub const DEFAULT_SHUTDOWN_DEADLINE: Duration = Duration::from_secs(10);

/// Broadcast that long-running tasks (the config watcher) subscribe to.
#[derive(Debug, Clone)]
pub struct Shutdown {
    tx: broadcast::Sender<()>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    /// Notify every subscriber. Safe to call with no subscribers.
    pub fn trigger(&self) {
        let _ = self.tx.send(());
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

/// Waits for a termination signal and drains the service exactly once.
#[derive(Debug)]
pub struct ShutdownListener {
    coordinator: Arc<LifecycleCoordinator>,
    shutdown: Shutdown,
    deadline: Duration,
    fired: AtomicBool,
}

impl ShutdownListener {
    pub fn new(coordinator: Arc<LifecycleCoordinator>, shutdown: Shutdown, deadline: Duration) -> Self {
        Self {
            coordinator,
            shutdown,
            deadline,
            fired: AtomicBool::new(false),
        }
    }

    /// Block until a termination signal arrives, then shut down.
    ///
    /// Further signals while the drain runs are logged and ignored.
    pub async fn run(&self, mut signals: impl SignalSource) {
        let signal = signals.recv().await;
        tracing::info!(signal, "Shutdown signal received");

        let drain = self.shutdown_once();
        tokio::pin!(drain);

        loop {
            tokio::select! {
                _ = &mut drain => return,
                signal = signals.recv() => {
                    tracing::warn!(signal, "Shutdown already in progress, ignoring signal");
                }
            }
        }
    }

    /// Stop the watcher and drain the live server.
    ///
    /// Returns `false` without doing anything if shutdown already ran.
    pub async fn shutdown_once(&self) -> bool {
        if self.fired.swap(true, Ordering::SeqCst) {
            tracing::debug!("Shutdown already triggered");
            return false;
        }

        self.shutdown.trigger();

        match self.coordinator.shutdown(self.deadline).await {
            Ok(()) => tracing::info!("Shutdown complete"),
            Err(e) => tracing::error!(error = %e, "Error during shutdown"),
        }
        true
    }
}
