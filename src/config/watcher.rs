//! Configuration file watcher for hot reload.
//!
//! # States
//! ```text
//! Idle → PendingDebounce        on a "modified" notification
//! PendingDebounce → Pending...  on another one (window re-armed)
//! PendingDebounce → Idle        when the window elapses; a reload is spawned
//! any → Closed                  on stop, or when the notification source
//!                               breaks and cannot be resubscribed
//! ```
//!
//! # Design Decisions
//! - The window is timed from the last notification, so a burst of writes
//!   yields one reload
//! - Load and validation run on the blocking pool; the reload runs on its
//!   own task, so a slow reload never delays the next notification
//! - A failed reload is logged and leaves the current config in force

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::time::{self, Instant};

use crate::config::loader::{ConfigSource, LoadError};
use crate::config::validation::{validate, ConfigError};
use crate::lifecycle::LifecycleCoordinator;
use crate::observability::metrics::{self, ReloadOutcome};
use crate::resilience::Backoff;

/// Default quiet period after the last change before reloading.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_secs(3);

/// Abstract notification from a change source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeEvent {
    /// The watched content was written.
    Modified,
    /// The source reported an error; the subscription is considered broken.
    Error(String),
    /// The source ended the subscription.
    Closed,
}

#[derive(Debug, Error)]
#[error("failed to watch {path:?}: {source}")]
pub struct WatchError {
    pub path: PathBuf,
    #[source]
    pub source: notify::Error,
}

/// A live subscription. Dropping it ends the underlying watch.
pub struct Subscription {
    events: mpsc::UnboundedReceiver<ChangeEvent>,
    _guard: Box<dyn Send>,
}

impl Subscription {
    pub fn new(events: mpsc::UnboundedReceiver<ChangeEvent>, guard: impl Send + 'static) -> Self {
        Self {
            events,
            _guard: Box::new(guard),
        }
    }
}

/// Something that emits change notifications for the config source.
pub trait ChangeSource: Send + Sync + 'static {
    fn subscribe(&self) -> Result<Subscription, WatchError>;
}

/// Filesystem notifications for one config file.
///
/// The parent directory is watched so editors that save by renaming a temp
/// file over the original are still seen.
#[derive(Debug, Clone)]
pub struct FsChangeSource {
    path: PathBuf,
}

impl FsChangeSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ChangeSource for FsChangeSource {
    fn subscribe(&self) -> Result<Subscription, WatchError> {
        let (tx, rx) = mpsc::unbounded_channel();
        let file_name = self.path.file_name().map(|n| n.to_os_string());
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| {
                let event = match res {
                    Ok(event) => event,
                    Err(e) => {
                        let _ = tx.send(ChangeEvent::Error(e.to_string()));
                        return;
                    }
                };

                let touches_file = event
                    .paths
                    .iter()
                    .any(|p| p.file_name().map(|n| n.to_os_string()) == file_name);
                if touches_file && (event.kind.is_modify() || event.kind.is_create()) {
                    let _ = tx.send(ChangeEvent::Modified);
                }
            },
            Config::default(),
        )
        .map_err(|source| WatchError {
            path: self.path.clone(),
            source,
        })?;

        watcher
            .watch(&dir, RecursiveMode::NonRecursive)
            .map_err(|source| WatchError {
                path: self.path.clone(),
                source,
            })?;

        Ok(Subscription::new(rx, watcher))
    }
}

/// Observable watcher state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatcherState {
    Idle,
    PendingDebounce,
    Closed,
}

/// Tuning for [`ChangeWatcher`].
#[derive(Debug, Clone, Copy)]
pub struct WatcherOptions {
    pub debounce: Duration,
    /// Resubscription attempts after the source breaks. Zero disables.
    pub resubscribe_attempts: u32,
    pub resubscribe_backoff: Backoff,
}

impl Default for WatcherOptions {
    fn default() -> Self {
        Self {
            debounce: DEFAULT_DEBOUNCE,
            resubscribe_attempts: 3,
            resubscribe_backoff: Backoff::new(Duration::from_millis(500), Duration::from_secs(5)),
        }
    }
}

/// Why a reload attempt did not apply.
#[derive(Debug, Error)]
pub enum ReloadError {
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error(transparent)]
    Invalid(#[from] ConfigError),
    #[error("reload task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Turns change notifications into debounced, validated reloads.
pub struct ChangeWatcher {
    source: Arc<dyn ConfigSource>,
    changes: Box<dyn ChangeSource>,
    coordinator: Arc<LifecycleCoordinator>,
    options: WatcherOptions,
    state: watch::Sender<WatcherState>,
}

impl ChangeWatcher {
    pub fn new(
        source: Arc<dyn ConfigSource>,
        changes: Box<dyn ChangeSource>,
        coordinator: Arc<LifecycleCoordinator>,
        options: WatcherOptions,
    ) -> Self {
        let (state, _) = watch::channel(WatcherState::Idle);
        Self {
            source,
            changes,
            coordinator,
            options,
            state,
        }
    }

    /// Follow the watcher's state transitions.
    pub fn state(&self) -> watch::Receiver<WatcherState> {
        self.state.subscribe()
    }

    /// Run until stopped or until the source breaks for good.
    pub async fn run(self, mut stop: broadcast::Receiver<()>) {
        let location = self.source.describe();
        let Some(mut subscription) = self.resubscribe(&mut stop, 0).await else {
            self.state.send_replace(WatcherState::Closed);
            return;
        };

        tracing::info!(
            path = %location,
            debounce_ms = self.options.debounce.as_millis() as u64,
            "Watching for config changes"
        );

        let debounce = time::sleep(self.options.debounce);
        tokio::pin!(debounce);
        let mut pending = false;
        // A dropped stop sender is not a stop request.
        let mut stop_open = true;

        loop {
            tokio::select! {
                event = subscription.events.recv() => match event {
                    Some(ChangeEvent::Modified) => {
                        tracing::debug!(path = %location, "Detected config file change");
                        debounce.as_mut().reset(Instant::now() + self.options.debounce);
                        if !pending {
                            pending = true;
                            self.state.send_replace(WatcherState::PendingDebounce);
                        }
                    }
                    Some(ChangeEvent::Error(reason)) => {
                        tracing::error!(path = %location, error = %reason, "Watcher error");
                        drop(subscription);
                        match self.resubscribe(&mut stop, self.options.resubscribe_attempts).await {
                            Some(next) => subscription = next,
                            None => break,
                        }
                    }
                    Some(ChangeEvent::Closed) | None => {
                        tracing::warn!(path = %location, "Change notifications closed");
                        break;
                    }
                },
                () = &mut debounce, if pending => {
                    pending = false;
                    self.state.send_replace(WatcherState::Idle);
                    let source = Arc::clone(&self.source);
                    let coordinator = Arc::clone(&self.coordinator);
                    tokio::spawn(async move {
                        let _ = reload(source, &coordinator).await;
                    });
                }
                signal = stop.recv(), if stop_open => match signal {
                    Err(broadcast::error::RecvError::Closed) => stop_open = false,
                    Ok(()) | Err(broadcast::error::RecvError::Lagged(_)) => {
                        tracing::info!(path = %location, "Config watcher stopping");
                        break;
                    }
                },
            }
        }

        self.state.send_replace(WatcherState::Closed);
        tracing::info!(path = %location, "Config watcher closed, further changes will not be applied");
    }

    /// Subscribe, retrying up to `retries` times with backoff.
    async fn resubscribe(
        &self,
        stop: &mut broadcast::Receiver<()>,
        retries: u32,
    ) -> Option<Subscription> {
        let mut attempt = 0;
        loop {
            match self.changes.subscribe() {
                Ok(subscription) => return Some(subscription),
                Err(e) if attempt < retries => {
                    attempt += 1;
                    let delay = self.options.resubscribe_backoff.delay(attempt);
                    tracing::warn!(error = %e, attempt, delay_ms = delay.as_millis() as u64, "Resubscribing to config changes");
                    if wait_or_stop(stop, delay).await {
                        return None;
                    }
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to watch config file");
                    return None;
                }
            }
        }
    }
}

/// Sleep for `delay`. Returns `true` if a stop arrived first.
async fn wait_or_stop(stop: &mut broadcast::Receiver<()>, delay: Duration) -> bool {
    let sleep = time::sleep(delay);
    tokio::pin!(sleep);
    tokio::select! {
        () = &mut sleep => false,
        signal = stop.recv() => match signal {
            Err(broadcast::error::RecvError::Closed) => {
                sleep.await;
                false
            }
            Ok(()) | Err(broadcast::error::RecvError::Lagged(_)) => true,
        },
    }
}

/// Load, validate and apply the configuration once.
///
/// On failure the current configuration stays in force.
pub async fn reload(
    source: Arc<dyn ConfigSource>,
    coordinator: &LifecycleCoordinator,
) -> Result<(), ReloadError> {
    let loaded = tokio::task::spawn_blocking(move || -> Result<_, ReloadError> {
        let raw = source.load()?;
        Ok(validate(&raw)?)
    })
    .await;

    let config = match loaded {
        Ok(Ok(config)) => config,
        Ok(Err(e)) => {
            let outcome = match e {
                ReloadError::Invalid(_) => ReloadOutcome::Invalid,
                ReloadError::Load(_) | ReloadError::Task(_) => ReloadOutcome::LoadFailed,
            };
            metrics::record_reload(outcome);
            tracing::error!(error = %e, "Failed to reload config, continuing with previous config");
            return Err(e);
        }
        Err(join) => {
            metrics::record_reload(ReloadOutcome::LoadFailed);
            tracing::error!(error = %join, "Config reload task failed, continuing with previous config");
            return Err(ReloadError::Task(join));
        }
    };

    metrics::record_reload(ReloadOutcome::Applied);
    coordinator.on_reload(config).await;
    Ok(())
}
