//! Reload and restart orchestration.
//!
//! # Responsibilities
//! - Install a freshly validated configuration
//! - Decide whether the listener must be replaced (listen address changed)
//! - Run restarts off the caller's task so the watcher stays responsive
//! - Drain the live server on shutdown
//!
//! # Design Decisions
//! - Same-address reloads never touch the listener
//! - Restarts are serialised and always bind the latest stored config, so
//!   overlapping address changes settle on the last one
//! - A failed bind leaves no live listener until a later reload succeeds

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{self, Instant};

use crate::config::ServerConfig;
use crate::http::{ServerHandle, ShutdownTimeout};
use crate::lifecycle::context::AppContext;
use crate::net::BindError;
use crate::observability::metrics;

/// Default drain deadline for the old listener during an address change.
pub const DEFAULT_RESTART_DEADLINE: Duration = Duration::from_secs(5);

/// What a reload did to the listener.
#[derive(Debug)]
pub enum ReloadAction {
    /// No listener existed; one was started for the new config.
    Started(Result<ReconcileOutcome, BindError>),
    /// The listen address is unchanged; the listener was left alone.
    ConfigOnly,
    /// The listen address changed; a restart task was spawned.
    Restarting(JoinHandle<Result<ReconcileOutcome, BindError>>),
    /// Shutdown is in progress; only the config was swapped.
    Closing,
}

/// Result of bringing the listener in line with the stored config.
#[derive(Debug)]
pub enum ReconcileOutcome {
    /// A new listener was started.
    Started(Arc<ServerHandle>),
    /// The live listener already serves the stored address.
    Unchanged,
    /// Shutdown began before a listener could be started.
    Skipped,
}

/// Applies validated configurations to the running system.
#[derive(Debug)]
pub struct LifecycleCoordinator {
    ctx: Arc<AppContext>,
    restart_deadline: Duration,
}

impl LifecycleCoordinator {
    pub fn new(ctx: Arc<AppContext>, restart_deadline: Duration) -> Self {
        Self {
            ctx,
            restart_deadline,
        }
    }

    pub fn context(&self) -> &Arc<AppContext> {
        &self.ctx
    }

    /// Start the listener for the stored configuration.
    pub async fn start(&self) -> Result<ReconcileOutcome, BindError> {
        reconcile(&self.ctx, self.restart_deadline).await
    }

    /// Install `next` and restart the listener if its address changed.
    pub async fn on_reload(&self, next: ServerConfig) -> ReloadAction {
        let current = self.ctx.server().await;
        let next = Arc::new(next);
        let previous = self.ctx.store().swap(Arc::clone(&next));

        tracing::info!(
            listen_address = %next.listen_address(),
            static_path = %next.static_path().display(),
            proxy_routes = next.proxy_routes().len(),
            "Configuration hot-reloaded successfully"
        );

        if self.ctx.is_closing() {
            return ReloadAction::Closing;
        }

        if current.is_none() {
            tracing::info!("No running server, starting fresh instance");
            let started = reconcile(&self.ctx, self.restart_deadline).await;
            if let Err(e) = &started {
                tracing::error!(error = %e, "Failed to start server for reloaded configuration");
            }
            return ReloadAction::Started(started);
        }

        if previous.listen_address() == next.listen_address() {
            tracing::debug!(
                listen_address = %next.listen_address(),
                "Listen address unchanged, keeping listener"
            );
            return ReloadAction::ConfigOnly;
        }

        tracing::info!(
            old_address = %previous.listen_address(),
            new_address = %next.listen_address(),
            "Listen address changed, restarting HTTP server"
        );

        let ctx = Arc::clone(&self.ctx);
        let deadline = self.restart_deadline;
        ReloadAction::Restarting(tokio::spawn(async move {
            let outcome = reconcile(&ctx, deadline).await;
            if let Err(e) = &outcome {
                tracing::error!(error = %e, "Restart failed, no listener until the next successful reload");
            }
            outcome
        }))
    }

    /// Stop the live server within `deadline`. No listener is started after
    /// this begins.
    pub async fn shutdown(&self, deadline: Duration) -> Result<(), ShutdownTimeout> {
        tracing::info!("Performing cleanup...");
        self.ctx.begin_close();
        let started = Instant::now();

        // Wait for an in-flight restart so its new listener is not leaked.
        let guard = time::timeout(deadline, self.ctx.lock_transition()).await.ok();
        if guard.is_none() {
            tracing::warn!("Restart still in progress at shutdown deadline");
        }

        let result = match self.ctx.replace_server(None).await {
            Some(server) => {
                let remaining = deadline.saturating_sub(started.elapsed());
                server.stop(remaining).await
            }
            None => Ok(()),
        };
        drop(guard);
        result
    }
}

/// Make the live listener match the stored configuration.
async fn reconcile(
    ctx: &AppContext,
    restart_deadline: Duration,
) -> Result<ReconcileOutcome, BindError> {
    let _guard = ctx.lock_transition().await;
    if ctx.is_closing() {
        return Ok(ReconcileOutcome::Skipped);
    }

    let config = ctx.config();
    if let Some(server) = ctx.server().await {
        if server.listen_address() == config.listen_address() {
            return Ok(ReconcileOutcome::Unchanged);
        }

        match server.stop(restart_deadline).await {
            Ok(()) => tracing::info!(server_id = %server.id(), "Previous server instance shut down"),
            Err(e) => tracing::warn!(server_id = %server.id(), error = %e, "Previous server forced down"),
        }
        ctx.replace_server(None).await;
    }

    if ctx.is_closing() {
        return Ok(ReconcileOutcome::Skipped);
    }

    let server = ServerHandle::start(&config, Arc::clone(ctx.store())).await?;
    metrics::record_restart();
    Ok(install(ctx, server, restart_deadline).await)
}

/// Publish a freshly started server unless shutdown began while it was
/// binding, in which case it is stopped instead.
async fn install(
    ctx: &AppContext,
    server: Arc<ServerHandle>,
    deadline: Duration,
) -> ReconcileOutcome {
    ctx.replace_server(Some(Arc::clone(&server))).await;
    if !ctx.is_closing() {
        return ReconcileOutcome::Started(server);
    }

    // Shutdown stopped waiting for this restart and may have drained the
    // slot already.
    tracing::warn!(server_id = %server.id(), "Shutdown began during restart, stopping new server");
    ctx.replace_server(None).await;
    if let Err(e) = server.stop(deadline).await {
        tracing::warn!(server_id = %server.id(), error = %e, "New server forced down");
    }
    ReconcileOutcome::Skipped
}
