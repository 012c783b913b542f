//! The running listener.
//!
//! # Responsibilities
//! - Bind the configured address and run the accept loop on its own task
//! - Apply the four configured timeouts to every accepted connection
//! - Stop: refuse new connections, drain in-flight ones up to a deadline,
//!   then abort whatever is left
//!
//! # Design Decisions
//! - Timeouts are read from the live [`ConfigStore`] at accept time, so a
//!   reload that keeps the address applies to new connections without a
//!   restart
//! - A handle can be stopped once; later calls are no-ops
//! - Dropping a handle without stopping it stops the server with no grace

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use axum::{middleware, Router};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::{TokioIo, TokioTimer};
use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{oneshot, watch, Mutex};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time;
use tower::{ServiceBuilder, ServiceExt};
use tower_http::timeout::{RequestBodyTimeoutLayer, TimeoutLayer};
use tracing::Instrument;

use crate::config::{ConfigStore, ServerConfig, TimeoutConfig};
use crate::http::handler;
use crate::net::listener::{self, BindError};
use crate::net::{ConnectionGuard, ConnectionTracker, TrackedStream};

/// Upper bound on how often a connection checks its idle clock.
const IDLE_CHECK_INTERVAL: Duration = Duration::from_secs(1);

static SERVER_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Identifies one server instance across restarts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ServerId(u64);

impl ServerId {
    fn next() -> Self {
        Self(SERVER_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl std::fmt::Display for ServerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "srv-{}", self.0)
    }
}

/// The graceful drain deadline elapsed with connections still open.
///
/// The remaining connections have already been terminated when this is
/// returned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("graceful shutdown deadline of {deadline:?} elapsed with {active} connection(s) still active")]
pub struct ShutdownTimeout {
    pub active: usize,
    pub deadline: Duration,
}

struct Running {
    stop_tx: oneshot::Sender<Duration>,
    task: JoinHandle<Result<(), ShutdownTimeout>>,
}

/// Owns one running listener and its connections.
pub struct ServerHandle {
    id: ServerId,
    listen_address: String,
    local_addr: SocketAddr,
    connections: ConnectionTracker,
    running: Mutex<Option<Running>>,
}

impl std::fmt::Debug for ServerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerHandle")
            .field("id", &self.id)
            .field("listen_address", &self.listen_address)
            .field("local_addr", &self.local_addr)
            .finish()
    }
}

impl ServerHandle {
    /// Bind `config`'s address and start serving.
    ///
    /// Returns once the listener is bound; the accept loop runs on a spawned
    /// task. Per-connection timeouts come from `live`.
    pub async fn start(
        config: &ServerConfig,
        live: Arc<ConfigStore>,
    ) -> Result<Arc<Self>, BindError> {
        Self::start_with_router(config, live, handler::router()).await
    }

    pub(crate) async fn start_with_router(
        config: &ServerConfig,
        live: Arc<ConfigStore>,
        app: Router,
    ) -> Result<Arc<Self>, BindError> {
        let listener = listener::bind(config).await?;
        let local_addr = listener.local_addr().map_err(|source| BindError {
            address: config.listen_address().to_string(),
            source,
        })?;

        let id = ServerId::next();
        let connections = ConnectionTracker::new();
        let (stop_tx, stop_rx) = oneshot::channel();

        let span = tracing::info_span!("server", server_id = %id, address = %local_addr);
        let task = tokio::spawn(
            accept_loop(listener, app, live, connections.clone(), stop_rx)
                .instrument(span),
        );

        tracing::info!(server_id = %id, address = %local_addr, "Starting WaitR server");

        Ok(Arc::new(Self {
            id,
            listen_address: config.listen_address().to_string(),
            local_addr,
            connections,
            running: Mutex::new(Some(Running { stop_tx, task })),
        }))
    }

    /// Stop accepting, drain for up to `deadline`, then force-close.
    ///
    /// Only the first call does anything; later calls return `Ok(())`.
    pub async fn stop(&self, deadline: Duration) -> Result<(), ShutdownTimeout> {
        let Some(running) = self.running.lock().await.take() else {
            tracing::debug!(server_id = %self.id, "Server already stopped");
            return Ok(());
        };

        tracing::info!(
            server_id = %self.id,
            active_connections = self.connections.active_count(),
            deadline_ms = deadline.as_millis() as u64,
            "Stopping server"
        );

        // The accept loop only exits early if it panicked; the join below
        // reports that case.
        let _ = running.stop_tx.send(deadline);

        match running.task.await {
            Ok(result) => result,
            Err(e) => {
                tracing::error!(server_id = %self.id, error = %e, "Accept loop terminated abnormally");
                Ok(())
            }
        }
    }

    pub fn id(&self) -> ServerId {
        self.id
    }

    /// The listen address as configured when this server was started.
    pub fn listen_address(&self) -> &str {
        &self.listen_address
    }

    /// The address actually bound.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn active_connections(&self) -> u64 {
        self.connections.active_count()
    }

    pub async fn is_stopped(&self) -> bool {
        self.running.lock().await.is_none()
    }
}

async fn accept_loop(
    listener: TcpListener,
    app: Router,
    live: Arc<ConfigStore>,
    connections: ConnectionTracker,
    mut stop_rx: oneshot::Receiver<Duration>,
) -> Result<(), ShutdownTimeout> {
    let (drain_tx, drain_rx) = watch::channel(false);
    let mut tasks = JoinSet::new();

    let deadline = loop {
        tokio::select! {
            stop = &mut stop_rx => {
                // A dropped handle means nobody is waiting for a drain.
                break stop.unwrap_or(Duration::ZERO);
            }
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    let timeouts = live.get().timeouts();
                    let guard = connections.track();
                    tasks.spawn(serve_connection(
                        stream,
                        peer,
                        app.clone(),
                        timeouts,
                        guard,
                        drain_rx.clone(),
                    ));
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to accept connection");
                    time::sleep(Duration::from_millis(50)).await;
                }
            },
            Some(_) = tasks.join_next(), if !tasks.is_empty() => {}
        }
    };

    drop(listener);
    let _ = drain_tx.send(true);

    let drained = time::timeout(deadline, async {
        while tasks.join_next().await.is_some() {}
    })
    .await;

    match drained {
        Ok(()) => {
            tracing::info!("Server stopped");
            Ok(())
        }
        Err(_) => {
            let active = tasks.len();
            tasks.shutdown().await;
            tracing::warn!(active, "Drain deadline elapsed, connections terminated");
            Err(ShutdownTimeout { active, deadline })
        }
    }
}

async fn serve_connection(
    stream: TcpStream,
    peer: SocketAddr,
    app: Router,
    timeouts: TimeoutConfig,
    guard: ConnectionGuard,
    mut drain: watch::Receiver<bool>,
) {
    let (stream, activity) = TrackedStream::new(stream);

    // Requests are counted outside the timeouts so a 408 is recorded as one.
    let service = ServiceBuilder::new()
        .layer(middleware::from_fn(handler::count_requests))
        .layer(RequestBodyTimeoutLayer::new(timeouts.read))
        .layer(TimeoutLayer::with_status_code(StatusCode::REQUEST_TIMEOUT, timeouts.write))
        .service(app);
    let service = service_fn(move |request: axum::http::Request<Incoming>| {
        service.clone().oneshot(request.map(axum::body::Body::new))
    });

    let conn = http1::Builder::new()
        .timer(TokioTimer::new())
        .header_read_timeout(timeouts.read_header)
        .keep_alive(true)
        .serve_connection(TokioIo::new(stream), service);
    tokio::pin!(conn);

    let mut idle_check = time::interval(timeouts.idle.min(IDLE_CHECK_INTERVAL));
    let mut closing = false;

    loop {
        tokio::select! {
            result = conn.as_mut() => {
                if let Err(e) = result {
                    tracing::debug!(connection_id = %guard.id(), peer = %peer, error = %e, "Connection error");
                }
                break;
            }
            changed = drain.changed(), if !closing => {
                if changed.is_err() || *drain.borrow() {
                    closing = true;
                    conn.as_mut().graceful_shutdown();
                }
            }
            _ = idle_check.tick(), if !closing => {
                if activity.idle_for() >= timeouts.idle {
                    tracing::debug!(connection_id = %guard.id(), peer = %peer, "Idle timeout, closing connection");
                    closing = true;
                    conn.as_mut().graceful_shutdown();
                }
            }
        }
    }
}
