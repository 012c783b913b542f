//! WaitR service host.
//!
//! # Architecture Overview
//!
//! ```text
//!                ┌──────────────────────────────────────────────────┐
//!   config file  │  ┌─────────┐   ┌────────────┐   ┌─────────────┐  │
//!   ─────────────┼─▶│ watcher │──▶│ load +     │──▶│ coordinator │  │
//!                │  │(debounce│   │ validate   │   │  OnReload   │  │
//!                │  └─────────┘   └────────────┘   └──────┬──────┘  │
//!                │                                        │         │
//!                │        ┌──────────────┐         swap    ▼         │
//!                │        │ ConfigStore  │◀──────────────────        │
//!                │        └──────┬───────┘   restart if address      │
//!                │               │ timeouts       changed            │
//!   clients      │        ┌──────▼───────┐                          │
//!   ─────────────┼───────▶│ ServerHandle │◀── stop (10s) ── signals  │
//!                │        └──────────────┘                          │
//!                └──────────────────────────────────────────────────┘
//! ```

use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use thiserror::Error;

use waitr::config::{
    self, ChangeWatcher, ConfigError, FileSource, FsChangeSource, LoadError, WatcherOptions,
};
use waitr::lifecycle::{
    AppContext, LifecycleCoordinator, Shutdown, ShutdownListener, TerminationSignals,
};
use waitr::net::BindError;
use waitr::observability::logging::{self, LogFormat};
use waitr::observability::metrics;

#[derive(Debug, Parser)]
#[command(name = "waitr", version, about = "Hot-reloading HTTP service host")]
struct Cli {
    /// Configuration file (JSON, or TOML with a .toml extension)
    #[arg(long, env = "WAITR_CONFIG", default_value = "config/server.json")]
    config: PathBuf,

    /// Log filter, e.g. `info` or `waitr=debug`. RUST_LOG takes precedence.
    #[arg(long)]
    log_level: Option<String>,

    #[arg(long, value_enum, default_value_t = LogFormat::Pretty)]
    log_format: LogFormat,

    /// Also append log lines to this file
    #[arg(long, env = "WAITR_LOG_FILE")]
    log_file: Option<PathBuf>,

    /// Serve Prometheus metrics on this address
    #[arg(long)]
    metrics_address: Option<SocketAddr>,

    /// Quiet period after the last config change before reloading
    #[arg(long, default_value_t = 3000)]
    debounce_ms: u64,

    /// Drain deadline for the old listener when the address changes
    #[arg(long, default_value_t = 5000)]
    restart_deadline_ms: u64,

    /// Drain deadline on SIGINT/SIGTERM
    #[arg(long, default_value_t = 10000)]
    shutdown_deadline_ms: u64,
}

/// Errors that stop the process before it starts serving.
#[derive(Debug, Error)]
enum StartupError {
    #[error("failed to load config: {0}")]
    Load(#[from] LoadError),
    #[error("invalid config: {0}")]
    Invalid(#[from] ConfigError),
    #[error("failed to start server: {0}")]
    Bind(#[from] BindError),
    #[error("failed to install metrics exporter: {0}")]
    Metrics(#[from] metrics_exporter_prometheus::BuildError),
    #[error("failed to install signal handlers: {0}")]
    Signals(#[source] io::Error),
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let _log_guard = match logging::init_logging(
        cli.log_level.as_deref(),
        cli.log_format,
        cli.log_file.as_deref(),
    ) {
        Ok(guard) => guard,
        Err(e) => {
            // No subscriber is installed yet.
            eprintln!("waitr: cannot open log file: {e}");
            return ExitCode::FAILURE;
        }
    };

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Fatal error during startup");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), StartupError> {
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "waitr starting");

    if let Some(addr) = cli.metrics_address {
        metrics::init_metrics(addr)?;
    }

    let raw = config::load_config(&cli.config)?;
    let initial = config::validate(&raw)?;
    tracing::info!(
        path = %cli.config.display(),
        listen_address = %initial.listen_address(),
        static_path = %initial.static_path().display(),
        root_file = %initial.root_file().display(),
        proxy_routes = initial.proxy_routes().len(),
        "Configuration loaded"
    );

    // Install handlers before serving so an early signal is not lost.
    let signals = TerminationSignals::install().map_err(StartupError::Signals)?;

    let ctx = Arc::new(AppContext::new(initial));
    let coordinator = Arc::new(LifecycleCoordinator::new(
        ctx,
        Duration::from_millis(cli.restart_deadline_ms),
    ));
    coordinator.start().await?;

    let shutdown = Shutdown::new();
    let watcher = ChangeWatcher::new(
        Arc::new(FileSource::new(&cli.config)),
        Box::new(FsChangeSource::new(&cli.config)),
        Arc::clone(&coordinator),
        WatcherOptions {
            debounce: Duration::from_millis(cli.debounce_ms),
            ..WatcherOptions::default()
        },
    );
    let watcher_task = tokio::spawn(watcher.run(shutdown.subscribe()));

    let listener = ShutdownListener::new(
        coordinator,
        shutdown,
        Duration::from_millis(cli.shutdown_deadline_ms),
    );
    listener.run(signals).await;

    if let Err(e) = watcher_task.await {
        tracing::warn!(error = %e, "Config watcher task ended abnormally");
    }

    tracing::info!("Server exited");
    Ok(())
}
