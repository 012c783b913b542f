//! OS signal handling.
//!
//! SIGINT and SIGTERM (Ctrl+C only on non-Unix) are the termination signals.

use std::future::Future;
use std::io;

use tokio::sync::mpsc;

/// Something that yields termination signals by name.
pub trait SignalSource: Send {
    /// Wait for the next signal. Never resolves once the source is exhausted.
    fn recv(&mut self) -> impl Future<Output = &'static str> + Send;
}

/// Termination signal stream.
pub struct TerminationSignals {
    #[cfg(unix)]
    interrupt: tokio::signal::unix::Signal,
    #[cfg(unix)]
    terminate: tokio::signal::unix::Signal,
}

impl TerminationSignals {
    /// Register the handlers. Must be called from within a Tokio runtime.
    pub fn install() -> io::Result<Self> {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};
            Ok(Self {
                interrupt: signal(SignalKind::interrupt())?,
                terminate: signal(SignalKind::terminate())?,
            })
        }

        #[cfg(not(unix))]
        {
            Ok(Self {})
        }
    }

    /// Wait for the next termination signal and return its name.
    #[cfg(unix)]
    pub async fn recv(&mut self) -> &'static str {
        tokio::select! {
            _ = self.interrupt.recv() => "SIGINT",
            _ = self.terminate.recv() => "SIGTERM",
        }
    }

    #[cfg(not(unix))]
    pub async fn recv(&mut self) -> &'static str {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
        "CTRL_C"
    }
}

impl SignalSource for TerminationSignals {
    fn recv(&mut self) -> impl Future<Output = &'static str> + Send {
        TerminationSignals::recv(self)
    }
}

/// Signals delivered over a channel, for embedding and tests.
impl SignalSource for mpsc::Receiver<&'static str> {
    async fn recv(&mut self) -> &'static str {
        match mpsc::Receiver::recv(self).await {
            Some(signal) => signal,
            None => std::future::pending().await,
        }
    }
}
