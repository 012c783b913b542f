//! TCP listener binding.

use std::io;

use thiserror::Error;
use tokio::net::TcpListener;

use crate::config::ServerConfig;

/// The configured listen address could not be bound.
#[derive(Debug, Error)]
#[error("failed to bind {address}: {source}")]
pub struct BindError {
    pub address: String,
    #[source]
    pub source: io::Error,
}

/// Bind the listener for a validated configuration.
pub async fn bind(config: &ServerConfig) -> Result<TcpListener, BindError> {
    let bind_error = |source| BindError {
        address: config.listen_address().to_string(),
        source,
    };

    let listener = TcpListener::bind(config.bind_address())
        .await
        .map_err(bind_error)?;

    let local_addr = listener.local_addr().map_err(bind_error)?;
    tracing::info!(
        listen_address = %config.listen_address(),
        address = %local_addr,
        "Listener bound"
    );

    Ok(listener)
}
