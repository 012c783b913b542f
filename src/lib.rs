//! WaitR: a hot-reloading HTTP service host.
//!
//! Keeps one HTTP listener consistent with a configuration file that may
//! change while the process runs, and drains it cleanly on termination.

// Configuration: load, validate, store, watch
pub mod config;

// Serving
pub mod http;
pub mod net;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;
pub mod resilience;

#[cfg(test)]
mod testutil;

pub use config::{ConfigStore, ServerConfig};
pub use http::ServerHandle;
pub use lifecycle::{AppContext, LifecycleCoordinator, Shutdown, ShutdownListener};
