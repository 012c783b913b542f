//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! lifecycle, watcher, server, handler
//!     → tracing events (logging.rs installs the subscriber)
//!     → metrics facade (metrics.rs, optional Prometheus endpoint)
//! ```
//!
//! # Design Decisions
//! - Subsystems never format or persist logs themselves
//! - Request ID flows through the HTTP trace span
//! - Metrics are cheap (atomic increments) and no-ops when not exported

pub mod logging;
pub mod metrics;
