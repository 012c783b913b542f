//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! ServerConfig.bind_address
//!     → listener.rs (bind, BindError)
//!     → accept loop (http/server.rs)
//!     → connection.rs (connection guard, activity-tracked stream)
//!     → Hand off to hyper
//! ```
//!
//! # Design Decisions
//! - Every accepted connection holds a guard so drains can count stragglers
//! - Idle detection is based on bytes moved, not on request boundaries

pub mod connection;
pub mod listener;

pub use connection::{ConnectionGuard, ConnectionTracker, TrackedStream};
pub use listener::BindError;
