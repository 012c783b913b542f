//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (main.rs):
//!     Load config → Validate → AppContext → coordinator.start() → watcher
//!
//! Reload (coordinator.rs, driven by config::watcher):
//!     Validated config → swap store → same address? keep listener
//!                                   → new address? stop old (5s) → start new
//!
//! Shutdown (shutdown.rs):
//!     SIGTERM/SIGINT → stop watcher → stop listener (10s) → exit
//! ```
//!
//! # Design Decisions
//! - One explicit context object, no globals
//! - Shutdown runs once no matter how many signals arrive
//! - Shutdown has a deadline: remaining connections are terminated after it

pub mod context;
pub mod coordinator;
pub mod shutdown;
pub mod signals;

pub use context::AppContext;
pub use coordinator::{LifecycleCoordinator, ReconcileOutcome, ReloadAction};
pub use shutdown::{Shutdown, ShutdownListener};
pub use signals::{SignalSource, TerminationSignals};
