//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (JSON or TOML)
//!     → loader.rs (read & deserialize into RawConfig)
//!     → validation.rs (semantic checks → ServerConfig)
//!     → store.rs (ConfigStore, shared via Arc)
//!
//! On change notification:
//!     watcher.rs debounces the burst
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → lifecycle coordinator swaps the store, restarts the listener if
//!       the listen address moved
//! ```
//!
//! # Design Decisions
//! - Config is immutable once validated; changes require full reload
//! - Only validate() can build a ServerConfig
//! - A failed reload never replaces the active config

pub mod loader;
pub mod schema;
pub mod store;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, ConfigSource, FileSource, LoadError};
pub use schema::{ProxyRoute, RawConfig, RawTimeouts, ServerConfig, TimeoutConfig};
pub use store::ConfigStore;
pub use validation::{validate, ConfigError};
pub use watcher::{
    reload, ChangeEvent, ChangeSource, ChangeWatcher, FsChangeSource, ReloadError, Subscription,
    WatchError, WatcherOptions, WatcherState, DEFAULT_DEBOUNCE,
};
