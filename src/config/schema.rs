//! Configuration schema definitions.
//!
//! Two shapes live here:
//! - [`RawConfig`]: exactly what the config file says, deserialized by serde.
//!   Nothing about it is trusted.
//! - [`ServerConfig`]: the validated form. It can only be produced by
//!   [`validate`](crate::config::validation::validate), so holding one is
//!   proof that every check passed.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root file names tried when `root_file` is not set.
pub const DEFAULT_ROOT_FILES: [&str; 2] = ["index.html", "index.htm"];

/// Configuration as read from the source, before validation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct RawConfig {
    /// Bind address (e.g., "127.0.0.1:8080" or ":8080").
    pub listen_address: String,

    /// Directory holding the static site.
    pub static_path: String,

    /// Overrides the default root file candidates.
    pub root_file: Option<String>,

    /// Transport timeouts in milliseconds.
    pub timeouts: RawTimeouts,

    /// Declared proxy routes, in file order.
    pub proxy_routes: Vec<ProxyRoute>,
}

/// Timeout fields as they appear on disk.
///
/// Signed so that negative values survive deserialization and are rejected
/// by validation rather than by the parser.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct RawTimeouts {
    pub read_header_timeout_ms: i64,
    pub read_timeout_ms: i64,
    pub write_timeout_ms: i64,
    pub idle_timeout_ms: i64,
}

/// A route prefix and the backends declared for it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ProxyRoute {
    /// Path prefix to match.
    pub prefix: String,

    /// Backend addresses declared for this prefix.
    pub backends: Vec<String>,
}

/// Transport timeouts applied to every accepted connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeoutConfig {
    pub read_header: Duration,
    pub read: Duration,
    pub write: Duration,
    pub idle: Duration,
}

/// Validated server configuration.
///
/// Immutable once built. Shared as `Arc<ServerConfig>` and replaced
/// wholesale on reload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub(crate) listen_address: String,
    pub(crate) bind_address: SocketAddr,
    pub(crate) static_path: PathBuf,
    pub(crate) root_file: PathBuf,
    pub(crate) timeouts: TimeoutConfig,
    pub(crate) proxy_routes: Vec<ProxyRoute>,
}

impl ServerConfig {
    /// The listen address exactly as configured.
    ///
    /// Restart decisions compare this string, not the resolved address.
    pub fn listen_address(&self) -> &str {
        &self.listen_address
    }

    /// The socket address resolved during validation.
    pub fn bind_address(&self) -> SocketAddr {
        self.bind_address
    }

    pub fn static_path(&self) -> &Path {
        &self.static_path
    }

    /// The root file that was found inside the static path.
    pub fn root_file(&self) -> &Path {
        &self.root_file
    }

    pub fn timeouts(&self) -> TimeoutConfig {
        self.timeouts
    }

    pub fn proxy_routes(&self) -> &[ProxyRoute] {
        &self.proxy_routes
    }
}
