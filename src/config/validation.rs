//! Configuration validation.
//!
//! # Responsibilities
//! - Turn a [`RawConfig`] into a [`ServerConfig`] or a typed [`ConfigError`]
//! - Check listen address, static path, root file, timeouts, proxy routes
//!
//! # Design Decisions
//! - Checks run in a fixed order and the first failure wins
//! - Pure apart from filesystem and resolver lookups; safe to call
//!   concurrently and repeatedly
//! - Never touches shared state

use std::net::{SocketAddr, ToSocketAddrs};
use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;

use crate::config::schema::{
    RawConfig, RawTimeouts, ServerConfig, TimeoutConfig, DEFAULT_ROOT_FILES,
};

/// Reasons a configuration is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("invalid listen_address {address:?}: {reason}")]
    InvalidListenAddress { address: String, reason: String },

    #[error("invalid static_path {path:?}: {reason}")]
    InvalidStaticPath { path: String, reason: String },

    #[error("none of the root files {candidates:?} exist in static_path {path:?}")]
    MissingRootFile { path: String, candidates: Vec<String> },

    #[error("{0} must be greater than 0")]
    InvalidTimeout(&'static str),

    #[error("invalid proxy route {0:?}: a route needs a prefix and at least one backend")]
    InvalidProxyRoute(String),
}

/// Validate a raw configuration.
pub fn validate(raw: &RawConfig) -> Result<ServerConfig, ConfigError> {
    let bind_address = resolve_listen_address(&raw.listen_address)?;
    let root_file = validate_static_path(&raw.static_path, raw.root_file.as_deref())?;
    let timeouts = validate_timeouts(&raw.timeouts)?;

    for route in &raw.proxy_routes {
        if route.prefix.is_empty() || route.backends.is_empty() {
            return Err(ConfigError::InvalidProxyRoute(route.prefix.clone()));
        }
    }

    Ok(ServerConfig {
        listen_address: raw.listen_address.trim().to_string(),
        bind_address,
        static_path: PathBuf::from(raw.static_path.trim()),
        root_file,
        timeouts,
        proxy_routes: raw.proxy_routes.clone(),
    })
}

/// Resolve a `host:port` listen address.
///
/// An empty host (`":8080"`) means every interface.
pub fn resolve_listen_address(addr: &str) -> Result<SocketAddr, ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidListenAddress {
        address: addr.to_string(),
        reason,
    };

    let trimmed = addr.trim();
    if trimmed.is_empty() {
        return Err(invalid("listen_address is required and cannot be empty".into()));
    }

    let (host, port) = trimmed
        .rsplit_once(':')
        .ok_or_else(|| invalid("missing port".into()))?;
    let port: u16 = port
        .parse()
        .map_err(|_| invalid(format!("port must be numeric, got {port:?}")))?;

    // IPv6 hosts must be bracketed.
    let host = match host.strip_prefix('[').and_then(|h| h.strip_suffix(']')) {
        Some(inner) => inner,
        None if host.contains(':') => return Err(invalid("too many colons in address".into())),
        None if host.contains(['[', ']']) => return Err(invalid("unbalanced brackets in address".into())),
        None => host,
    };
    let host = if host.is_empty() { "0.0.0.0" } else { host };

    (host, port)
        .to_socket_addrs()
        .map_err(|e| invalid(e.to_string()))?
        .next()
        .ok_or_else(|| invalid("address did not resolve".into()))
}

fn validate_static_path(static_path: &str, root_file: Option<&str>) -> Result<PathBuf, ConfigError> {
    let trimmed = static_path.trim();
    let invalid = |reason: String| ConfigError::InvalidStaticPath {
        path: static_path.to_string(),
        reason,
    };

    if trimmed.is_empty() {
        return Err(invalid("static_path is required and cannot be blank".into()));
    }

    let dir = Path::new(trimmed);
    let meta = std::fs::metadata(dir).map_err(|e| invalid(format!("does not exist: {e}")))?;
    if !meta.is_dir() {
        return Err(invalid("must be a directory".into()));
    }

    let candidates: Vec<String> = match root_file.map(str::trim).filter(|r| !r.is_empty()) {
        Some(name) => vec![name.to_string()],
        None => DEFAULT_ROOT_FILES.iter().map(|s| s.to_string()).collect(),
    };

    candidates
        .iter()
        .map(|name| dir.join(name))
        .find(|candidate| candidate.exists())
        .ok_or_else(|| ConfigError::MissingRootFile {
            path: static_path.to_string(),
            candidates,
        })
}

fn validate_timeouts(raw: &RawTimeouts) -> Result<TimeoutConfig, ConfigError> {
    let positive = |value: i64, field: &'static str| {
        u64::try_from(value)
            .ok()
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis)
            .ok_or(ConfigError::InvalidTimeout(field))
    };

    Ok(TimeoutConfig {
        read_header: positive(raw.read_header_timeout_ms, "read_header_timeout_ms")?,
        read: positive(raw.read_timeout_ms, "read_timeout_ms")?,
        write: positive(raw.write_timeout_ms, "write_timeout_ms")?,
        idle: positive(raw.idle_timeout_ms, "idle_timeout_ms")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::ProxyRoute;
    use tempfile::TempDir;

    fn site(root: &str) -> TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(root), "<h1>hi</h1>").unwrap();
        dir
    }

    fn raw(static_path: &Path) -> RawConfig {
        RawConfig {
            listen_address: "127.0.0.1:8080".into(),
            static_path: static_path.display().to_string(),
            root_file: None,
            timeouts: RawTimeouts {
                read_header_timeout_ms: 5000,
                read_timeout_ms: 5000,
                write_timeout_ms: 5000,
                idle_timeout_ms: 5000,
            },
            proxy_routes: vec![ProxyRoute {
                prefix: "/api".into(),
                backends: vec!["127.0.0.1:3000".into()],
            }],
        }
    }

    #[test]
    fn valid_config_passes() {
        let dir = site("index.html");
        let cfg = validate(&raw(dir.path())).unwrap();

        assert_eq!(cfg.listen_address(), "127.0.0.1:8080");
        assert_eq!(cfg.bind_address().port(), 8080);
        assert_eq!(cfg.root_file(), dir.path().join("index.html"));
        assert_eq!(cfg.timeouts().idle, Duration::from_millis(5000));
        assert_eq!(cfg.proxy_routes().len(), 1);
    }

    #[test]
    fn index_htm_is_a_default_root() {
        let dir = site("index.htm");
        assert!(validate(&raw(dir.path())).is_ok());
    }

    #[test]
    fn empty_host_binds_all_interfaces() {
        let dir = site("index.html");
        let mut cfg = raw(dir.path());
        cfg.listen_address = ":9000".into();

        let cfg = validate(&cfg).unwrap();
        assert!(cfg.bind_address().ip().is_unspecified());
        assert_eq!(cfg.bind_address().port(), 9000);
    }

    #[test]
    fn listen_address_errors() {
        let dir = site("index.html");
        for bad in [
            "",
            "   ",
            "127.0.0.1",
            "127.0.0.1:http",
            "127.0.0.1:99999",
            "::1:8080",
            "[::1:8080",
            "::1]:8080",
        ] {
            let mut cfg = raw(dir.path());
            cfg.listen_address = bad.into();
            assert!(
                matches!(validate(&cfg), Err(ConfigError::InvalidListenAddress { .. })),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn bracketed_ipv6_is_accepted() {
        assert_eq!(
            resolve_listen_address("[::1]:8080").unwrap(),
            "[::1]:8080".parse::<SocketAddr>().unwrap()
        );
        assert_eq!(
            resolve_listen_address("::1:8080"),
            Err(ConfigError::InvalidListenAddress {
                address: "::1:8080".into(),
                reason: "too many colons in address".into(),
            })
        );
    }

    #[test]
    fn listen_address_is_checked_before_static_path() {
        let mut cfg = raw(Path::new("/definitely/not/here"));
        cfg.listen_address = String::new();
        assert!(matches!(validate(&cfg), Err(ConfigError::InvalidListenAddress { .. })));
    }

    #[test]
    fn static_path_errors() {
        let mut cfg = raw(Path::new("/definitely/not/here"));
        assert!(matches!(validate(&cfg), Err(ConfigError::InvalidStaticPath { .. })));

        cfg.static_path = "  ".into();
        assert!(matches!(validate(&cfg), Err(ConfigError::InvalidStaticPath { .. })));

        let dir = site("index.html");
        let file = dir.path().join("index.html");
        let cfg = raw(&file);
        assert!(matches!(validate(&cfg), Err(ConfigError::InvalidStaticPath { .. })));
    }

    #[test]
    fn directory_without_root_file_is_rejected() {
        let dir = site("about.html");
        let err = validate(&raw(dir.path())).unwrap_err();
        match err {
            ConfigError::MissingRootFile { candidates, .. } => {
                assert_eq!(candidates, vec!["index.html", "index.htm"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn root_file_override_replaces_defaults() {
        let dir = site("index.html");
        let mut cfg = raw(dir.path());
        cfg.root_file = Some("main.html".into());
        assert!(matches!(validate(&cfg), Err(ConfigError::MissingRootFile { .. })));

        std::fs::write(dir.path().join("main.html"), "").unwrap();
        let cfg = validate(&cfg).unwrap();
        assert_eq!(cfg.root_file(), dir.path().join("main.html"));
    }

    #[test]
    fn each_timeout_must_be_positive() {
        let dir = site("index.html");
        let cases: [(fn(&mut RawTimeouts), &str); 4] = [
            (|t| t.read_header_timeout_ms = 0, "read_header_timeout_ms"),
            (|t| t.read_timeout_ms = -1, "read_timeout_ms"),
            (|t| t.write_timeout_ms = 0, "write_timeout_ms"),
            (|t| t.idle_timeout_ms = -500, "idle_timeout_ms"),
        ];

        for (mutate, field) in cases {
            let mut cfg = raw(dir.path());
            mutate(&mut cfg.timeouts);
            assert_eq!(validate(&cfg), Err(ConfigError::InvalidTimeout(field)));
        }
    }

    #[test]
    fn proxy_routes_need_prefix_and_backend() {
        let dir = site("index.html");

        let mut cfg = raw(dir.path());
        cfg.proxy_routes.push(ProxyRoute { prefix: "/empty".into(), backends: vec![] });
        assert_eq!(validate(&cfg), Err(ConfigError::InvalidProxyRoute("/empty".into())));

        let mut cfg = raw(dir.path());
        cfg.proxy_routes.push(ProxyRoute { prefix: String::new(), backends: vec!["b".into()] });
        assert_eq!(validate(&cfg), Err(ConfigError::InvalidProxyRoute(String::new())));
    }

    #[test]
    fn error_display_names_the_field() {
        assert_eq!(
            ConfigError::InvalidTimeout("write_timeout_ms").to_string(),
            "write_timeout_ms must be greater than 0"
        );
    }
}
