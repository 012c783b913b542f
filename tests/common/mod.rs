//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tempfile::TempDir;
use tokio::task::JoinHandle;

use waitr::config::{self, ChangeWatcher, FileSource, FsChangeSource, WatcherOptions, WatcherState};
use waitr::lifecycle::{AppContext, LifecycleCoordinator, Shutdown};

/// A temp directory holding a static site and a config file.
pub struct Site {
    dir: TempDir,
}

impl Site {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("public")).unwrap();
        std::fs::write(dir.path().join("public/index.html"), "<h1>waitr</h1>").unwrap();
        Self { dir }
    }

    pub fn config_path(&self) -> PathBuf {
        self.dir.path().join("server.json")
    }

    pub fn static_path(&self) -> PathBuf {
        self.dir.path().join("public")
    }

    /// Write a config serving `static_path` on `listen_address`.
    pub fn write_config(&self, listen_address: &str, root_file: Option<&str>, idle_ms: u64) {
        write_json(
            &self.config_path(),
            listen_address,
            &self.static_path(),
            root_file,
            idle_ms,
        );
    }
}

fn write_json(path: &Path, listen_address: &str, static_path: &Path, root_file: Option<&str>, idle_ms: u64) {
    let mut doc = json!({
        "listen_address": listen_address,
        "static_path": static_path,
        "timeouts": {
            "read_header_timeout_ms": 5000,
            "read_timeout_ms": 5000,
            "write_timeout_ms": 5000,
            "idle_timeout_ms": idle_ms,
        },
        "proxy_routes": [],
    });
    if let Some(root_file) = root_file {
        doc["root_file"] = json!(root_file);
    }
    std::fs::write(path, serde_json::to_vec_pretty(&doc).unwrap()).unwrap();
}

/// A loopback address with a port that was free a moment ago.
pub fn free_addr() -> String {
    let probe = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    probe.local_addr().unwrap().to_string()
}

/// Client that never routes loopback traffic through a system proxy.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .no_proxy()
        .timeout(Duration::from_secs(2))
        .build()
        .unwrap()
}

/// GET `/` on `addr`, returning the body.
pub async fn get(addr: &str) -> reqwest::Result<String> {
    client()
        .get(format!("http://{addr}/"))
        .send()
        .await?
        .text()
        .await
}

/// Poll `check` until it holds or `within` elapses.
pub async fn eventually<F, Fut>(within: Duration, mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + within;
    loop {
        if check().await {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}

/// A running host wired the way the binary wires it, with short deadlines.
pub struct Host {
    pub coordinator: Arc<LifecycleCoordinator>,
    pub shutdown: Shutdown,
    pub watcher_state: tokio::sync::watch::Receiver<WatcherState>,
    pub watcher: JoinHandle<()>,
}

impl Host {
    pub async fn start(site: &Site) -> Self {
        let path = site.config_path();
        let initial = config::validate(&config::load_config(&path).unwrap()).unwrap();

        let ctx = Arc::new(AppContext::new(initial));
        let coordinator = Arc::new(LifecycleCoordinator::new(ctx, Duration::from_secs(1)));
        coordinator.start().await.unwrap();

        let shutdown = Shutdown::new();
        let watcher = ChangeWatcher::new(
            Arc::new(FileSource::new(&path)),
            Box::new(FsChangeSource::new(&path)),
            Arc::clone(&coordinator),
            WatcherOptions {
                debounce: Duration::from_millis(200),
                ..WatcherOptions::default()
            },
        );
        let watcher_state = watcher.state();
        let watcher = tokio::spawn(watcher.run(shutdown.subscribe()));

        // Let the watch register before the test starts editing the file.
        tokio::time::sleep(Duration::from_millis(100)).await;

        Self {
            coordinator,
            shutdown,
            watcher_state,
            watcher,
        }
    }

    pub async fn live_addr(&self) -> Option<String> {
        let server = self.coordinator.context().server().await?;
        Some(server.local_addr().to_string())
    }
}
