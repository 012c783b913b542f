//! Fixtures shared by unit tests.

use std::sync::Mutex;

use metrics::{Counter, Gauge, Histogram, Key, KeyName, Metadata, Recorder, SharedString, Unit};
use tempfile::TempDir;

use crate::config::{RawConfig, RawTimeouts};

/// A static directory containing `index.html`.
pub(crate) fn site() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("index.html"), "<h1>waitr</h1>").unwrap();
    dir
}

/// A raw config that validates against `site`.
pub(crate) fn raw_config(site: &TempDir, listen_address: &str) -> RawConfig {
    RawConfig {
        listen_address: listen_address.to_string(),
        static_path: site.path().display().to_string(),
        root_file: None,
        timeouts: RawTimeouts {
            read_header_timeout_ms: 5000,
            read_timeout_ms: 5000,
            write_timeout_ms: 5000,
            idle_timeout_ms: 5000,
        },
        proxy_routes: Vec::new(),
    }
}

/// A loopback address with a port that was free a moment ago.
pub(crate) fn free_addr() -> String {
    let probe = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    probe.local_addr().unwrap().to_string()
}

/// Remembers the key of every counter touched while installed.
#[derive(Default)]
pub(crate) struct CapturingRecorder {
    counters: Mutex<Vec<Key>>,
}

impl CapturingRecorder {
    pub(crate) fn counted(&self, name: &str, labels: &[(&str, &str)]) -> bool {
        self.counters.lock().unwrap().iter().any(|key| {
            key.name() == name
                && labels
                    .iter()
                    .all(|(k, v)| key.labels().any(|l| l.key() == *k && l.value() == *v))
        })
    }
}

impl Recorder for CapturingRecorder {
    fn describe_counter(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}
    fn describe_gauge(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}
    fn describe_histogram(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}

    fn register_counter(&self, key: &Key, _: &Metadata<'_>) -> Counter {
        self.counters.lock().unwrap().push(key.clone());
        Counter::noop()
    }

    fn register_gauge(&self, _: &Key, _: &Metadata<'_>) -> Gauge {
        Gauge::noop()
    }

    fn register_histogram(&self, _: &Key, _: &Metadata<'_>) -> Histogram {
        Histogram::noop()
    }
}
