//! Metrics collection and exposition.
//!
//! # Metrics
//! - `waitr_config_reloads_total` (counter): reload attempts by outcome
//! - `waitr_server_restarts_total` (counter): listeners started, initial start included
//! - `waitr_active_connections` (gauge): connections on the live listener
//! - `waitr_requests_total` (counter): requests by method and status
//!
//! Without an installed recorder every call here is a no-op.

use std::net::SocketAddr;

use metrics::{counter, gauge};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus exporter with a scrape endpoint on `addr`.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

/// Outcome label values for `waitr_config_reloads_total`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloadOutcome {
    Applied,
    LoadFailed,
    Invalid,
}

impl ReloadOutcome {
    fn as_str(self) -> &'static str {
        match self {
            ReloadOutcome::Applied => "applied",
            ReloadOutcome::LoadFailed => "load_failed",
            ReloadOutcome::Invalid => "invalid",
        }
    }
}

pub fn record_reload(outcome: ReloadOutcome) {
    counter!("waitr_config_reloads_total", "outcome" => outcome.as_str()).increment(1);
}

pub fn record_restart() {
    counter!("waitr_server_restarts_total").increment(1);
}

pub fn record_active_connections(active: u64) {
    gauge!("waitr_active_connections").set(active as f64);
}

pub fn record_request(method: &str, status: u16) {
    counter!(
        "waitr_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}
