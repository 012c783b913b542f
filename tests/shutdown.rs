//! Draining on termination.

use std::sync::Arc;
use std::time::Duration;

use waitr::config::WatcherState;
use waitr::http::handler::PLACEHOLDER_BODY;
use waitr::lifecycle::ShutdownListener;

mod common;

use common::{free_addr, get, Host, Site};

#[tokio::test]
async fn shutdown_stops_watcher_and_listener() {
    let site = Site::new();
    let addr = free_addr();
    site.write_config(&addr, None, 5000);
    let host = Host::start(&site).await;
    assert_eq!(get(&addr).await.unwrap(), PLACEHOLDER_BODY);

    let listener = ShutdownListener::new(
        Arc::clone(&host.coordinator),
        host.shutdown.clone(),
        Duration::from_secs(2),
    );
    assert!(listener.shutdown_once().await);
    assert!(!listener.shutdown_once().await);

    tokio::time::timeout(Duration::from_secs(1), host.watcher)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(*host.watcher_state.borrow(), WatcherState::Closed);
    assert!(get(&addr).await.is_err());
}

#[tokio::test]
async fn edits_after_shutdown_bind_nothing() {
    let site = Site::new();
    site.write_config(&free_addr(), None, 5000);
    let host = Host::start(&site).await;

    host.coordinator.shutdown(Duration::from_secs(1)).await.unwrap();

    let next = free_addr();
    site.write_config(&next, None, 5000);
    tokio::time::sleep(Duration::from_millis(800)).await;

    assert!(host.coordinator.context().server().await.is_none());
    assert!(get(&next).await.is_err());
}
