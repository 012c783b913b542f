//! Shared state for every long-running component.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::{Mutex, MutexGuard};

use crate::config::{ConfigStore, ServerConfig};
use crate::http::ServerHandle;

/// The configuration store and the live server, built once at start-up and
/// passed by `Arc` to the watcher, the coordinator and the shutdown listener.
///
/// The config store and the server slot are guarded independently and no
/// method holds both.
#[derive(Debug)]
pub struct AppContext {
    config: Arc<ConfigStore>,
    server: Mutex<Option<Arc<ServerHandle>>>,
    /// Serialises restart sequences and shutdown.
    transition: Mutex<()>,
    closing: AtomicBool,
}

impl AppContext {
    pub fn new(initial: ServerConfig) -> Self {
        Self {
            config: Arc::new(ConfigStore::new(initial)),
            server: Mutex::new(None),
            transition: Mutex::new(()),
            closing: AtomicBool::new(false),
        }
    }

    /// Current configuration snapshot.
    pub fn config(&self) -> Arc<ServerConfig> {
        self.config.get()
    }

    pub fn store(&self) -> &Arc<ConfigStore> {
        &self.config
    }

    /// The live server, if one is running.
    pub async fn server(&self) -> Option<Arc<ServerHandle>> {
        self.server.lock().await.clone()
    }

    /// Install `server` as the live one, returning the previous slot value.
    pub(crate) async fn replace_server(
        &self,
        server: Option<Arc<ServerHandle>>,
    ) -> Option<Arc<ServerHandle>> {
        std::mem::replace(&mut *self.server.lock().await, server)
    }

    pub(crate) async fn lock_transition(&self) -> MutexGuard<'_, ()> {
        self.transition.lock().await
    }

    pub(crate) fn begin_close(&self) {
        self.closing.store(true, Ordering::SeqCst);
    }

    /// True once shutdown has started; no new listener is bound after that.
    pub fn is_closing(&self) -> bool {
        self.closing.load(Ordering::SeqCst)
    }
}
