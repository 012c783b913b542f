//! The active configuration.
//!
//! Readers load an `Arc<ServerConfig>` snapshot; a reload stores a new `Arc`.
//! Readers never block on writers and always see one complete config.

use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::config::schema::ServerConfig;

/// Holds exactly one validated configuration at a time.
#[derive(Debug)]
pub struct ConfigStore {
    current: ArcSwap<ServerConfig>,
}

impl ConfigStore {
    pub fn new(initial: ServerConfig) -> Self {
        Self {
            current: ArcSwap::from_pointee(initial),
        }
    }

    /// Snapshot of the current configuration.
    pub fn get(&self) -> Arc<ServerConfig> {
        self.current.load_full()
    }

    /// Replace the configuration, returning the one it replaced.
    pub fn swap(&self, next: Arc<ServerConfig>) -> Arc<ServerConfig> {
        self.current.swap(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::TimeoutConfig;
    use std::time::Duration;

    fn config(n: u16) -> ServerConfig {
        let ms = Duration::from_millis(u64::from(n));
        ServerConfig {
            listen_address: format!("127.0.0.1:{n}"),
            bind_address: ([127, 0, 0, 1], n).into(),
            static_path: format!("/srv/{n}").into(),
            root_file: format!("/srv/{n}/index.html").into(),
            timeouts: TimeoutConfig { read_header: ms, read: ms, write: ms, idle: ms },
            proxy_routes: Vec::new(),
        }
    }

    fn consistent(cfg: &ServerConfig) -> bool {
        let n = cfg.bind_address.port();
        cfg.listen_address == format!("127.0.0.1:{n}")
            && cfg.static_path == std::path::PathBuf::from(format!("/srv/{n}"))
            && cfg.timeouts.idle == Duration::from_millis(u64::from(n))
    }

    #[test]
    fn swap_returns_previous() {
        let store = ConfigStore::new(config(1));
        let previous = store.swap(Arc::new(config(2)));

        assert_eq!(previous.listen_address(), "127.0.0.1:1");
        assert_eq!(store.get().listen_address(), "127.0.0.1:2");
    }

    #[test]
    fn concurrent_readers_never_see_a_torn_config() {
        let store = Arc::new(ConfigStore::new(config(1)));

        let writer = {
            let store = Arc::clone(&store);
            std::thread::spawn(move || {
                for n in 2..2000 {
                    store.swap(Arc::new(config(n)));
                }
            })
        };

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    for _ in 0..5000 {
                        assert!(consistent(&store.get()));
                    }
                })
            })
            .collect();

        writer.join().unwrap();
        for reader in readers {
            reader.join().unwrap();
        }
        assert_eq!(store.get().bind_address().port(), 1999);
    }
}
