//! Sockets shared by host.
//!
//! Several controller channels may point at the same host (one device,
//! several windows). They share a single [`ControllerSocket`] so batches to
//! that host are serialized by its mutex.
//!
//! The pool keeps each socket's [`LinkState`] beside it, so readiness and
//! eviction never wait on a socket lock held across a connect or a write.
//! Lock order: pool, then socket. Never take the pool lock while holding a
//! socket lock.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use tracing::debug;

use super::socket::{CONNECT_RETRY_INTERVAL, ControllerSocket, LinkState};

/// Socket handle shared between channels.
pub type SharedSocket = Arc<Mutex<ControllerSocket>>;

#[derive(Debug)]
struct PoolEntry {
    socket: SharedSocket,
    link: Arc<LinkState>,
}

#[derive(Debug, Default)]
struct PoolInner {
    sockets: HashMap<String, PoolEntry>,
    last_attempts: HashMap<String, Instant>,
}

/// Owned registry of controller sockets keyed by host string.
#[derive(Debug, Default)]
pub struct SocketPool {
    inner: Mutex<PoolInner>,
}

impl SocketPool {
    /// Empty pool.
    pub fn new() -> Self {
        Self::default()
    }

    /// Socket for `host`, if one is pooled.
    pub fn get(&self, host: &str) -> Option<SharedSocket> {
        self.inner
            .lock()
            .sockets
            .get(host)
            .map(|entry| Arc::clone(&entry.socket))
    }

    /// Connection state of the socket pooled for `host`.
    pub fn link(&self, host: &str) -> Option<Arc<LinkState>> {
        self.inner
            .lock()
            .sockets
            .get(host)
            .map(|entry| Arc::clone(&entry.link))
    }

    /// Pooled socket for `host`, creating one if needed.
    ///
    /// Returns `None` while a replacement would fall inside the connect
    /// retry interval of the last discarded socket, so a failing host is not
    /// re-resolved every worker tick.
    pub fn get_or_create(&self, host: &str, now: Instant) -> Option<SharedSocket> {
        let seed = {
            let inner = self.inner.lock();
            if let Some(entry) = inner.sockets.get(host) {
                return Some(Arc::clone(&entry.socket));
            }
            let seed = inner.last_attempts.get(host).copied();
            if seed.is_some_and(|last| now.saturating_duration_since(last) < CONNECT_RETRY_INTERVAL) {
                return None;
            }
            seed
        };

        // Resolution can block; do it outside the pool lock.
        let fresh = ControllerSocket::new(host, seed);
        let link = fresh.link();
        let mut inner = self.inner.lock();
        let entry = inner
            .sockets
            .entry(host.to_string())
            .or_insert_with(|| {
                debug!(host = %host, "Pooled new controller socket");
                PoolEntry {
                    socket: Arc::new(Mutex::new(fresh)),
                    link,
                }
            });
        Some(Arc::clone(&entry.socket))
    }

    /// Remove `socket` from the pool if it is still the pooled instance for
    /// `host`. Returns whether it was removed.
    pub fn remove_if_same(&self, host: &str, socket: &SharedSocket) -> bool {
        let mut inner = self.inner.lock();
        let same = inner
            .sockets
            .get(host)
            .is_some_and(|pooled| Arc::ptr_eq(&pooled.socket, socket));
        if !same {
            return false;
        }
        let last = inner
            .sockets
            .remove(host)
            .and_then(|entry| entry.link.last_attempt());
        if let Some(last) = last {
            inner.last_attempts.insert(host.to_string(), last);
        }
        debug!(host = %host, "Discarded controller socket");
        true
    }

    /// Number of pooled sockets.
    pub fn len(&self) -> usize {
        self.inner.lock().sockets.len()
    }

    /// Whether the pool is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
