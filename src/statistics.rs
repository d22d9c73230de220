//! Per-remote counters (§8: e.g. the invalid-data-stream counter of S4),
//! exposed as a cloneable `Reporter` handle per connection.

use std::net::SocketAddr;
use std::sync::Arc;

use ahash::AHashMap;
use parking_lot::RwLock;

#[derive(Debug, Default, Clone, Copy)]
pub struct Counters {
    pub bytes_received: u64,
    pub bytes_sent: u64,
    pub packets_received: u64,
    pub packets_sent: u64,
    pub invalid_data_stream: u64,
}

#[derive(Default)]
struct Inner {
    by_remote: AHashMap<SocketAddr, Counters>,
}

/// Shared statistics table, cloned cheaply (an `Arc` underneath) into
/// every connection task.
#[derive(Clone, Default)]
pub struct Statistics {
    inner: Arc<RwLock<Inner>>,
}

impl Statistics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_reporter(&self, remote: SocketAddr) -> Reporter {
        Reporter {
            statistics: self.clone(),
            remote,
        }
    }

    pub fn snapshot(&self, remote: SocketAddr) -> Counters {
        self.inner.read().by_remote.get(&remote).copied().unwrap_or_default()
    }

    pub fn remove(&self, remote: SocketAddr) {
        self.inner.write().by_remote.remove(&remote);
    }

    fn with_mut(&self, remote: SocketAddr, f: impl FnOnce(&mut Counters)) {
        let mut inner = self.inner.write();
        f(inner.by_remote.entry(remote).or_default());
    }
}

/// A handle scoped to one remote address, so a connection task doesn't
/// need to pass the address on every call.
#[derive(Clone)]
pub struct Reporter {
    statistics: Statistics,
    remote: SocketAddr,
}

impl Reporter {
    pub fn add_received(&self, bytes: usize) {
        self.statistics.with_mut(self.remote, |c| {
            c.bytes_received += bytes as u64;
            c.packets_received += 1;
        });
    }

    pub fn add_sent(&self, bytes: usize) {
        self.statistics.with_mut(self.remote, |c| {
            c.bytes_sent += bytes as u64;
            c.packets_sent += 1;
        });
    }

    pub fn invalid_data_stream(&self) {
        self.statistics.with_mut(self.remote, |c| {
            c.invalid_data_stream += 1;
        });
    }

    pub fn snapshot(&self) -> Counters {
        self.statistics.snapshot(self.remote)
    }
}
