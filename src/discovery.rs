//! Name/Discovery Service (§2 item 11, §9 Open Question): an aggregate
//! channel→server map fed by search responses seen on the wire, plus an
//! operator-seeded static map.
//!
//! Policy for the channel→provider collision the original implementation
//! leaves best-effort (§9 Open Question): **last-write-wins, no
//! background GC** — a newer sighting of a channel simply overwrites the
//! older server address, and stale entries are only cleared by explicit
//! administrative removal, never by a timer.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Instant;

use parking_lot::RwLock;

#[derive(Debug, Clone, Copy)]
pub struct ChannelEntry {
    pub server_address: SocketAddr,
    pub updated_at: Instant,
}

#[derive(Default)]
pub struct Discovery {
    channels: RwLock<HashMap<String, ChannelEntry>>,
    static_servers: RwLock<Vec<SocketAddr>>,
}

impl Discovery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the aggregator without waiting for a discovery poll cycle
    /// (mirrors the original's `setStaticChannelEntries`).
    pub fn seed_static(&self, entries: impl IntoIterator<Item = (String, SocketAddr)>) {
        let now = Instant::now();
        let mut channels = self.channels.write();
        for (name, address) in entries {
            channels.insert(
                name,
                ChannelEntry {
                    server_address: address,
                    updated_at: now,
                },
            );
        }
    }

    /// Mirrors the original's `setStaticServerAddresses`: servers polled
    /// for their channel lists even without a prior beacon/search sighting.
    pub fn seed_static_servers(&self, servers: impl IntoIterator<Item = SocketAddr>) {
        self.static_servers.write().extend(servers);
    }

    pub fn static_servers(&self) -> Vec<SocketAddr> {
        self.static_servers.read().clone()
    }

    /// Records (or overwrites) a channel sighting. Last write wins: a
    /// channel name claimed by more than one provider simply reflects
    /// whichever sighting arrived most recently.
    pub fn update(&self, name: String, server_address: SocketAddr) {
        self.channels.write().insert(
            name,
            ChannelEntry {
                server_address,
                updated_at: Instant::now(),
            },
        );
    }

    pub fn lookup(&self, name: &str) -> Option<ChannelEntry> {
        self.channels.read().get(name).copied()
    }

    /// Administrative removal — the only way an entry disappears; there
    /// is no background expiration.
    pub fn remove(&self, name: &str) {
        self.channels.write().remove(name);
    }

    pub fn len(&self) -> usize {
        self.channels.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.read().is_empty()
    }
}
