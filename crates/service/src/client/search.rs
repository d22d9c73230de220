//! Client-side search state (§3 BeaconEntry, §4.6): per-channel back-off
//! and the beacon registry used to detect new or changed servers.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Duration;

use codec::net::Guid;

use crate::backoff::Backoff;
use crate::ids::Cid;

/// A server instance seen via beacon, tracked for its whole runtime
/// lifetime (never GC'd, §3).
#[derive(Debug, Clone)]
pub struct BeaconEntry {
    pub guid: Guid,
    pub addresses: Vec<SocketAddr>,
    pub protocol_version: u8,
    pub change_count: u16,
}

/// Tracks every server GUID seen and raises "new-server-detected" when a
/// beacon reports a GUID for the first time or a changed `change_count`
/// for a known GUID (§4.6).
#[derive(Default)]
pub struct BeaconRegistry {
    known: HashMap<Guid, BeaconEntry>,
}

impl BeaconRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` ("new-server-detected") if this beacon is either
    /// from an unseen GUID or reports a changed `change_count`.
    pub fn observe(
        &mut self,
        guid: Guid,
        address: SocketAddr,
        protocol_version: u8,
        change_count: u16,
    ) -> bool {
        match self.known.get_mut(&guid) {
            Some(entry) => {
                let changed = entry.change_count != change_count;
                if !entry.addresses.contains(&address) {
                    entry.addresses.push(address);
                }
                entry.change_count = change_count;
                changed
            }
            None => {
                self.known.insert(
                    guid,
                    BeaconEntry {
                        guid,
                        addresses: vec![address],
                        protocol_version,
                        change_count,
                    },
                );
                true
            }
        }
    }

    pub fn get(&self, guid: &Guid) -> Option<&BeaconEntry> {
        self.known.get(guid)
    }

    pub fn len(&self) -> usize {
        self.known.len()
    }

    pub fn is_empty(&self) -> bool {
        self.known.is_empty()
    }
}

/// One channel's outstanding search state: back-off plus whether it has
/// been located yet.
pub struct ChannelSearch {
    pub cid: Cid,
    backoff: Backoff,
    satisfied: bool,
}

impl ChannelSearch {
    pub fn new(cid: Cid) -> Self {
        Self {
            cid,
            backoff: Backoff::new(),
            satisfied: false,
        }
    }

    pub fn is_satisfied(&self) -> bool {
        self.satisfied
    }

    /// A search attempt went unanswered; returns the delay to wait before
    /// retrying.
    pub fn retry_delay(&mut self) -> Duration {
        self.backoff.next_delay()
    }

    /// A search response located the channel: resets back-off and marks
    /// it satisfied.
    pub fn on_located(&mut self) {
        self.satisfied = true;
        self.backoff.reset();
    }

    /// "new-server-detected" resets back-off only for unsatisfied
    /// searches (§4.6, §3 invariant 5); satisfied channels ignore it.
    pub fn on_new_server_detected(&mut self) {
        if !self.satisfied {
            self.backoff.reset();
        }
    }
}
