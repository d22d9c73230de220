//! Channel (§3 Entities, §4.7): owns the per-channel `ioid → Operation`
//! request table and tracks connection state across reconnects.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::ids::{Cid, Ioid, Sid};

/// `create → [connecting → connected ↔ disconnected]* → destroyed` (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelConnectionState {
    Connecting,
    Connected,
    Disconnected,
    Destroyed,
}

/// The minimal surface `Channel` needs from a registered operation: enough
/// to notify it of connection-state changes and to resubscribe it on
/// reconnect, without the channel needing to know which operation kind it
/// is (§4.8: operations are polymorphic over their capability set).
pub trait RegisteredOperation: Send + Sync {
    fn ioid(&self) -> Ioid;
    fn on_connection_state_changed(&self, connected: bool);
    fn resubscribe(&self);
}

/// A client-side channel. Exclusively owns its request table; entries are
/// weak so an operation's external handle (not the table) decides its
/// lifetime (§3 Ownership).
pub struct Channel {
    pub cid: Cid,
    pub name: String,
    pub priority: i16,
    sid: Mutex<Option<Sid>>,
    state: Mutex<ChannelConnectionState>,
    requests: Mutex<HashMap<u32, Weak<dyn RegisteredOperation>>>,
}

impl Channel {
    pub fn new(cid: Cid, name: String, priority: i16) -> Self {
        Self {
            cid,
            name,
            priority,
            sid: Mutex::new(None),
            state: Mutex::new(ChannelConnectionState::Connecting),
            requests: Mutex::new(HashMap::new()),
        }
    }

    pub fn sid(&self) -> Option<Sid> {
        *self.sid.lock()
    }

    pub fn set_sid(&self, sid: Sid) {
        *self.sid.lock() = Some(sid);
    }

    pub fn state(&self) -> ChannelConnectionState {
        *self.state.lock()
    }

    /// Registers a newly constructed operation's request entry. Atomic
    /// w.r.t. `dispatch`'s lookup (§4.7).
    pub fn register_request(&self, ioid: Ioid, operation: Weak<dyn RegisteredOperation>) {
        self.requests.lock().insert(ioid.0, operation);
    }

    /// Removes a request entry. Idempotent: unregistering an unknown or
    /// already-removed IOID is a no-op (§4.7: destroy is idempotent).
    pub fn unregister_request(&self, ioid: Ioid) {
        self.requests.lock().remove(&ioid.0);
    }

    /// Looks up the operation for an inbound response's IOID. A miss is
    /// not a protocol error — the caller logs at debug and discards
    /// (§4.7).
    pub fn dispatch(&self, ioid: u32) -> Option<Arc<dyn RegisteredOperation>> {
        self.requests.lock().get(&ioid).and_then(Weak::upgrade)
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().len()
    }

    /// Invoked when the underlying transport drops: every live operation
    /// is notified exactly once, and the channel moves to `Disconnected`
    /// (preserving its request table so IOIDs survive for resubscription,
    /// §4.5, §4.8 Reconnect).
    pub fn on_transport_disconnected(&self) {
        *self.state.lock() = ChannelConnectionState::Disconnected;
        let operations: Vec<_> = self.requests.lock().values().filter_map(Weak::upgrade).collect();
        for operation in operations {
            operation.on_connection_state_changed(false);
        }
    }

    /// Invoked when the transport re-verifies with the same GUID: the
    /// channel keeps its CID/SID mapping and every live operation
    /// re-sends its INIT with the same IOID (§4.8 Reconnect, S3).
    pub fn on_transport_reconnected(&self) {
        *self.state.lock() = ChannelConnectionState::Connected;
        let operations: Vec<_> = self.requests.lock().values().filter_map(Weak::upgrade).collect();
        for operation in operations {
            operation.on_connection_state_changed(true);
            operation.resubscribe();
        }
    }

    pub fn mark_connected(&self) {
        *self.state.lock() = ChannelConnectionState::Connected;
    }

    pub fn mark_destroyed(&self) {
        *self.state.lock() = ChannelConnectionState::Destroyed;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct Recorder {
        ioid: Ioid,
        connected_calls: AtomicBool,
        resubscribe_calls: AtomicBool,
    }

    impl RegisteredOperation for Recorder {
        fn ioid(&self) -> Ioid {
            self.ioid
        }

        fn on_connection_state_changed(&self, _connected: bool) {
            self.connected_calls.store(true, Ordering::SeqCst);
        }

        fn resubscribe(&self) {
            self.resubscribe_calls.store(true, Ordering::SeqCst);
        }
    }

    #[test]
    fn unregistered_ioid_dispatch_misses_without_error() {
        let channel = Channel::new(Cid(1), "x".to_string(), 0);
        assert!(channel.dispatch(9).is_none());
    }

    #[test]
    fn register_then_dispatch_finds_the_operation() {
        let channel = Channel::new(Cid(1), "x".to_string(), 0);
        let op = Arc::new(Recorder {
            ioid: Ioid(3),
            connected_calls: AtomicBool::new(false),
            resubscribe_calls: AtomicBool::new(false),
        });
        channel.register_request(Ioid(3), Arc::downgrade(&op) as Weak<dyn RegisteredOperation>);
        assert!(channel.dispatch(3).is_some());
        channel.unregister_request(Ioid(3));
        assert!(channel.dispatch(3).is_none());
    }

    #[test]
    fn unregister_is_idempotent() {
        let channel = Channel::new(Cid(1), "x".to_string(), 0);
        channel.unregister_request(Ioid(5));
        channel.unregister_request(Ioid(5));
    }

    #[test]
    fn reconnect_resubscribes_every_live_operation() {
        let channel = Channel::new(Cid(1), "x".to_string(), 0);
        let op = Arc::new(Recorder {
            ioid: Ioid(9),
            connected_calls: AtomicBool::new(false),
            resubscribe_calls: AtomicBool::new(false),
        });
        channel.register_request(Ioid(9), Arc::downgrade(&op) as Weak<dyn RegisteredOperation>);
        channel.on_transport_disconnected();
        assert_eq!(channel.state(), ChannelConnectionState::Disconnected);
        channel.on_transport_reconnected();
        assert_eq!(channel.state(), ChannelConnectionState::Connected);
        assert!(op.resubscribe_calls.load(Ordering::SeqCst));
    }
}
