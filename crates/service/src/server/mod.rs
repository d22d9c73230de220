//! Server-side model: mirrors the client's Channel & Request Registry,
//! but CID is client-assigned, SID is server-assigned, and the backing
//! data lives behind the `ChannelProvider` interface (§1: out of scope —
//! interface only, no concrete backing store).

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::ids::{Cid, Sid};

/// The server's view of one channel a client created (§3 Entities:
/// ServerChannel).
pub trait ProviderChannel: Send + Sync {
    fn destroy(&self);
}

/// External collaborator the server consults to back channels with real
/// data. This crate defines only the interface; a concrete provider
/// (database, directory service, …) is out of scope.
pub trait ChannelProvider: Send + Sync {
    fn create_channel(&self, name: &str) -> Option<Arc<dyn ProviderChannel>>;
}

/// The server-side counterpart a registered request exposes to
/// `ServerChannel`, mirroring `client::channel::RegisteredOperation`.
pub trait ServerRequest: Send + Sync {
    fn ioid(&self) -> u32;
    fn on_channel_destroyed(&self);
}

pub struct ServerChannel {
    pub cid: Cid,
    pub sid: Sid,
    pub name: String,
    provider_channel: Arc<dyn ProviderChannel>,
    requests: Mutex<HashMap<u32, Weak<dyn ServerRequest>>>,
    destroyed: AtomicBool,
}

impl ServerChannel {
    pub fn new(cid: Cid, sid: Sid, name: String, provider_channel: Arc<dyn ProviderChannel>) -> Self {
        Self {
            cid,
            sid,
            name,
            provider_channel,
            requests: Mutex::new(HashMap::new()),
            destroyed: AtomicBool::new(false),
        }
    }

    pub fn register_request(&self, ioid: u32, request: Weak<dyn ServerRequest>) {
        self.requests.lock().insert(ioid, request);
    }

    pub fn unregister_request(&self, ioid: u32) {
        self.requests.lock().remove(&ioid);
    }

    pub fn dispatch(&self, ioid: u32) -> Option<Arc<dyn ServerRequest>> {
        self.requests.lock().get(&ioid).and_then(Weak::upgrade)
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::Acquire)
    }

    /// Idempotent (§4.7). `notify_client` is called at most once, and
    /// only for a locally-initiated destroy (a client-initiated
    /// `DESTROY_CHANNEL` request already has its own reply path and must
    /// not be echoed back here).
    pub fn destroy(&self, notify_client: impl FnOnce()) {
        if self.destroyed.swap(true, Ordering::AcqRel) {
            return;
        }
        let requests: Vec<_> = self.requests.lock().values().filter_map(Weak::upgrade).collect();
        for request in requests {
            request.on_channel_destroyed();
        }
        self.requests.lock().clear();
        self.provider_channel.destroy();
        notify_client();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NoopProviderChannel;
    impl ProviderChannel for NoopProviderChannel {
        fn destroy(&self) {}
    }

    struct Recorder(std::sync::atomic::AtomicBool);
    impl ServerRequest for Recorder {
        fn ioid(&self) -> u32 {
            1
        }
        fn on_channel_destroyed(&self) {
            self.0.store(true, Ordering::SeqCst);
        }
    }

    #[test]
    fn destroy_is_idempotent_and_notifies_once() {
        let channel = ServerChannel::new(
            Cid(1),
            Sid(100),
            "x".to_string(),
            Arc::new(NoopProviderChannel),
        );
        let mut notified = 0;
        channel.destroy(|| notified += 1);
        channel.destroy(|| notified += 1);
        assert_eq!(notified, 1);
    }

    #[test]
    fn destroy_notifies_every_live_request() {
        let channel = ServerChannel::new(
            Cid(1),
            Sid(100),
            "x".to_string(),
            Arc::new(NoopProviderChannel),
        );
        let request = Arc::new(Recorder(std::sync::atomic::AtomicBool::new(false)));
        channel.register_request(1, Arc::downgrade(&request) as Weak<dyn ServerRequest>);
        channel.destroy(|| {});
        assert!(request.0.load(Ordering::SeqCst));
    }
}
