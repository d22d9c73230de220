//! Get (§4.8): INIT carries a pvRequest; server replies with a structure
//! definition. Subsequent calls exchange a changed-field bit-set plus the
//! packed payload.

use std::sync::Arc;

use crate::client::operation::{Operation, OperationCallbacks, OperationCore, Status};
use crate::monitor::BitSet;
use crate::qos::{self, QosFlags};
use crate::Error;

pub trait GetRequester: OperationCallbacks {
    fn get_done(&self, status: Status, changed: Option<BitSet>, value: Option<Vec<u8>>);
}

pub struct GetOperation {
    core: OperationCore,
    requester: Arc<dyn GetRequester>,
}

impl GetOperation {
    pub fn new(core: OperationCore, requester: Arc<dyn GetRequester>) -> Self {
        Self { core, requester }
    }

    /// `init` records the outstanding INIT request; the caller (transport
    /// layer) is responsible for actually framing and sending the GET
    /// message with `qos = INIT` and the pvRequest bytes.
    pub fn init(&self) -> Result<(), Error> {
        self.core.start_request(QosFlags::new(qos::INIT))
    }

    pub fn on_init_reply(&self, status: Status) {
        self.core.stop_request();
        if status.is_ok() {
            self.core.mark_initialized();
        }
        self.requester.message(&status);
    }

    pub fn get(&self) -> Result<(), Error> {
        self.core.require_initialized()?;
        self.core.start_request(QosFlags::new(qos::DEFAULT))
    }

    pub fn on_get_reply(&self, status: Status, changed: Option<BitSet>, value: Option<Vec<u8>>) {
        self.core.stop_request();
        self.requester.get_done(status, changed, value);
    }
}

impl Operation for GetOperation {
    fn core(&self) -> &OperationCore {
        &self.core
    }

    fn cancel(&self) {
        self.core.stop_request();
    }

    fn resubscribe(&self) {
        if self.core.is_initialized() {
            let _ = self.init();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    struct Recorder {
        done: Mutex<Option<(Status, Option<Vec<u8>>)>>,
        disconnected: AtomicBool,
    }

    impl OperationCallbacks for Recorder {
        fn channel_disconnected(&self) {
            self.disconnected.store(true, Ordering::SeqCst);
        }
        fn message(&self, _status: &Status) {}
    }

    impl GetRequester for Recorder {
        fn get_done(&self, status: Status, _changed: Option<BitSet>, value: Option<Vec<u8>>) {
            *self.done.lock().unwrap() = Some((status, value));
        }
    }

    fn operation() -> GetOperation {
        let core = OperationCore::new(crate::ids::Ioid(1), std::sync::Weak::new(), || {});
        let requester = Arc::new(Recorder {
            done: Mutex::new(None),
            disconnected: AtomicBool::new(false),
        });
        GetOperation::new(core, requester)
    }

    #[test]
    fn get_before_init_reply_is_rejected() {
        let op = operation();
        op.init().unwrap();
        assert_eq!(op.get(), Err(Error::NotInitialized));
    }

    #[test]
    fn get_after_init_reply_succeeds_once() {
        let op = operation();
        op.init().unwrap();
        op.on_init_reply(Status::ok());
        assert!(op.get().is_ok());
        // single-outstanding-request rule: a second concurrent get fails.
        assert_eq!(op.get(), Err(Error::OtherRequestPending));
    }
}
