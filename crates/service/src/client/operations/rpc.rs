//! RPC (§4.8): INIT registers the operation; each call sends one argument
//! structure and receives one response structure. Unlike Get/Put there is
//! no persistent server-side value to re-fetch, so every call is itself a
//! one-shot request/reply.

use std::sync::Arc;

use crate::client::operation::{Operation, OperationCallbacks, OperationCore, Status};
use crate::qos::{self, QosFlags};
use crate::Error;

pub trait RpcRequester: OperationCallbacks {
    fn response(&self, status: Status, value: Option<Vec<u8>>);
}

pub struct RpcOperation {
    core: OperationCore,
    requester: Arc<dyn RpcRequester>,
}

impl RpcOperation {
    pub fn new(core: OperationCore, requester: Arc<dyn RpcRequester>) -> Self {
        Self { core, requester }
    }

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

    /// Sends `_argument` (opaque encoded structure bytes) and registers
    /// the single-outstanding in-flight call.
    pub fn request(&self, _argument: &[u8]) -> Result<(), Error> {
        self.core.require_initialized()?;
        self.core.start_request(QosFlags::new(qos::DEFAULT))
    }

    pub fn on_response(&self, status: Status, value: Option<Vec<u8>>) {
        self.core.stop_request();
        self.requester.response(status, value);
    }
}

impl Operation for RpcOperation {
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
    use std::sync::Mutex;

    struct Recorder(Mutex<Option<Status>>);

    impl OperationCallbacks for Recorder {
        fn channel_disconnected(&self) {}
        fn message(&self, _status: &Status) {}
    }

    impl RpcRequester for Recorder {
        fn response(&self, status: Status, _value: Option<Vec<u8>>) {
            *self.0.lock().unwrap() = Some(status);
        }
    }

    #[test]
    fn second_concurrent_call_is_rejected_until_the_first_completes() {
        let core = OperationCore::new(crate::ids::Ioid(1), std::sync::Weak::new(), || {});
        let requester = Arc::new(Recorder(Mutex::new(None)));
        let op = RpcOperation::new(core, requester);
        op.init().unwrap();
        op.on_init_reply(Status::ok());
        op.request(b"arg").unwrap();
        assert_eq!(op.request(b"arg2"), Err(Error::OtherRequestPending));
        op.on_response(Status::ok(), None);
        assert!(op.request(b"arg3").is_ok());
    }
}
