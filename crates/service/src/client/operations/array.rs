//! Array (§4.8): operates on a subrange `(offset, count, stride)` plus
//! `setLength`/`getLength`. A server-side fixed-size array must be
//! rejected with an error status on init.

use std::sync::Arc;

use crate::client::operation::{Operation, OperationCallbacks, OperationCore, Status};
use crate::qos::{self, QosFlags};
use crate::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArrayRange {
    pub offset: u32,
    pub count: u32,
    pub stride: u32,
}

pub trait ArrayRequester: OperationCallbacks {
    fn get_array_done(&self, status: Status, value: Option<Vec<u8>>);
    fn put_array_done(&self, status: Status);
    fn get_length_done(&self, status: Status, length: Option<u32>);
}

pub struct ArrayOperation {
    core: OperationCore,
    requester: Arc<dyn ArrayRequester>,
    fixed_size: bool,
}

impl ArrayOperation {
    pub fn new(core: OperationCore, requester: Arc<dyn ArrayRequester>, fixed_size: bool) -> Self {
        Self {
            core,
            requester,
            fixed_size,
        }
    }

    pub fn init(&self) -> Result<(), Error> {
        self.core.start_request(QosFlags::new(qos::INIT))
    }

    /// §4.8: a server-side fixed-size array must be rejected with an
    /// error status on init — checked before the normal success path so a
    /// fixed-size backing store can never accept `setLength`.
    pub fn on_init_reply(&self, status: Status) {
        self.core.stop_request();
        if status.is_ok() && self.fixed_size {
            self.requester.message(&Status::error(
                Error::InvalidPutArray,
                "server-side array is fixed size",
            ));
            return;
        }
        if status.is_ok() {
            self.core.mark_initialized();
        }
        self.requester.message(&status);
    }

    pub fn get(&self, _range: ArrayRange) -> Result<(), Error> {
        self.core.require_initialized()?;
        self.core.start_request(QosFlags::new(qos::GET))
    }

    pub fn put(&self, _range: ArrayRange, _value: &[u8]) -> Result<(), Error> {
        self.core.require_initialized()?;
        if self.fixed_size {
            return Err(Error::InvalidPutArray);
        }
        self.core.start_request(QosFlags::new(qos::DEFAULT))
    }

    pub fn set_length(&self, _length: u32) -> Result<(), Error> {
        self.core.require_initialized()?;
        if self.fixed_size {
            return Err(Error::InvalidPutArray);
        }
        self.core.start_request(QosFlags::new(qos::PROCESS))
    }

    pub fn get_length(&self) -> Result<(), Error> {
        self.core.require_initialized()?;
        self.core.start_request(QosFlags::new(qos::GET_PUT))
    }

    pub fn on_get_array_reply(&self, status: Status, value: Option<Vec<u8>>) {
        self.core.stop_request();
        self.requester.get_array_done(status, value);
    }

    pub fn on_put_array_reply(&self, status: Status) {
        self.core.stop_request();
        self.requester.put_array_done(status);
    }

    pub fn on_get_length_reply(&self, status: Status, length: Option<u32>) {
        self.core.stop_request();
        self.requester.get_length_done(status, length);
    }
}

impl Operation for ArrayOperation {
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

    struct Recorder(Mutex<Vec<Status>>);

    impl OperationCallbacks for Recorder {
        fn channel_disconnected(&self) {}
        fn message(&self, status: &Status) {
            self.0.lock().unwrap().push(status.clone());
        }
    }

    impl ArrayRequester for Recorder {
        fn get_array_done(&self, _status: Status, _value: Option<Vec<u8>>) {}
        fn put_array_done(&self, _status: Status) {}
        fn get_length_done(&self, _status: Status, _length: Option<u32>) {}
    }

    #[test]
    fn fixed_size_array_rejected_on_init() {
        let core = OperationCore::new(crate::ids::Ioid(1), std::sync::Weak::new(), || {});
        let requester = Arc::new(Recorder(Mutex::new(Vec::new())));
        let op = ArrayOperation::new(core, requester.clone(), true);
        op.init().unwrap();
        op.on_init_reply(Status::ok());
        assert!(!op.core().is_initialized());
        assert!(!requester.0.lock().unwrap().last().unwrap().is_ok());
    }

    #[test]
    fn variable_size_array_accepts_set_length() {
        let core = OperationCore::new(crate::ids::Ioid(1), std::sync::Weak::new(), || {});
        let requester = Arc::new(Recorder(Mutex::new(Vec::new())));
        let op = ArrayOperation::new(core, requester, false);
        op.init().unwrap();
        op.on_init_reply(Status::ok());
        assert!(op.set_length(10).is_ok());
    }
}
