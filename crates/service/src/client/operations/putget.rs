//! PutGet (§4.8): two distinct structures (put type + get type) and three
//! observable outcomes — `getGetDone`, `getPutDone`, `putGetDone`.

use std::sync::Arc;

use crate::client::operation::{Operation, OperationCallbacks, OperationCore, Status};
use crate::qos::{self, QosFlags};
use crate::Error;

pub trait PutGetRequester: OperationCallbacks {
    /// Reply to a plain get-the-get-structure request.
    fn get_get_done(&self, status: Status, value: Option<Vec<u8>>);
    /// Reply to a get-the-stored-put-structure request (qos `GET_PUT`).
    fn get_put_done(&self, status: Status, value: Option<Vec<u8>>);
    /// Reply to the combined put-then-get request.
    fn put_get_done(&self, status: Status, value: Option<Vec<u8>>);
}

pub struct PutGetOperation {
    core: OperationCore,
    requester: Arc<dyn PutGetRequester>,
}

impl PutGetOperation {
    pub fn new(core: OperationCore, requester: Arc<dyn PutGetRequester>) -> Self {
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

    pub fn put_get(&self) -> Result<(), Error> {
        self.core.require_initialized()?;
        self.core.start_request(QosFlags::new(qos::DEFAULT))
    }

    pub fn get_get(&self) -> Result<(), Error> {
        self.core.require_initialized()?;
        self.core.start_request(QosFlags::new(qos::GET))
    }

    pub fn get_put(&self) -> Result<(), Error> {
        self.core.require_initialized()?;
        self.core.start_request(QosFlags::new(qos::GET_PUT))
    }

    pub fn on_reply(&self, qos: QosFlags, status: Status, value: Option<Vec<u8>>) {
        self.core.stop_request();
        if qos.is_get() {
            self.requester.get_get_done(status, value);
        } else if qos.is_get_put() {
            self.requester.get_put_done(status, value);
        } else {
            self.requester.put_get_done(status, value);
        }
    }
}

impl Operation for PutGetOperation {
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
