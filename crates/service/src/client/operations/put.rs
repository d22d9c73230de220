//! Put (§4.8): INIT as Get; a subsequent call sends a bit-set + values,
//! and the `GET` qos bit retrieves the last-put value instead (the
//! "put-get flavour").

use std::sync::Arc;

use crate::client::operation::{Operation, OperationCallbacks, OperationCore, Status};
use crate::monitor::BitSet;
use crate::qos::{self, QosFlags};
use crate::Error;

pub trait PutRequester: OperationCallbacks {
    fn put_done(&self, status: Status);
    /// Reply to a put performed with the `GET` qos bit set: the value the
    /// server actually stored.
    fn get_done(&self, status: Status, value: Option<Vec<u8>>);
}

pub struct PutOperation {
    core: OperationCore,
    requester: Arc<dyn PutRequester>,
}

impl PutOperation {
    pub fn new(core: OperationCore, requester: Arc<dyn PutRequester>) -> Self {
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

    /// Sends `changed`/`value` to the server; passing `retrieve = true`
    /// sets the `GET` qos bit so the reply also carries the stored value.
    pub fn put(&self, retrieve: bool) -> Result<(), Error> {
        self.core.require_initialized()?;
        let bits = if retrieve { qos::GET } else { qos::DEFAULT };
        self.core.start_request(QosFlags::new(bits))?;
        Ok(())
    }

    pub fn on_put_reply(&self, status: Status) {
        self.core.stop_request();
        self.requester.put_done(status);
    }

    pub fn on_get_reply(&self, status: Status, value: Option<Vec<u8>>) {
        self.core.stop_request();
        self.requester.get_done(status, value);
    }

    /// Invariant the transport must uphold when building the wire
    /// message: the number of set bits in `changed` must match the
    /// number of value slots present in the structure, or the server
    /// rejects with `InvalidBitSetLength` (§7).
    pub fn validate_bitset_length(changed: &BitSet, expected_fields: usize) -> Result<(), Error> {
        if changed.len() != expected_fields {
            Err(Error::InvalidBitSetLength)
        } else {
            Ok(())
        }
    }
}

impl Operation for PutOperation {
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

    struct Recorder(Mutex<Vec<String>>);

    impl OperationCallbacks for Recorder {
        fn channel_disconnected(&self) {}
        fn message(&self, _status: &Status) {}
    }

    impl PutRequester for Recorder {
        fn put_done(&self, _status: Status) {
            self.0.lock().unwrap().push("put".into());
        }
        fn get_done(&self, _status: Status, _value: Option<Vec<u8>>) {
            self.0.lock().unwrap().push("get".into());
        }
    }

    #[test]
    fn bitset_length_mismatch_is_rejected() {
        let bits = BitSet::new(3);
        assert_eq!(
            PutOperation::validate_bitset_length(&bits, 4),
            Err(Error::InvalidBitSetLength)
        );
        assert!(PutOperation::validate_bitset_length(&bits, 3).is_ok());
    }

    #[test]
    fn put_requires_init_reply_first() {
        let core = OperationCore::new(crate::ids::Ioid(1), std::sync::Weak::new(), || {});
        let requester = Arc::new(Recorder(Mutex::new(Vec::new())));
        let op = PutOperation::new(core, requester);
        op.init().unwrap();
        assert_eq!(op.put(false), Err(Error::NotInitialized));
        op.on_init_reply(Status::ok());
        assert!(op.put(true).is_ok());
    }
}
