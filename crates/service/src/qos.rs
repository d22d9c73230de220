//! QoS bit flags shared by every operation kind (§4.8).

/// Request payload carries a `pvRequest` definition; server replies with a
/// structure description.
pub const INIT: u8 = 0x01;
/// No special flag.
pub const DEFAULT: u8 = 0x00;
/// Mark this as the last request; tear down on reply.
pub const DESTROY: u8 = 0x02;
/// Retrieve value (Put/PutGet semantics).
pub const GET: u8 = 0x04;
/// For PutGet: retrieve stored Put. For Monitor: a pipeline ack carries a
/// window size in the same request.
pub const GET_PUT: u8 = 0x08;
/// Trigger processing side-effect; for Monitor: start/stop.
pub const PROCESS: u8 = 0x10;

/// A bitset of the flags above, as carried on the wire in one byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct QosFlags(pub u8);

impl QosFlags {
    pub fn new(bits: u8) -> Self {
        Self(bits)
    }

    pub fn is_init(self) -> bool {
        self.0 & INIT != 0
    }

    pub fn is_destroy(self) -> bool {
        self.0 & DESTROY != 0
    }

    pub fn is_get(self) -> bool {
        self.0 & GET != 0
    }

    pub fn is_get_put(self) -> bool {
        self.0 & GET_PUT != 0
    }

    pub fn is_process(self) -> bool {
        self.0 & PROCESS != 0
    }
}

/// Requests that bypass the single-outstanding-request rule (§4.8): a
/// destroy is always admitted even while another request on the same
/// operation is pending. Cancellation does not go through this path at
/// all — it calls `OperationCore::stop_request`/`destroy` directly rather
/// than issuing a qos-tagged request (see `Operation::cancel`).
pub fn is_pure_destroy_or_cancel(qos: QosFlags) -> bool {
    qos.0 == DESTROY
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_combined_bits() {
        let qos = QosFlags::new(INIT | GET_PUT);
        assert!(qos.is_init());
        assert!(qos.is_get_put());
        assert!(!qos.is_destroy());
    }
}
