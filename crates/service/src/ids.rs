//! Identifier types and per-transport allocators (§3).

use std::sync::atomic::{AtomicU32, Ordering};

/// Reserved sentinel meaning "no operation".
pub const INVALID_IOID: u32 = codec::INVALID_IOID;

macro_rules! id_type {
    ($name:ident, $doc:expr) => {
        #[doc = $doc]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub u32);

        impl From<u32> for $name {
            fn from(value: u32) -> Self {
                Self(value)
            }
        }

        impl From<$name> for u32 {
            fn from(value: $name) -> Self {
                value.0
            }
        }
    };
}

id_type!(Cid, "Channel ID, allocated by the client, unique per connection.");
id_type!(Sid, "Server Channel ID, allocated by the server on channel creation.");
id_type!(Ioid, "I/O Operation ID, allocated by the client, unique per connection.");

impl Ioid {
    pub const INVALID: Ioid = Ioid(INVALID_IOID);

    pub fn is_valid(self) -> bool {
        self.0 != INVALID_IOID
    }
}

/// Monotonic per-transport allocator for CID (client) or IOID (client) or
/// SID (server). Wraps around `u32::MAX`; a connection living long enough
/// to exhaust 2^32 ids is out of scope.
#[derive(Debug, Default)]
pub struct IdAllocator(AtomicU32);

impl IdAllocator {
    pub fn new() -> Self {
        Self(AtomicU32::new(0))
    }

    pub fn next(&self) -> u32 {
        self.0.fetch_add(1, Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocator_hands_out_increasing_ids() {
        let allocator = IdAllocator::new();
        assert_eq!(allocator.next(), 0);
        assert_eq!(allocator.next(), 1);
        assert_eq!(allocator.next(), 2);
    }

    #[test]
    fn invalid_ioid_sentinel_is_not_valid() {
        assert!(!Ioid::INVALID.is_valid());
        assert!(Ioid(0).is_valid());
    }
}
