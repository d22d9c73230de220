//! Serialization Registry (§4.4): a per-transport, per-direction cache
//! mapping a 16-bit id to a structure's introspection definition.
//!
//! On first transmission of a structure the sender emits the definition
//! inline (`FULL_WITH_ID`) and records the id it assigned; subsequent sends
//! of the same structure emit only the id (`ONLY_ID`). The receiver mirrors
//! this in its own cache, keyed by the same id, so both sides stay in sync
//! without renegotiation. A definition is treated as an opaque byte blob by
//! this crate — interpreting it into fields is a concern of the layer that
//! owns the structure model.

use std::collections::HashMap;

use crate::{buffer::ByteBuffer, Error};

/// Sentinel id meaning "no structure" (used for sparse optional fields).
pub const NULL_ID: u16 = 0xFFFF;

/// Marker written ahead of a structure on the wire, selecting whether the
/// full definition follows or only the cache id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdMarker {
    FullWithId(u16),
    OnlyId(u16),
    Null,
}

impl IdMarker {
    pub fn decode(buf: &mut ByteBuffer) -> Result<Self, Error> {
        let id = buf.get_u16()?;
        if id == NULL_ID {
            return Ok(IdMarker::Null);
        }
        // Bit 15 set selects FULL_WITH_ID (definition follows); otherwise
        // ONLY_ID. The remaining 15 bits are the cache id.
        let flag = id & 0x8000 != 0;
        let id = id & 0x7FFF;
        Ok(if flag {
            IdMarker::FullWithId(id)
        } else {
            IdMarker::OnlyId(id)
        })
    }

    pub fn encode(self, buf: &mut ByteBuffer) -> Result<(), Error> {
        let raw = match self {
            IdMarker::Null => NULL_ID,
            IdMarker::FullWithId(id) => id | 0x8000,
            IdMarker::OnlyId(id) => id,
        };
        buf.put_u16(raw)
    }
}

/// One direction's id-to-definition cache for a single transport.
#[derive(Default)]
pub struct SerializationRegistry {
    by_id: HashMap<u16, Vec<u8>>,
    next_id: u16,
}

impl SerializationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clears all cached entries and resets id allocation. Called when the
    /// transport re-verifies (§4.4: ids reset on re-verification).
    pub fn reset(&mut self) {
        self.by_id.clear();
        self.next_id = 0;
    }

    /// Records `definition` under a freshly allocated id and returns it, for
    /// the sending side's first transmission of a structure.
    pub fn intern(&mut self, definition: Vec<u8>) -> u16 {
        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1);
        self.by_id.insert(id, definition);
        id
    }

    /// Looks up a previously interned definition by id, for decoding an
    /// `ONLY_ID` structure or for deciding whether a send can use `ONLY_ID`.
    pub fn get(&self, id: u16) -> Option<&[u8]> {
        self.by_id.get(&id).map(Vec::as_slice)
    }

    /// Receiver-side mirror of `intern`: records a definition the peer sent
    /// under the id the peer chose.
    pub fn insert(&mut self, id: u16, definition: Vec<u8>) {
        self.by_id.insert(id, definition);
    }

    pub fn contains(&self, id: u16) -> bool {
        self.by_id.contains_key(&id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intern_then_lookup_round_trips() {
        let mut registry = SerializationRegistry::new();
        let id = registry.intern(vec![1, 2, 3]);
        assert_eq!(registry.get(id), Some(&[1, 2, 3][..]));
    }

    #[test]
    fn reset_clears_cache_and_ids() {
        let mut registry = SerializationRegistry::new();
        let id = registry.intern(vec![1]);
        registry.reset();
        assert!(!registry.contains(id));
        assert_eq!(registry.intern(vec![2]), 0);
    }

    #[test]
    fn marker_round_trips_all_variants() {
        for marker in [IdMarker::Null, IdMarker::FullWithId(3), IdMarker::OnlyId(3)] {
            let mut buf = ByteBuffer::with_capacity(2);
            marker.encode(&mut buf).unwrap();
            buf.flip();
            assert_eq!(IdMarker::decode(&mut buf).unwrap(), marker);
        }
    }
}
