//! Position/limit byte arena, modeled on the read/write cursor pattern used
//! throughout the framing codec: a single fixed-capacity allocation that is
//! filled, "flipped" for draining, and cleared for reuse rather than
//! reallocated per message.

use crate::{ByteOrder, Error};

/// A contiguous byte arena with an explicit `position`, `limit`, `capacity`
/// and a selectable byte order.
///
/// Writes (`put_*`) advance `position` up to `capacity`. Reads (`get_*`)
/// advance `position` up to `limit`. `flip()` prepares a buffer that has
/// just been written for draining; `clear()` prepares it for writing again.
pub struct ByteBuffer {
    data: Vec<u8>,
    position: usize,
    limit: usize,
    order: ByteOrder,
    mark: Option<usize>,
}

impl ByteBuffer {
    /// Allocates a zero-filled buffer of exactly `capacity` bytes. No
    /// further hidden allocation occurs; callers size buffers up front.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: vec![0u8; capacity],
            position: 0,
            limit: capacity,
            order: ByteOrder::Little,
            mark: None,
        }
    }

    pub fn order(&self) -> ByteOrder {
        self.order
    }

    pub fn set_order(&mut self, order: ByteOrder) {
        self.order = order;
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn set_position(&mut self, position: usize) {
        assert!(position <= self.limit, "position past limit");
        self.position = position;
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn set_limit(&mut self, limit: usize) {
        assert!(limit <= self.data.len(), "limit past capacity");
        self.limit = limit;
        if self.position > limit {
            self.position = limit;
        }
    }

    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Bytes still readable/writable before `limit`.
    pub fn remaining(&self) -> usize {
        self.limit - self.position
    }

    pub fn has_remaining(&self) -> bool {
        self.remaining() > 0
    }

    /// `limit ← position`, `position ← 0`. Call after filling the buffer by
    /// writes, before draining it by reads.
    pub fn flip(&mut self) {
        self.limit = self.position;
        self.position = 0;
        self.mark = None;
    }

    /// Resets position/limit to the full capacity for a fresh round of
    /// writes.
    pub fn clear(&mut self) {
        self.position = 0;
        self.limit = self.data.len();
        self.mark = None;
    }

    /// Shifts any unread bytes (`position..limit`) to the front and resets
    /// `position` to the unread length, `limit` to capacity. Used by the
    /// framing reader when a partial message spans socket reads.
    pub fn compact(&mut self) {
        let unread = self.remaining();
        self.data.copy_within(self.position..self.limit, 0);
        self.position = unread;
        self.limit = self.data.len();
        self.mark = None;
    }

    pub fn mark(&mut self) {
        self.mark = Some(self.position);
    }

    pub fn reset(&mut self) {
        if let Some(mark) = self.mark.take() {
            self.position = mark;
        }
    }

    /// Fails if fewer than `n` bytes remain between `position` and `limit`.
    pub fn ensure(&self, n: usize) -> Result<(), Error> {
        if self.remaining() < n {
            Err(Error::Underflow)
        } else {
            Ok(())
        }
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data[self.position..self.limit]
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.data[self.position..self.limit]
    }

    /// Full backing storage, ignoring position/limit. Used by the socket
    /// read/write paths which need a writable window past `limit`.
    pub fn raw_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    fn require_write(&self, n: usize) -> Result<(), Error> {
        if self.position + n > self.data.len() {
            Err(Error::Overflow)
        } else {
            Ok(())
        }
    }

    pub fn put_u8(&mut self, value: u8) -> Result<(), Error> {
        self.require_write(1)?;
        self.data[self.position] = value;
        self.position += 1;
        Ok(())
    }

    pub fn put_i8(&mut self, value: i8) -> Result<(), Error> {
        self.put_u8(value as u8)
    }

    pub fn put_u16(&mut self, value: u16) -> Result<(), Error> {
        self.put_bytes(&match self.order {
            ByteOrder::Little => value.to_le_bytes(),
            ByteOrder::Big => value.to_be_bytes(),
        })
    }

    pub fn put_i16(&mut self, value: i16) -> Result<(), Error> {
        self.put_u16(value as u16)
    }

    pub fn put_u32(&mut self, value: u32) -> Result<(), Error> {
        self.put_bytes(&match self.order {
            ByteOrder::Little => value.to_le_bytes(),
            ByteOrder::Big => value.to_be_bytes(),
        })
    }

    pub fn put_i32(&mut self, value: i32) -> Result<(), Error> {
        self.put_u32(value as u32)
    }

    pub fn put_u64(&mut self, value: u64) -> Result<(), Error> {
        self.put_bytes(&match self.order {
            ByteOrder::Little => value.to_le_bytes(),
            ByteOrder::Big => value.to_be_bytes(),
        })
    }

    pub fn put_i64(&mut self, value: i64) -> Result<(), Error> {
        self.put_u64(value as u64)
    }

    pub fn put_f32(&mut self, value: f32) -> Result<(), Error> {
        self.put_u32(value.to_bits())
    }

    pub fn put_f64(&mut self, value: f64) -> Result<(), Error> {
        self.put_u64(value.to_bits())
    }

    pub fn put_bytes(&mut self, bytes: &[u8]) -> Result<(), Error> {
        self.require_write(bytes.len())?;
        let end = self.position + bytes.len();
        self.data[self.position..end].copy_from_slice(bytes);
        self.position = end;
        Ok(())
    }

    /// Writes `count` zero bytes, rounding `position` up to the next
    /// multiple of `boundary` (`boundary` must be a power of two).
    pub fn align(&mut self, boundary: usize) -> Result<(), Error> {
        debug_assert!(boundary.is_power_of_two());
        let pad = (boundary - (self.position % boundary)) % boundary;
        for _ in 0..pad {
            self.put_u8(0)?;
        }
        Ok(())
    }

    /// Advances `position` past identical alignment padding written by the
    /// peer's `align`, without inspecting the pad bytes' contents.
    pub fn skip_align(&mut self, boundary: usize) -> Result<(), Error> {
        debug_assert!(boundary.is_power_of_two());
        let pad = (boundary - (self.position % boundary)) % boundary;
        self.ensure(pad)?;
        self.position += pad;
        Ok(())
    }

    fn require_read(&self, n: usize) -> Result<(), Error> {
        self.ensure(n)
    }

    pub fn get_u8(&mut self) -> Result<u8, Error> {
        self.require_read(1)?;
        let value = self.data[self.position];
        self.position += 1;
        Ok(value)
    }

    pub fn get_i8(&mut self) -> Result<i8, Error> {
        Ok(self.get_u8()? as i8)
    }

    pub fn get_u16(&mut self) -> Result<u16, Error> {
        let mut buf = [0u8; 2];
        self.get_into(&mut buf)?;
        Ok(match self.order {
            ByteOrder::Little => u16::from_le_bytes(buf),
            ByteOrder::Big => u16::from_be_bytes(buf),
        })
    }

    pub fn get_i16(&mut self) -> Result<i16, Error> {
        Ok(self.get_u16()? as i16)
    }

    pub fn get_u32(&mut self) -> Result<u32, Error> {
        let mut buf = [0u8; 4];
        self.get_into(&mut buf)?;
        Ok(match self.order {
            ByteOrder::Little => u32::from_le_bytes(buf),
            ByteOrder::Big => u32::from_be_bytes(buf),
        })
    }

    pub fn get_i32(&mut self) -> Result<i32, Error> {
        Ok(self.get_u32()? as i32)
    }

    pub fn get_u64(&mut self) -> Result<u64, Error> {
        let mut buf = [0u8; 8];
        self.get_into(&mut buf)?;
        Ok(match self.order {
            ByteOrder::Little => u64::from_le_bytes(buf),
            ByteOrder::Big => u64::from_be_bytes(buf),
        })
    }

    pub fn get_i64(&mut self) -> Result<i64, Error> {
        Ok(self.get_u64()? as i64)
    }

    pub fn get_f32(&mut self) -> Result<f32, Error> {
        Ok(f32::from_bits(self.get_u32()?))
    }

    pub fn get_f64(&mut self) -> Result<f64, Error> {
        Ok(f64::from_bits(self.get_u64()?))
    }

    pub fn get_bytes(&mut self, n: usize) -> Result<Vec<u8>, Error> {
        self.require_read(n)?;
        let bytes = self.data[self.position..self.position + n].to_vec();
        self.position += n;
        Ok(bytes)
    }

    fn get_into(&mut self, out: &mut [u8]) -> Result<(), Error> {
        self.require_read(out.len())?;
        out.copy_from_slice(&self.data[self.position..self.position + out.len()]);
        self.position += out.len();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flip_then_drain_round_trips() {
        let mut buf = ByteBuffer::with_capacity(16);
        buf.put_u32(0xDEAD_BEEF).unwrap();
        buf.put_f64(42.0).unwrap();
        buf.flip();
        assert_eq!(buf.get_u32().unwrap(), 0xDEAD_BEEF);
        assert_eq!(buf.get_f64().unwrap(), 42.0);
        assert!(!buf.has_remaining());
    }

    #[test]
    fn big_endian_round_trip() {
        let mut buf = ByteBuffer::with_capacity(4);
        buf.set_order(ByteOrder::Big);
        buf.put_u32(1).unwrap();
        assert_eq!(buf.as_slice(), &[0, 0, 0, 1]);
    }

    #[test]
    fn ensure_rejects_short_reads() {
        let mut buf = ByteBuffer::with_capacity(4);
        buf.put_u16(7).unwrap();
        buf.flip();
        assert!(matches!(buf.get_u32(), Err(Error::Underflow)));
    }

    #[test]
    fn align_pads_to_boundary_and_skip_align_consumes_it() {
        let mut buf = ByteBuffer::with_capacity(16);
        buf.put_u8(1).unwrap();
        buf.align(8).unwrap();
        assert_eq!(buf.position(), 8);
        buf.flip();
        buf.get_u8().unwrap();
        buf.skip_align(8).unwrap();
        assert_eq!(buf.position(), 8);
    }

    #[test]
    fn compact_preserves_unread_tail() {
        let mut buf = ByteBuffer::with_capacity(8);
        buf.put_u32(1).unwrap();
        buf.put_u32(2).unwrap();
        buf.flip();
        buf.get_u32().unwrap();
        buf.compact();
        assert_eq!(buf.position(), 4);
        assert_eq!(buf.limit(), 8);
    }
}
