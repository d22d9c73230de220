//! The 8-byte frame header and its flag bits (§4.2/§6).

use crate::{buffer::ByteBuffer, commands::Command, ByteOrder, Error, MAGIC};

/// Message segmentation state, carried in flag bits 4..5.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment {
    /// A complete, unsegmented message.
    Solo,
    /// The first header of a segmented message.
    First,
    /// A middle header of a segmented message.
    Middle,
    /// The last header of a segmented message.
    Last,
}

impl Segment {
    fn from_bits(bits: u8) -> Self {
        match bits {
            0b00 => Segment::Solo,
            0b10 => Segment::First,
            0b11 => Segment::Middle,
            0b01 => Segment::Last,
            _ => unreachable!("only 2 bits"),
        }
    }

    fn to_bits(self) -> u8 {
        match self {
            Segment::Solo => 0b00,
            Segment::First => 0b10,
            Segment::Middle => 0b11,
            Segment::Last => 0b01,
        }
    }

    pub fn is_first_or_solo(self) -> bool {
        matches!(self, Segment::Solo | Segment::First)
    }

    pub fn is_last_or_solo(self) -> bool {
        matches!(self, Segment::Solo | Segment::Last)
    }
}

/// Decoded `flags` byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Flags {
    pub control: bool,
    pub segment: Segment,
    pub server_direction: bool,
    pub byte_order: ByteOrder,
}

const BIT_CONTROL: u8 = 0b0000_0001;
const MASK_SEGMENT: u8 = 0b0011_0000;
const SHIFT_SEGMENT: u8 = 4;
const BIT_DIRECTION: u8 = 0b0100_0000;
const BIT_BYTE_ORDER: u8 = 0b1000_0000;
const KNOWN_BITS: u8 = BIT_CONTROL | MASK_SEGMENT | BIT_DIRECTION | BIT_BYTE_ORDER;

impl Flags {
    pub fn application(byte_order: ByteOrder) -> Self {
        Self {
            control: false,
            segment: Segment::Solo,
            server_direction: false,
            byte_order,
        }
    }

    pub fn control(byte_order: ByteOrder) -> Self {
        Self {
            control: true,
            segment: Segment::Solo,
            server_direction: false,
            byte_order,
        }
    }

    pub fn with_segment(mut self, segment: Segment) -> Self {
        self.segment = segment;
        self
    }

    pub fn with_direction(mut self, server_direction: bool) -> Self {
        self.server_direction = server_direction;
        self
    }

    /// Decodes a flags byte, rejecting reserved bit combinations and an
    /// impossible `control && segmented` pairing.
    pub fn decode(byte: u8) -> Result<Self, Error> {
        if byte & !KNOWN_BITS != 0 {
            return Err(Error::InvalidDataStream);
        }
        let control = byte & BIT_CONTROL != 0;
        let segment = Segment::from_bits((byte & MASK_SEGMENT) >> SHIFT_SEGMENT);
        if control && segment != Segment::Solo {
            return Err(Error::InvalidDataStream);
        }
        Ok(Self {
            control,
            segment,
            server_direction: byte & BIT_DIRECTION != 0,
            byte_order: if byte & BIT_BYTE_ORDER != 0 {
                ByteOrder::Big
            } else {
                ByteOrder::Little
            },
        })
    }

    pub fn encode(self) -> u8 {
        let mut byte = 0u8;
        if self.control {
            byte |= BIT_CONTROL;
        }
        byte |= self.segment.to_bits() << SHIFT_SEGMENT;
        if self.server_direction {
            byte |= BIT_DIRECTION;
        }
        if self.byte_order == ByteOrder::Big {
            byte |= BIT_BYTE_ORDER;
        }
        byte
    }
}

/// The fixed 8-byte header preceding every message (or message segment).
#[derive(Debug, Clone, Copy)]
pub struct Header {
    pub version: u8,
    pub flags: Flags,
    pub command: Command,
    /// For a control message this is a command-specific parameter, not a
    /// byte count.
    pub payload_size: u32,
}

pub const HEADER_LEN: usize = 8;

impl Header {
    pub fn decode(buf: &mut ByteBuffer) -> Result<Self, Error> {
        buf.ensure(HEADER_LEN)?;
        let magic = buf.get_u8()?;
        if magic != MAGIC {
            return Err(Error::BadMagic);
        }
        let version = buf.get_u8()?;
        let flags = Flags::decode(buf.get_u8()?)?;
        buf.set_order(flags.byte_order);
        let command =
            Command::try_from(buf.get_u8()?).map_err(|_| Error::InvalidDataStream)?;
        let payload_size = buf.get_u32()?;
        if flags.control && payload_size != 0 && !command.control_carries_parameter() {
            return Err(Error::InvalidDataStream);
        }
        Ok(Self {
            version,
            flags,
            command,
            payload_size,
        })
    }

    pub fn encode(&self, buf: &mut ByteBuffer) -> Result<(), Error> {
        buf.set_order(self.flags.byte_order);
        buf.put_u8(MAGIC)?;
        buf.put_u8(self.version)?;
        buf.put_u8(self.flags.encode())?;
        buf.put_u8(self.command as u8)?;
        buf.put_u32(self.payload_size)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_application_header() {
        let header = Header {
            version: crate::PROTOCOL_VERSION,
            flags: Flags::application(ByteOrder::Little),
            command: Command::Get,
            payload_size: 17,
        };
        let mut buf = ByteBuffer::with_capacity(HEADER_LEN);
        header.encode(&mut buf).unwrap();
        buf.flip();
        let decoded = Header::decode(&mut buf).unwrap();
        assert_eq!(decoded.command, Command::Get);
        assert_eq!(decoded.payload_size, 17);
    }

    #[test]
    fn rejects_bad_magic() {
        let mut buf = ByteBuffer::with_capacity(HEADER_LEN);
        buf.put_u8(0x00).unwrap();
        buf.put_u8(2).unwrap();
        buf.put_u8(0x01).unwrap();
        buf.put_u8(0x23).unwrap();
        buf.put_u32(0x456789AB).unwrap();
        buf.flip();
        assert!(matches!(Header::decode(&mut buf), Err(Error::BadMagic)));
    }

    #[test]
    fn rejects_segmented_control() {
        let byte = BIT_CONTROL | (Segment::First.to_bits() << SHIFT_SEGMENT);
        assert!(matches!(Flags::decode(byte), Err(Error::InvalidDataStream)));
    }

    #[test]
    fn rejects_unknown_flag_bits() {
        assert!(matches!(Flags::decode(0b0000_1000), Err(Error::InvalidDataStream)));
    }
}
