//! ## Process Variable Access (PVA) wire codec
//!
//! This crate implements the byte-level pieces of the protocol described in
//! the runtime specification: a position/limit byte arena (`buffer`), the
//! 8-byte frame header with its segmentation and byte-order flags
//! (`header`, `framing`), size-prefixed strings and IPv6 addresses
//! (`strings`, `net`), the command registry (`commands`), the reply
//! `Status` wire form (`status`), and the per-transport
//! structure-introspection cache (`registry`).
//!
//! Higher layers (session state machine, operation multiplexer) live in
//! `pva-service`; this crate only knows about bytes.

pub mod beacon;
pub mod buffer;
pub mod commands;
pub mod framing;
pub mod header;
pub mod net;
pub mod registry;
pub mod search;
pub mod status;
pub mod strings;

use std::{array::TryFromSliceError, io, string::FromUtf8Error};

/// Errors produced while encoding or decoding the wire protocol.
#[derive(Debug)]
pub enum Error {
    /// The buffer did not contain enough bytes to satisfy a `get`/`ensure`.
    Underflow,
    /// A `put` would have written past the buffer's capacity.
    Overflow,
    /// The frame header's `magic` byte did not match the protocol constant.
    BadMagic,
    /// The header declared an impossible combination of flag bits (a
    /// segmented control message, a non-zero payload on a fixed-size
    /// control command, or unknown flag bits set).
    InvalidDataStream,
    /// `command` did not map to a known `Command` variant.
    UnknownCommand(u8),
    /// A size-prefixed string's length byte selected the extended (5-byte)
    /// encoding but the extended length field itself was truncated.
    TruncatedStringLength,
    /// String bytes were not valid UTF-8.
    Utf8(FromUtf8Error),
    Io(io::Error),
    TryFromSlice(TryFromSliceError),
}

impl std::error::Error for Error {}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl From<io::Error> for Error {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<FromUtf8Error> for Error {
    fn from(value: FromUtf8Error) -> Self {
        Self::Utf8(value)
    }
}

impl From<TryFromSliceError> for Error {
    fn from(value: TryFromSliceError) -> Self {
        Self::TryFromSlice(value)
    }
}

/// The fixed first byte of every frame header.
///
/// No magic byte value is evidenced anywhere in this project's own source
/// material; `0xCA` is simply the fixed constant this codec and its peers
/// agree on. Nothing here depends on the specific value beyond that.
pub const MAGIC: u8 = 0xCA;

/// Current protocol version this codec speaks.
pub const PROTOCOL_VERSION: u8 = 2;

/// Sentinel IOID meaning "no operation" (§3 Identifiers).
pub const INVALID_IOID: u32 = 0xFFFF_FFFF;

/// Byte order selector carried in header flag bit 7.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrder {
    Little,
    Big,
}
