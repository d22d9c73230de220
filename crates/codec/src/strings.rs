//! Size-prefixed UTF-8 strings (§6): a 1-byte length for 0..=254, or the
//! sentinel byte 255 followed by a 4-byte length for anything longer.

use crate::{buffer::ByteBuffer, Error};

const EXTENDED_MARKER: u8 = 255;

pub fn put_str(buf: &mut ByteBuffer, value: &str) -> Result<(), Error> {
    let bytes = value.as_bytes();
    if bytes.len() < EXTENDED_MARKER as usize {
        buf.put_u8(bytes.len() as u8)?;
    } else {
        buf.put_u8(EXTENDED_MARKER)?;
        buf.put_u32(bytes.len() as u32)?;
    }
    buf.put_bytes(bytes)
}

pub fn get_str(buf: &mut ByteBuffer) -> Result<String, Error> {
    let marker = buf.get_u8()?;
    let len = if marker == EXTENDED_MARKER {
        buf.ensure(4).map_err(|_| Error::TruncatedStringLength)?;
        buf.get_u32()? as usize
    } else {
        marker as usize
    };
    Ok(String::from_utf8(buf.get_bytes(len)?)?)
}

/// `None` is encoded as the size-prefixed-string sentinel used for absent
/// optional names: a zero-length marker is a valid empty string, so absent
/// values are represented by the caller's own optional framing (a leading
/// presence byte) rather than overloading this encoding. Provided as a
/// convenience for the common `Option<String>` case on the wire.
pub fn put_optional_str(buf: &mut ByteBuffer, value: Option<&str>) -> Result<(), Error> {
    match value {
        Some(value) => {
            buf.put_u8(1)?;
            put_str(buf, value)
        }
        None => buf.put_u8(0),
    }
}

pub fn get_optional_str(buf: &mut ByteBuffer) -> Result<Option<String>, Error> {
    if buf.get_u8()? == 0 {
        Ok(None)
    } else {
        Ok(Some(get_str(buf)?))
    }
}
