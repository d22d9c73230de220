//! Wire encoding for the `Status` carried on most application replies
//! (§7): a one-byte kind followed by an optional message.

use crate::{buffer::ByteBuffer, strings, Error};

/// Status kind byte. `Ok` carries no message; every other kind does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum StatusKind {
    Ok = 0,
    Warning = 1,
    Error = 2,
    Fatal = 3,
}

impl TryFrom<u8> for StatusKind {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Ok(match value {
            0 => StatusKind::Ok,
            1 => StatusKind::Warning,
            2 => StatusKind::Error,
            3 => StatusKind::Fatal,
            other => return Err(other),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WireStatus {
    pub kind: StatusKind,
    pub message: String,
}

impl WireStatus {
    pub fn ok() -> Self {
        Self {
            kind: StatusKind::Ok,
            message: String::new(),
        }
    }

    pub fn error(kind: StatusKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.kind == StatusKind::Ok
    }

    pub fn encode(&self, buf: &mut ByteBuffer) -> Result<(), Error> {
        buf.put_u8(self.kind as u8)?;
        if self.kind != StatusKind::Ok {
            strings::put_str(buf, &self.message)?;
        }
        Ok(())
    }

    pub fn decode(buf: &mut ByteBuffer) -> Result<Self, Error> {
        let kind = StatusKind::try_from(buf.get_u8()?).map_err(|_| Error::InvalidDataStream)?;
        let message = if kind == StatusKind::Ok {
            String::new()
        } else {
            strings::get_str(buf)?
        };
        Ok(Self { kind, message })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ok_status_round_trips_without_a_message() {
        let mut buf = ByteBuffer::with_capacity(16);
        WireStatus::ok().encode(&mut buf).unwrap();
        buf.flip();
        let decoded = WireStatus::decode(&mut buf).unwrap();
        assert_eq!(decoded, WireStatus::ok());
    }

    #[test]
    fn error_status_round_trips_with_its_message() {
        let mut buf = ByteBuffer::with_capacity(64);
        let status = WireStatus::error(StatusKind::Error, "bad cid");
        status.encode(&mut buf).unwrap();
        buf.flip();
        assert_eq!(WireStatus::decode(&mut buf).unwrap(), status);
    }
}
