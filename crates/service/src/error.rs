//! Error kinds (§7). `Display` forwards to `Debug`, matching the
//! error-enum style used throughout this codebase's lower layer.

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Transport gone; operations notified and marked disconnected.
    ConnectionClosed,
    /// Protocol violation; the transport is torn down.
    InvalidDataStream,
    /// Operation method called before its INIT reply arrived.
    NotInitialized,
    /// A request is already in flight on this operation.
    OtherRequestPending,
    BadCid,
    BadIoid,
    NotAChannelRequest,
    InvalidPutStructure,
    InvalidPutArray,
    InvalidBitSetLength,
    /// Operation/wait exceeded its configured duration.
    Timeout,
    /// Unrecoverable (OOM, plugin failure); propagated to the user.
    Fatal(String),
}

impl Error {
    /// Whether this error kind requires tearing the transport down, per
    /// the §7 policy (everything else reaches only the specific
    /// requester).
    pub fn closes_transport(&self) -> bool {
        matches!(self, Error::ConnectionClosed | Error::InvalidDataStream | Error::Fatal(_))
    }
}

impl std::error::Error for Error {}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl From<codec::Error> for Error {
    fn from(value: codec::Error) -> Self {
        match value {
            codec::Error::Underflow | codec::Error::Overflow => Error::InvalidDataStream,
            codec::Error::BadMagic | codec::Error::InvalidDataStream => Error::InvalidDataStream,
            codec::Error::UnknownCommand(_) => Error::InvalidDataStream,
            codec::Error::TruncatedStringLength => Error::InvalidDataStream,
            codec::Error::Utf8(_) | codec::Error::TryFromSlice(_) => Error::InvalidDataStream,
            codec::Error::Io(_) => Error::ConnectionClosed,
        }
    }
}
