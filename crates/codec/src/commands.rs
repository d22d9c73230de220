//! The command registry (§6): every message type exchanged on either
//! transport, keyed by the single `command` byte in the frame header.

/// A protocol command, selected by the header's `command` byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Command {
    Beacon = 0,
    ConnectionValidation = 1,
    Echo = 2,
    Search = 3,
    SearchResponse = 4,
    Authnz = 5,
    AclChange = 6,
    CreateChannel = 7,
    DestroyChannel = 8,
    ConnectionValidated = 9,
    Get = 10,
    Put = 11,
    PutGet = 12,
    Monitor = 13,
    Array = 14,
    DestroyRequest = 15,
    Process = 16,
    GetField = 17,
    Message = 18,
    Rpc = 20,
    CancelRequest = 21,
}

impl Command {
    /// Whether this command, when sent as a control message, carries a
    /// parameter in the header's `payload_size` field rather than an
    /// always-zero value. Only `DESTROY_REQUEST` does today (it carries the
    /// IOID being destroyed when used as the lightweight control form).
    pub fn control_carries_parameter(self) -> bool {
        matches!(self, Command::DestroyRequest | Command::CancelRequest)
    }
}

impl TryFrom<u8> for Command {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Ok(match value {
            0 => Command::Beacon,
            1 => Command::ConnectionValidation,
            2 => Command::Echo,
            3 => Command::Search,
            4 => Command::SearchResponse,
            5 => Command::Authnz,
            6 => Command::AclChange,
            7 => Command::CreateChannel,
            8 => Command::DestroyChannel,
            9 => Command::ConnectionValidated,
            10 => Command::Get,
            11 => Command::Put,
            12 => Command::PutGet,
            13 => Command::Monitor,
            14 => Command::Array,
            15 => Command::DestroyRequest,
            16 => Command::Process,
            17 => Command::GetField,
            18 => Command::Message,
            20 => Command::Rpc,
            21 => Command::CancelRequest,
            other => return Err(other),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_every_known_code() {
        for code in [0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16, 17, 18, 20, 21] {
            let command = Command::try_from(code).unwrap();
            assert_eq!(command as u8, code);
        }
    }

    #[test]
    fn rejects_gaps_and_out_of_range() {
        assert_eq!(Command::try_from(19), Err(19));
        assert_eq!(Command::try_from(22), Err(22));
    }
}
