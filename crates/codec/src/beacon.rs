//! BEACON wire payload (§4.6): periodic unsolicited server advertisement.

use std::net::SocketAddr;

use crate::{
    buffer::ByteBuffer,
    net::{self, Guid},
    strings, Error,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Beacon {
    pub guid: Guid,
    pub qos_flags: u8,
    pub sequence_id: u8,
    /// Incremented whenever the server's channel set changes; a change
    /// relative to the last beacon seen from this GUID is a
    /// "new-server-detected" signal (§4.6) even if the GUID is already
    /// known.
    pub change_count: u16,
    pub server_address: SocketAddr,
    pub protocol: String,
}

impl Beacon {
    pub fn decode(buf: &mut ByteBuffer) -> Result<Self, Error> {
        let guid = Guid::decode(buf)?;
        let qos_flags = buf.get_u8()?;
        let sequence_id = buf.get_u8()?;
        let change_count = buf.get_u16()?;
        let server_ip = net::get_address(buf)?;
        let server_port = buf.get_u32()? as u16;
        let protocol = strings::get_str(buf)?;
        Ok(Self {
            guid,
            qos_flags,
            sequence_id,
            change_count,
            server_address: SocketAddr::new(server_ip, server_port),
            protocol,
        })
    }

    pub fn encode(&self, buf: &mut ByteBuffer) -> Result<(), Error> {
        self.guid.encode(buf)?;
        buf.put_u8(self.qos_flags)?;
        buf.put_u8(self.sequence_id)?;
        buf.put_u16(self.change_count)?;
        net::put_address(buf, self.server_address.ip())?;
        buf.put_u32(self.server_address.port() as u32)?;
        strings::put_str(buf, &self.protocol)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn beacon_round_trips() {
        let beacon = Beacon {
            guid: Guid([9; 12]),
            qos_flags: 0,
            sequence_id: 1,
            change_count: 4,
            server_address: "127.0.0.1:5075".parse().unwrap(),
            protocol: "tcp".to_string(),
        };
        let mut buf = ByteBuffer::with_capacity(128);
        beacon.encode(&mut buf).unwrap();
        buf.flip();
        assert_eq!(Beacon::decode(&mut buf).unwrap(), beacon);
    }
}
