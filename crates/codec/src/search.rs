//! SEARCH / SEARCH_RESPONSE wire payloads (§4.6).

use std::net::{IpAddr, SocketAddr};

use crate::{
    buffer::ByteBuffer,
    net::{self, Guid},
    strings, Error,
};

/// Bit 7 of a search request's `qos_flags`: "this is a unicast packet,
/// please rebroadcast it on your local multicast group" (§4.6, S5).
pub const QOS_UNICAST_REBROADCAST: u8 = 0x80;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelQuery {
    pub cid: u32,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    pub sequence_id: u32,
    pub qos_flags: u8,
    pub response_address: SocketAddr,
    pub protocols: Vec<String>,
    pub channels: Vec<ChannelQuery>,
}

impl SearchRequest {
    pub fn unicast_rebroadcast(&self) -> bool {
        self.qos_flags & QOS_UNICAST_REBROADCAST != 0
    }

    /// `count == 0` is a bare discovery ping (§8 boundary behaviour): the
    /// server replies `found = true` with zero CIDs after a jittered delay.
    pub fn is_discovery_ping(&self) -> bool {
        self.channels.is_empty()
    }

    pub fn decode(buf: &mut ByteBuffer) -> Result<Self, Error> {
        let sequence_id = buf.get_u32()?;
        let qos_flags = buf.get_u8()?;
        let _reserved = buf.get_bytes(3)?;
        let response_ip = net::get_address(buf)?;
        let response_port = buf.get_u32()? as u16;
        let protocol_count = buf.get_u16()?;
        let mut protocols = Vec::with_capacity(protocol_count as usize);
        for _ in 0..protocol_count {
            protocols.push(strings::get_str(buf)?);
        }
        let name_count = buf.get_u16()?;
        let mut channels = Vec::with_capacity(name_count as usize);
        for _ in 0..name_count {
            let cid = buf.get_u32()?;
            let name = strings::get_str(buf)?;
            channels.push(ChannelQuery { cid, name });
        }
        Ok(Self {
            sequence_id,
            qos_flags,
            response_address: SocketAddr::new(response_ip, response_port),
            protocols,
            channels,
        })
    }

    pub fn encode(&self, buf: &mut ByteBuffer) -> Result<(), Error> {
        buf.put_u32(self.sequence_id)?;
        buf.put_u8(self.qos_flags)?;
        buf.put_bytes(&[0, 0, 0])?;
        net::put_address(buf, self.response_address.ip())?;
        buf.put_u32(self.response_address.port() as u32)?;
        buf.put_u16(self.protocols.len() as u16)?;
        for protocol in &self.protocols {
            strings::put_str(buf, protocol)?;
        }
        buf.put_u16(self.channels.len() as u16)?;
        for channel in &self.channels {
            buf.put_u32(channel.cid)?;
            strings::put_str(buf, &channel.name)?;
        }
        Ok(())
    }

    /// Prepends an `ORIGIN_TAG`: the forwarding server's own bind address,
    /// used when rewriting a unicast search for local multicast rebroadcast
    /// (§4.6, S5). The tag is opaque to the receiver beyond its address.
    pub fn with_origin_tag(mut self, origin: IpAddr) -> (IpAddr, Self) {
        self.qos_flags &= !QOS_UNICAST_REBROADCAST;
        (origin, self)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchResponse {
    pub guid: Guid,
    pub sequence_id: u32,
    pub server_address: SocketAddr,
    pub protocol: String,
    pub found: bool,
    pub cids: Vec<u32>,
}

impl SearchResponse {
    pub fn decode(buf: &mut ByteBuffer) -> Result<Self, Error> {
        let guid = Guid::decode(buf)?;
        let sequence_id = buf.get_u32()?;
        let server_ip = net::get_address(buf)?;
        let server_port = buf.get_u32()? as u16;
        let protocol = strings::get_str(buf)?;
        let found = buf.get_u8()? != 0;
        let count = buf.get_i16()?;
        let mut cids = Vec::new();
        if count > 0 {
            for _ in 0..count {
                cids.push(buf.get_u32()?);
            }
        }
        Ok(Self {
            guid,
            sequence_id,
            server_address: SocketAddr::new(server_ip, server_port),
            protocol,
            found,
            cids,
        })
    }

    pub fn encode(&self, buf: &mut ByteBuffer) -> Result<(), Error> {
        self.guid.encode(buf)?;
        buf.put_u32(self.sequence_id)?;
        net::put_address(buf, self.server_address.ip())?;
        buf.put_u32(self.server_address.port() as u32)?;
        strings::put_str(buf, &self.protocol)?;
        buf.put_u8(self.found as u8)?;
        buf.put_i16(self.cids.len() as i16)?;
        for cid in &self.cids {
            buf.put_u32(*cid)?;
        }
        Ok(())
    }
}
