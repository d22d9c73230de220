//! IPv6 address wire encoding (§6) and the server-instance GUID (§3).

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

use crate::{buffer::ByteBuffer, Error};

/// Encodes an address as 16 bytes, IPv4 addresses rendered in their
/// IPv4-mapped IPv6 form (`::ffff:a.b.c.d`).
pub fn put_address(buf: &mut ByteBuffer, addr: IpAddr) -> Result<(), Error> {
    let v6 = match addr {
        IpAddr::V4(v4) => v4.to_ipv6_mapped(),
        IpAddr::V6(v6) => v6,
    };
    buf.put_bytes(&v6.octets())
}

pub fn get_address(buf: &mut ByteBuffer) -> Result<IpAddr, Error> {
    let octets: [u8; 16] = buf.get_bytes(16)?.try_into()?;
    let v6 = Ipv6Addr::from(octets);
    Ok(match v6.to_ipv4_mapped() {
        Some(v4) => IpAddr::V4(v4),
        None => IpAddr::V6(v6),
    })
}

pub fn put_socket_addr(buf: &mut ByteBuffer, addr: SocketAddr) -> Result<(), Error> {
    put_address(buf, addr.ip())?;
    buf.put_u32(addr.port() as u32)
}

pub fn get_socket_addr(buf: &mut ByteBuffer) -> Result<SocketAddr, Error> {
    let ip = get_address(buf)?;
    let port = buf.get_u32()? as u16;
    Ok(SocketAddr::new(ip, port))
}

/// 12-byte server-instance identifier, stable across reconnects (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Guid(pub [u8; 12]);

impl Guid {
    pub fn decode(buf: &mut ByteBuffer) -> Result<Self, Error> {
        Ok(Self(buf.get_bytes(12)?.try_into()?))
    }

    pub fn encode(&self, buf: &mut ByteBuffer) -> Result<(), Error> {
        buf.put_bytes(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ipv4_round_trips_through_mapped_form() {
        let addr: IpAddr = Ipv4Addr::new(192, 168, 1, 7).into();
        let mut buf = ByteBuffer::with_capacity(16);
        put_address(&mut buf, addr).unwrap();
        buf.flip();
        assert_eq!(get_address(&mut buf).unwrap(), addr);
    }

    #[test]
    fn ipv6_round_trips() {
        let addr: IpAddr = "fe80::1".parse().unwrap();
        let mut buf = ByteBuffer::with_capacity(16);
        put_address(&mut buf, addr).unwrap();
        buf.flip();
        assert_eq!(get_address(&mut buf).unwrap(), addr);
    }

    #[test]
    fn guid_round_trips() {
        let guid = Guid([7u8; 12]);
        let mut buf = ByteBuffer::with_capacity(12);
        guid.encode(&mut buf).unwrap();
        buf.flip();
        assert_eq!(Guid::decode(&mut buf).unwrap(), guid);
    }
}
