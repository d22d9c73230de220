//! UDP transport: answers `SEARCH` requests against the discovery
//! aggregate and emits periodic `BEACON`s, grounded on the teacher's
//! single-socket async UDP listener (search/beacon traffic is small and
//! bursty, unlike the per-core multi-thread UDP fan-out the teacher uses
//! for its data-plane traffic).

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::Arc;
use std::time::Duration;

use codec::beacon::Beacon;
use codec::buffer::ByteBuffer;
use codec::commands::Command;
use codec::framing::{Frame, FrameDecoder, FrameEncoder};
use codec::net::Guid;
use codec::search::{ChannelQuery, SearchRequest, SearchResponse};
use codec::ByteOrder;
use rand::RngCore;
use tokio::net::UdpSocket;

use crate::discovery::Discovery;

fn random_guid() -> Guid {
    let mut bytes = [0u8; 12];
    rand::rng().fill_bytes(&mut bytes);
    Guid(bytes)
}

pub async fn listen(
    addr: SocketAddr,
    discovery: Arc<Discovery>,
    beacon_period: Duration,
    protocol: &'static str,
) -> anyhow::Result<()> {
    let socket = Arc::new(UdpSocket::bind(addr).await?);
    socket.set_broadcast(true)?;
    let local_addr = socket.local_addr()?;
    let guid = random_guid();
    log::info!("pva server listening: listen={local_addr}, transport=UDP, guid={guid:?}");

    let change_count = Arc::new(AtomicU16::new(0));

    tokio::spawn(beacon_task(
        socket.clone(),
        local_addr,
        guid,
        protocol,
        beacon_period,
        change_count.clone(),
    ));

    let encoder = FrameEncoder::new(4096);
    let mut buffer = vec![0u8; 4096];

    loop {
        let (size, from) = match socket.recv_from(&mut buffer).await {
            Ok(result) => result,
            Err(e) => {
                log::warn!("udp socket receive error: {e}");
                continue;
            }
        };

        let mut decoder = FrameDecoder::new();
        decoder.feed(&buffer[..size]);
        let frame = match decoder.poll() {
            Ok(Some(frame)) => frame,
            Ok(None) => continue,
            Err(_) => continue,
        };

        let Frame::Application { command: Command::Search, payload } = frame else {
            continue;
        };

        let mut buf = ByteBuffer::with_capacity(payload.len());
        if buf.put_bytes(&payload).is_err() {
            continue;
        }
        buf.flip();
        let request = match SearchRequest::decode(&mut buf) {
            Ok(request) => request,
            Err(_) => continue,
        };

        if request.unicast_rebroadcast() {
            // §8 S5: a server with a local multicast group would forward
            // `request.with_origin_tag(local_addr.ip())` there, qos bit7
            // cleared, leaving the original response address untouched.
            // This deployment has no multicast group configured, so it
            // just answers the requester directly below.
            log::debug!("search unicast-rebroadcast requested from {from}, no multicast group configured");
        }

        if request.is_discovery_ping() {
            let delay = 50 + (rand::rng().next_u32() % 100) as u64;
            tokio::time::sleep(Duration::from_millis(delay)).await;
            let response = SearchResponse {
                guid,
                sequence_id: request.sequence_id,
                server_address: local_addr,
                protocol: protocol.to_string(),
                found: true,
                cids: Vec::new(),
            };
            send_response(&socket, &encoder, request.response_address, &response).await;
            continue;
        }

        let found_cids: Vec<u32> = request
            .channels
            .iter()
            .filter(|ChannelQuery { name, .. }| discovery.lookup(name).is_some())
            .map(|query| query.cid)
            .collect();

        if !found_cids.is_empty() {
            let response = SearchResponse {
                guid,
                sequence_id: request.sequence_id,
                server_address: local_addr,
                protocol: protocol.to_string(),
                found: true,
                cids: found_cids,
            };
            send_response(&socket, &encoder, request.response_address, &response).await;
        }
    }
}

async fn send_response(
    socket: &UdpSocket,
    encoder: &FrameEncoder,
    to: SocketAddr,
    response: &SearchResponse,
) {
    let mut buf = ByteBuffer::with_capacity(1024);
    if response.encode(&mut buf).is_err() {
        return;
    }
    let written = buf.position();
    let payload = &buf.as_slice()[..written];
    if let Ok(bytes) = encoder.encode_application(Command::SearchResponse, payload, ByteOrder::Little, true) {
        if let Err(e) = socket.send_to(&bytes, to).await {
            log::warn!("udp socket send error: to={to}, err={e}");
        }
    }
}

async fn beacon_task(
    socket: Arc<UdpSocket>,
    server_address: SocketAddr,
    guid: Guid,
    protocol: &'static str,
    period: Duration,
    change_count: Arc<AtomicU16>,
) {
    let encoder = FrameEncoder::new(4096);
    let mut sequence_id: u8 = 0;
    let mut ticker = tokio::time::interval(period);

    loop {
        ticker.tick().await;
        let beacon = Beacon {
            guid,
            qos_flags: 0,
            sequence_id,
            change_count: change_count.load(Ordering::Relaxed),
            server_address,
            protocol: protocol.to_string(),
        };
        sequence_id = sequence_id.wrapping_add(1);

        let mut buf = ByteBuffer::with_capacity(128);
        if beacon.encode(&mut buf).is_err() {
            continue;
        }
        let written = buf.position();
        let payload = &buf.as_slice()[..written];
        if let Ok(bytes) = encoder.encode_application(Command::Beacon, payload, ByteOrder::Little, true) {
            let broadcast: SocketAddr = ([255, 255, 255, 255], server_address.port()).into();
            if let Err(e) = socket.send_to(&bytes, broadcast).await {
                log::debug!("beacon broadcast send error (non-fatal): {e}");
            }
        }
    }
}
