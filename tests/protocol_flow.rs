//! End-to-end protocol-layer coverage (§8 S1): drives a `Session`
//! directly with encoded wire bytes, the way the unit tests in
//! `server::session` do, but through the crate's public surface only.

use std::net::SocketAddr;
use std::sync::Arc;

use codec::buffer::ByteBuffer;
use codec::commands::Command;
use codec::framing::{Frame, FrameDecoder, FrameEncoder};
use codec::status::WireStatus;
use codec::{strings, ByteOrder};

use pva_server::channel_provider::StaticChannelProvider;
use pva_server::server::session::Session;
use pva_server::statistics::Statistics;

use service::security::{AnonymousPlugin, PluginRegistry};

fn remote() -> SocketAddr {
    "127.0.0.1:12345".parse().unwrap()
}

fn new_session(known: &[&str]) -> Session {
    let provider = Arc::new(StaticChannelProvider::new(known.iter().map(|s| s.to_string())));
    let plugins = Arc::new(PluginRegistry::new());
    plugins.add(0, Arc::new(AnonymousPlugin));
    let reporter = Statistics::new().get_reporter(remote());
    Session::new(remote(), provider, plugins, reporter, 4096)
}

fn decode_one(bytes: &[u8]) -> Frame {
    let mut decoder = FrameDecoder::new();
    decoder.feed(bytes);
    decoder.poll().unwrap().unwrap()
}

#[test]
fn socket_open_offers_the_default_plugin_set() {
    let mut session = new_session(&["x"]);
    let bytes = session.on_socket_open().unwrap();
    let Frame::Application { command, payload } = decode_one(&bytes) else {
        panic!("expected an application frame");
    };
    assert_eq!(command, Command::ConnectionValidation);

    let mut buf = ByteBuffer::with_capacity(payload.len());
    buf.put_bytes(&payload).unwrap();
    buf.flip();
    let _receive_buffer_size = buf.get_u32().unwrap();
    let _registry_cap = buf.get_u32().unwrap();
    let plugin_count = buf.get_u16().unwrap();
    assert_eq!(plugin_count, 1);
    assert_eq!(strings::get_str(&mut buf).unwrap(), "anonymous");
}

fn authenticate(session: &mut Session) {
    session.on_socket_open().unwrap();
    let payload = {
        let mut buf = ByteBuffer::with_capacity(32);
        strings::put_str(&mut buf, "anonymous").unwrap();
        buf.put_u32(0).unwrap();
        buf.as_slice()[..buf.position()].to_vec()
    };
    let bytes = FrameEncoder::new(4096)
        .encode_application(Command::Authnz, &payload, ByteOrder::Little, false)
        .unwrap();
    session.on_bytes(&bytes).unwrap();
}

#[test]
fn create_channel_then_get_then_destroy_follows_the_basic_get_scenario() {
    let mut session = new_session(&["x"]);
    authenticate(&mut session);

    let create_payload = {
        let mut buf = ByteBuffer::with_capacity(64);
        buf.put_u32(7).unwrap();
        strings::put_str(&mut buf, "x").unwrap();
        buf.as_slice()[..buf.position()].to_vec()
    };
    let create_bytes = FrameEncoder::new(4096)
        .encode_application(Command::CreateChannel, &create_payload, ByteOrder::Little, false)
        .unwrap();
    let replies = session.on_bytes(&create_bytes).unwrap();
    assert_eq!(replies.len(), 1);

    let Frame::Application { payload, .. } = decode_one(&replies[0]) else {
        panic!("expected an application frame");
    };
    let mut buf = ByteBuffer::with_capacity(payload.len());
    buf.put_bytes(&payload).unwrap();
    buf.flip();
    let cid = buf.get_u32().unwrap();
    let sid = buf.get_u32().unwrap();
    assert_eq!(cid, 7);
    assert!(WireStatus::decode(&mut buf).unwrap().is_ok());

    let get_init_payload = {
        let mut buf = ByteBuffer::with_capacity(16);
        buf.put_u32(sid).unwrap();
        buf.put_u32(3).unwrap();
        buf.put_u8(service::qos::INIT).unwrap();
        buf.as_slice()[..buf.position()].to_vec()
    };
    let get_bytes = FrameEncoder::new(4096)
        .encode_application(Command::Get, &get_init_payload, ByteOrder::Little, false)
        .unwrap();
    let replies = session.on_bytes(&get_bytes).unwrap();
    let Frame::Application { command, payload } = decode_one(&replies[0]) else {
        panic!("expected an application frame");
    };
    assert_eq!(command, Command::Get);
    let mut buf = ByteBuffer::with_capacity(payload.len());
    buf.put_bytes(&payload).unwrap();
    buf.flip();
    assert_eq!(buf.get_u32().unwrap(), 3);
    buf.get_u8().unwrap();
    assert!(WireStatus::decode(&mut buf).unwrap().is_ok());

    let destroy_payload = {
        let mut buf = ByteBuffer::with_capacity(16);
        buf.put_u32(7).unwrap();
        buf.put_u32(sid).unwrap();
        buf.as_slice()[..buf.position()].to_vec()
    };
    let destroy_bytes = FrameEncoder::new(4096)
        .encode_application(Command::DestroyChannel, &destroy_payload, ByteOrder::Little, false)
        .unwrap();
    session.on_bytes(&destroy_bytes).unwrap();
}

#[test]
fn bad_magic_closes_the_session() {
    let mut session = new_session(&["x"]);
    session.on_socket_open().unwrap();
    let bad = [0x00, 2, 0x01, 0x23, 0x45, 0x67, 0x89, 0xAB];
    let result = session.on_bytes(&bad);
    assert!(result.is_err());
    assert!(session.is_closed());
}
