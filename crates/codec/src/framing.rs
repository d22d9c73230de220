//! Framing codec (§4.2): header-driven reader/writer state machines that
//! make message segmentation transparent to callers.
//!
//! Both sides are buffer-driven rather than socket-driven: `FrameDecoder`
//! consumes whatever bytes the transport layer read off the wire and hands
//! back complete frames (or `None` while waiting for more), and
//! `FrameEncoder` turns one logical message into the wire bytes for one or
//! more segments. Socket I/O itself belongs to the transport layer in
//! `pva-service`.

use crate::{
    buffer::ByteBuffer,
    commands::Command,
    header::{Flags, Header, Segment, HEADER_LEN},
    ByteOrder, Error,
};

/// One fully reassembled unit handed to the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// A control message: no payload bytes, just a command-specific
    /// parameter carried in the header's size field.
    Control { command: Command, parameter: u32 },
    /// A complete application message, its payload reassembled across
    /// however many segments the sender split it into.
    Application { command: Command, payload: Vec<u8> },
}

struct Assembly {
    command: Command,
    payload: Vec<u8>,
}

/// Reader-side state machine. Owns a growable buffer of bytes not yet
/// turned into frames.
pub struct FrameDecoder {
    pending: Vec<u8>,
    read_pos: usize,
    assembly: Option<Assembly>,
    invalid_data_stream_count: u64,
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self {
            pending: Vec::new(),
            read_pos: 0,
            assembly: None,
            invalid_data_stream_count: 0,
        }
    }

    /// Count of frames rejected for bad magic / invalid flag combinations
    /// / segment-command mismatches, exposed so the transport can log and
    /// tear the connection down per §4.2 failure semantics.
    pub fn invalid_data_stream_count(&self) -> u64 {
        self.invalid_data_stream_count
    }

    /// Appends newly-read socket bytes to the pending buffer.
    pub fn feed(&mut self, bytes: &[u8]) {
        if self.read_pos > 0 && self.read_pos == self.pending.len() {
            self.pending.clear();
            self.read_pos = 0;
        } else if self.read_pos > 4096 {
            self.pending.drain(..self.read_pos);
            self.read_pos = 0;
        }
        self.pending.extend_from_slice(bytes);
    }

    /// Attempts to produce the next complete frame from bytes fed so far.
    /// Returns `Ok(None)` (the `WAIT_FOR_DATA` state) when more bytes are
    /// needed; a control or fully-reassembled application frame otherwise.
    /// An `Err` means the stream is corrupt and the caller MUST close the
    /// transport (§4.2 failure semantics).
    pub fn poll(&mut self) -> Result<Option<Frame>, Error> {
        loop {
            let available = &self.pending[self.read_pos..];
            if available.len() < HEADER_LEN {
                return Ok(None);
            }

            let header = match self.decode_header(&available[..HEADER_LEN]) {
                Ok(header) => header,
                Err(err) => {
                    self.invalid_data_stream_count += 1;
                    return Err(err);
                }
            };

            if header.flags.control {
                self.read_pos += HEADER_LEN;
                return Ok(Some(Frame::Control {
                    command: header.command,
                    parameter: header.payload_size,
                }));
            }

            let payload_size = header.payload_size as usize;
            if available.len() < HEADER_LEN + payload_size {
                return Ok(None);
            }
            let payload =
                self.pending[self.read_pos + HEADER_LEN..self.read_pos + HEADER_LEN + payload_size]
                    .to_vec();
            self.read_pos += HEADER_LEN + payload_size;

            match header.flags.segment {
                Segment::Solo => return Ok(Some(Frame::Application {
                    command: header.command,
                    payload,
                })),
                Segment::First => {
                    if self.assembly.is_some() {
                        self.invalid_data_stream_count += 1;
                        return Err(Error::InvalidDataStream);
                    }
                    self.assembly = Some(Assembly {
                        command: header.command,
                        payload,
                    });
                }
                Segment::Middle => match &mut self.assembly {
                    Some(assembly) if assembly.command == header.command => {
                        assembly.payload.extend_from_slice(&payload);
                    }
                    _ => {
                        self.invalid_data_stream_count += 1;
                        return Err(Error::InvalidDataStream);
                    }
                },
                Segment::Last => match self.assembly.take() {
                    Some(mut assembly) if assembly.command == header.command => {
                        assembly.payload.extend_from_slice(&payload);
                        return Ok(Some(Frame::Application {
                            command: assembly.command,
                            payload: assembly.payload,
                        }));
                    }
                    _ => {
                        self.invalid_data_stream_count += 1;
                        return Err(Error::InvalidDataStream);
                    }
                },
            }
        }
    }

    fn decode_header(&self, bytes: &[u8]) -> Result<Header, Error> {
        let mut buf = ByteBuffer::with_capacity(HEADER_LEN);
        buf.put_bytes(bytes)?;
        buf.flip();
        Header::decode(&mut buf)
    }
}

/// Writer-side state machine. Splits one logical message into as many
/// wire segments as `max_segment_payload` requires.
pub struct FrameEncoder {
    max_segment_payload: usize,
    version: u8,
}

impl FrameEncoder {
    pub fn new(max_segment_payload: usize) -> Self {
        assert!(max_segment_payload > 0);
        Self {
            max_segment_payload,
            version: crate::PROTOCOL_VERSION,
        }
    }

    pub fn encode_control(
        &self,
        command: Command,
        parameter: u32,
        order: ByteOrder,
        server_direction: bool,
    ) -> Result<Vec<u8>, Error> {
        let header = Header {
            version: self.version,
            flags: Flags::control(order).with_direction(server_direction),
            command,
            payload_size: parameter,
        };
        let mut buf = ByteBuffer::with_capacity(HEADER_LEN);
        header.encode(&mut buf)?;
        Ok(buf.as_slice()[..HEADER_LEN].to_vec())
    }

    /// Encodes one application message, segmenting it transparently if it
    /// exceeds `max_segment_payload`.
    pub fn encode_application(
        &self,
        command: Command,
        payload: &[u8],
        order: ByteOrder,
        server_direction: bool,
    ) -> Result<Vec<u8>, Error> {
        let chunks: Vec<&[u8]> = if payload.is_empty() {
            vec![&[][..]]
        } else {
            payload.chunks(self.max_segment_payload).collect()
        };
        let mut out = Vec::with_capacity(HEADER_LEN * chunks.len() + payload.len());
        let last = chunks.len() - 1;
        for (i, chunk) in chunks.iter().enumerate() {
            let segment = match (chunks.len(), i) {
                (1, _) => Segment::Solo,
                (_, 0) => Segment::First,
                (_, i) if i == last => Segment::Last,
                _ => Segment::Middle,
            };
            let header = Header {
                version: self.version,
                flags: Flags::application(order)
                    .with_segment(segment)
                    .with_direction(server_direction),
                command,
                payload_size: chunk.len() as u32,
            };
            let mut buf = ByteBuffer::with_capacity(HEADER_LEN + chunk.len());
            header.encode(&mut buf)?;
            buf.put_bytes(chunk)?;
            out.extend_from_slice(&buf.as_slice()[..HEADER_LEN + chunk.len()]);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_solo_application_message() {
        let encoder = FrameEncoder::new(4096);
        let bytes = encoder
            .encode_application(Command::Get, b"hello", ByteOrder::Little, false)
            .unwrap();

        let mut decoder = FrameDecoder::new();
        decoder.feed(&bytes);
        let frame = decoder.poll().unwrap().unwrap();
        assert_eq!(
            frame,
            Frame::Application {
                command: Command::Get,
                payload: b"hello".to_vec(),
            }
        );
    }

    #[test]
    fn reassembles_segmented_message_regardless_of_slicing() {
        let encoder = FrameEncoder::new(4);
        let payload = b"0123456789";
        let bytes = encoder
            .encode_application(Command::Put, payload, ByteOrder::Little, false)
            .unwrap();

        // feed one byte at a time to prove reassembly doesn't depend on
        // how the transport slices reads (§8 property 4).
        let mut decoder = FrameDecoder::new();
        let mut frame = None;
        for byte in bytes {
            decoder.feed(&[byte]);
            if let Some(f) = decoder.poll().unwrap() {
                frame = Some(f);
                break;
            }
        }
        assert_eq!(
            frame.unwrap(),
            Frame::Application {
                command: Command::Put,
                payload: payload.to_vec(),
            }
        );
    }

    #[test]
    fn control_message_interleaved_mid_segment_dispatches_immediately() {
        let data_encoder = FrameEncoder::new(4);
        let mut bytes = Vec::new();
        // first segment of a 10-byte PUT split at 4 bytes/segment
        let first_and_rest = data_encoder
            .encode_application(Command::Put, b"0123456789", ByteOrder::Little, false)
            .unwrap();
        // split after the first segment (header + 4 bytes payload = 12)
        let (first_segment, rest) = first_and_rest.split_at(HEADER_LEN + 4);
        bytes.extend_from_slice(first_segment);
        bytes.extend_from_slice(
            &data_encoder
                .encode_control(Command::Echo, 0, ByteOrder::Little, false)
                .unwrap(),
        );
        bytes.extend_from_slice(rest);

        let mut decoder = FrameDecoder::new();
        decoder.feed(&bytes);
        let control = decoder.poll().unwrap().unwrap();
        assert_eq!(
            control,
            Frame::Control {
                command: Command::Echo,
                parameter: 0,
            }
        );
        let application = decoder.poll().unwrap().unwrap();
        assert_eq!(
            application,
            Frame::Application {
                command: Command::Put,
                payload: b"0123456789".to_vec(),
            }
        );
    }

    #[test]
    fn bad_magic_reports_invalid_data_stream_and_counts_it() {
        let mut decoder = FrameDecoder::new();
        decoder.feed(&[0x00, 2, 0x01, 0x23, 0x45, 0x67, 0x89, 0xAB]);
        assert!(matches!(decoder.poll(), Err(Error::InvalidDataStream) | Err(Error::BadMagic)));
        assert_eq!(decoder.invalid_data_stream_count(), 1);
    }
}
