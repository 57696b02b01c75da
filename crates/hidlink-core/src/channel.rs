//! Packet channel codec.
//!
//! Sits between the raw serial transport and the protocol layer: frames
//! outbound [`Packet`]s (start tag, info byte, CRC32, 16-byte padding,
//! optional encryption) and incrementally decodes the inbound byte
//! stream back into [`Frame`]s. The decoder tolerates frames split or
//! coalesced arbitrarily by the transport and resynchronizes on the
//! start tag after garbage or a CRC failure.

use byteorder::{BigEndian, ByteOrder};
use tracing::{debug, trace};

use crate::crypto::ChannelCipher;
use crate::protocol::constants::*;
use crate::protocol::{Frame, FrameError, Packet};

/// Framing codec with optional encryption. One instance per connection.
#[derive(Default)]
pub struct PacketCodec {
    cipher: Option<ChannelCipher>,
    state: DecodeState,
}

#[derive(Default)]
enum DecodeState {
    #[default]
    Tag,
    Info,
    Body {
        info: u8,
        needed: usize,
        buf: Vec<u8>,
    },
}

impl PacketCodec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable encryption for the rest of the session.
    pub fn set_cipher(&mut self, cipher: ChannelCipher) {
        self.cipher = Some(cipher);
    }

    /// Drop the cipher, returning to plaintext framing.
    pub fn clear_cipher(&mut self) {
        self.cipher = None;
    }

    pub fn is_encrypted(&self) -> bool {
        self.cipher.is_some()
    }

    /// Frame a packet for transmission.
    ///
    /// Layout: `[START_TAG, info]` followed by the body — a CRC32 (big
    /// endian) over the serialized packet, then the packet itself,
    /// zero-padded to a multiple of 16 bytes. The info byte carries the
    /// sub-block count plus the respond/encrypted flags.
    pub fn encode(&mut self, packet: &Packet) -> Vec<u8> {
        let data = packet.serialize();
        let blocks = (data.len() + CRC_LEN).div_ceil(SUB_BLOCK);

        let mut body = vec![0u8; blocks * SUB_BLOCK];
        body[CRC_LEN..CRC_LEN + data.len()].copy_from_slice(&data);
        let crc = crc32fast::hash(&body[CRC_LEN..]);
        BigEndian::write_u32(&mut body[..CRC_LEN], crc);

        let mut info = blocks as u8;
        if packet.respond() {
            info |= FLAG_RESPOND;
        }
        if let Some(cipher) = self.cipher.as_mut() {
            cipher.encrypt(&mut body);
            info |= FLAG_ENCRYPTED;
        }

        let mut out = Vec::with_capacity(2 + body.len());
        out.push(START_TAG);
        out.push(info);
        out.extend_from_slice(&body);
        out
    }

    /// Feed raw transport bytes, collecting any completed frames.
    ///
    /// Malformed bodies (CRC mismatch, encrypted frame with no cipher,
    /// truncated body) are dropped silently; the scanner resumes at the
    /// next start tag.
    pub fn decode(&mut self, chunk: &[u8]) -> Vec<Frame> {
        let mut frames = Vec::new();
        for &byte in chunk {
            match &mut self.state {
                DecodeState::Tag => {
                    if byte == START_TAG {
                        self.state = DecodeState::Info;
                    } else {
                        trace!(byte = %format!("0x{byte:02X}"), "Skipping stray byte");
                    }
                }
                DecodeState::Info => {
                    let blocks = (byte & SUB_BLOCK_COUNT_MASK) as usize;
                    if blocks == 0 {
                        debug!("Zero-length frame header, resynchronizing");
                        self.state = DecodeState::Tag;
                    } else {
                        self.state = DecodeState::Body {
                            info: byte,
                            needed: blocks * SUB_BLOCK,
                            buf: Vec::with_capacity(blocks * SUB_BLOCK),
                        };
                    }
                }
                DecodeState::Body { info, needed, buf } => {
                    buf.push(byte);
                    if buf.len() == *needed {
                        let info = *info;
                        let body = std::mem::take(buf);
                        self.state = DecodeState::Tag;
                        match self.finish_body(info, body) {
                            Ok(frame) => {
                                trace!(?frame, "Frame decoded");
                                frames.push(frame);
                            }
                            Err(e) => debug!(error = %e, "Dropping malformed frame"),
                        }
                    }
                }
            }
        }
        frames
    }

    fn finish_body(&mut self, info: u8, mut body: Vec<u8>) -> Result<Frame, FrameError> {
        if info & FLAG_ENCRYPTED != 0 {
            match self.cipher.as_mut() {
                Some(cipher) => cipher.decrypt(&mut body),
                None => return Err(FrameError::NoCipher),
            }
        }

        let expected = BigEndian::read_u32(&body[..CRC_LEN]);
        let actual = crc32fast::hash(&body[CRC_LEN..]);
        if expected != actual {
            return Err(FrameError::CrcMismatch { expected, actual });
        }

        Frame::from_body(body[CRC_LEN..].to_vec())
    }
}
