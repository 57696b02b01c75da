//! Outbound command packets.
//!
//! A `Packet` is the unframed form of one host-to-device command: the
//! command byte, an optional parameter byte, and an optional payload.
//! Framing (start tag, CRC, padding, encryption) is the codec's job.

/// One outbound command frame. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    command: u8,
    param: Option<u8>,
    payload: Vec<u8>,
    respond: bool,
}

impl Packet {
    /// Command with no parameter.
    pub fn new(command: u8) -> Self {
        Self {
            command,
            param: None,
            payload: Vec::new(),
            respond: true,
        }
    }

    /// Command with a single parameter byte.
    pub fn with_param(command: u8, param: u8) -> Self {
        Self {
            command,
            param: Some(param),
            payload: Vec::new(),
            respond: true,
        }
    }

    /// Command with parameter and payload.
    pub fn with_payload(command: u8, param: u8, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            command,
            param: Some(param),
            payload: payload.into(),
            respond: true,
        }
    }

    /// Mark the packet as fire-and-forget (no acknowledgement expected).
    pub fn without_response(mut self) -> Self {
        self.respond = false;
        self
    }

    pub fn command(&self) -> u8 {
        self.command
    }

    pub fn param(&self) -> Option<u8> {
        self.param
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Whether the device must acknowledge this packet.
    pub fn respond(&self) -> bool {
        self.respond
    }

    /// Canonical byte encoding: `[command, param?, payload...]`.
    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(1 + 1 + self.payload.len());
        out.push(self.command);
        if let Some(p) = self.param {
            out.push(p);
        }
        out.extend_from_slice(&self.payload);
        out
    }
}
