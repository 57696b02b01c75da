//! Session - drives the handshake over a live transport.
//!
//! Owns the transport, the framing codec, and the state machine, and
//! realizes the single-actor model as a plain loop: read with a short
//! timeout, feed the decoder, dispatch frames, poll deadlines. Nothing
//! here blocks beyond the transport read timeout.

use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::channel::PacketCodec;
use crate::crypto::{KEY_LEN, key_from_password};
use crate::events::HandshakeListener;
use crate::handshake::{
    AuthPolicy, HandshakeContext, HandshakeError, HandshakeState, InitHandshake, PacketSink,
    RetryPolicy, StallBehavior,
};
use crate::protocol::Packet;
use crate::transport::{RfcommTransport, SerialTransport, TransportError};

/// Serializable retry-policy selection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PolicyConfig {
    Counter {
        update_limit: u32,
        retry_limit: u32,
        #[serde(default)]
        report_stall: bool,
    },
    Deadline {
        short_ms: u64,
        long_ms: u64,
    },
}

impl Default for PolicyConfig {
    fn default() -> Self {
        PolicyConfig::Counter {
            update_limit: 50,
            retry_limit: 3,
            report_stall: false,
        }
    }
}

impl PolicyConfig {
    pub fn to_policy(&self) -> RetryPolicy {
        match *self {
            PolicyConfig::Counter {
                update_limit,
                retry_limit,
                report_stall,
            } => RetryPolicy::Counter {
                update_limit,
                retry_limit,
                stall: if report_stall {
                    StallBehavior::Report
                } else {
                    StallBehavior::Silent
                },
            },
            PolicyConfig::Deadline { short_ms, long_ms } => RetryPolicy::Deadline {
                short: std::time::Duration::from_millis(short_ms),
                long: std::time::Duration::from_millis(long_ms),
            },
        }
    }
}

/// Configuration for a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Serial device path (e.g. `/dev/rfcomm0`).
    pub device: Option<String>,
    /// Baud rate; RFCOMM ignores it but the port API requires one.
    #[serde(default = "default_baud")]
    pub baud: u32,
    /// Shared key as hex (16 bytes). Takes precedence over `password`.
    pub key_hex: Option<String>,
    /// Password the shared key is derived from.
    pub password: Option<String>,
    /// Stall-recovery policy.
    #[serde(default)]
    pub policy: PolicyConfig,
}

fn default_baud() -> u32 {
    115_200
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            device: None,
            baud: default_baud(),
            key_hex: None,
            password: None,
            policy: PolicyConfig::default(),
        }
    }
}

impl SessionConfig {
    /// Load configuration from a TOML file
    pub fn load_from_file<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: SessionConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<std::path::Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Resolve the configured credentials into an auth policy.
    pub fn auth_policy(&self) -> Result<AuthPolicy> {
        if let Some(hex_key) = &self.key_hex {
            let bytes = hex::decode(hex_key).context("Invalid hex key")?;
            let key: [u8; KEY_LEN] = bytes
                .try_into()
                .map_err(|_| anyhow::anyhow!("Shared key must be {KEY_LEN} bytes"))?;
            return Ok(AuthPolicy::SharedKey(key));
        }
        if let Some(password) = &self.password {
            return Ok(AuthPolicy::SharedKey(key_from_password(password)));
        }
        Ok(AuthPolicy::None)
    }
}

/// Outcome of a single session step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    /// Link is up, keep stepping.
    Running,
    /// Transport reported a disconnect; the handshake went inert.
    Disconnected,
}

/// Sink adapter framing packets onto the transport.
struct ChannelSink<'a, T: SerialTransport> {
    codec: &'a mut PacketCodec,
    transport: &'a mut T,
}

impl<T: SerialTransport> PacketSink for ChannelSink<'_, T> {
    fn send(&mut self, packet: Packet) -> Result<(), TransportError> {
        let bytes = self.codec.encode(&packet);
        self.transport.write(&bytes)
    }
}

/// Drives one device association: transport + codec + state machine.
pub struct HidlinkSession<T: SerialTransport, L: HandshakeListener> {
    transport: T,
    codec: PacketCodec,
    handshake: InitHandshake,
    listener: Arc<L>,
    buf: Vec<u8>,
}

impl<L: HandshakeListener> HidlinkSession<RfcommTransport, L> {
    /// Open the configured serial device and build a session around it.
    pub fn from_config(config: &SessionConfig, listener: Arc<L>) -> Result<Self> {
        let device = config
            .device
            .as_deref()
            .context("No serial device configured")?;
        let transport = RfcommTransport::open(device, config.baud)?;
        let auth = config.auth_policy()?;
        Ok(Self::new(transport, auth, config.policy.to_policy(), listener))
    }
}

impl<T: SerialTransport, L: HandshakeListener> HidlinkSession<T, L> {
    pub fn new(transport: T, auth: AuthPolicy, policy: RetryPolicy, listener: Arc<L>) -> Self {
        Self {
            transport,
            codec: PacketCodec::new(),
            handshake: InitHandshake::new(auth, policy),
            listener,
            buf: vec![0u8; 256],
        }
    }

    pub fn handshake(&self) -> &InitHandshake {
        &self.handshake
    }

    /// Begin the bring-up sequence on a freshly connected link.
    pub fn connect(&mut self) -> Result<(), HandshakeError> {
        // A new connection starts from plaintext framing.
        self.codec.clear_cipher();
        let mut sink = ChannelSink {
            codec: &mut self.codec,
            transport: &mut self.transport,
        };
        let mut ctx = HandshakeContext {
            sink: &mut sink,
            listener: self.listener.as_ref(),
            now: Instant::now(),
        };
        self.handshake.on_connected(&mut ctx)?;
        Ok(())
    }

    /// One iteration of the event loop: read, decode, dispatch, poll
    /// deadlines. Returns the link status; terminal handshake failures
    /// surface as errors.
    pub fn step(&mut self) -> Result<SessionStatus, HandshakeError> {
        let frames = match self.transport.read(&mut self.buf) {
            Ok(0) => Vec::new(),
            Ok(n) => {
                let chunk = self.buf[..n].to_vec();
                self.codec.decode(&chunk)
            }
            Err(TransportError::Disconnected) => {
                self.handshake.on_disconnected();
                return Ok(SessionStatus::Disconnected);
            }
            Err(e) => {
                // Transient read errors: keep the loop alive, the retry
                // policy copes with the lost bytes.
                warn!(error = %e, "Transient read error");
                Vec::new()
            }
        };

        for frame in &frames {
            let mut sink = ChannelSink {
                codec: &mut self.codec,
                transport: &mut self.transport,
            };
            let mut ctx = HandshakeContext {
                sink: &mut sink,
                listener: self.listener.as_ref(),
                now: Instant::now(),
            };
            match self.handshake.on_frame(frame, &mut ctx) {
                Ok(()) => {}
                Err(TransportError::Disconnected) => {
                    self.handshake.on_disconnected();
                    return Ok(SessionStatus::Disconnected);
                }
                Err(e) => return Err(e.into()),
            }
        }

        let mut sink = ChannelSink {
            codec: &mut self.codec,
            transport: &mut self.transport,
        };
        let mut ctx = HandshakeContext {
            sink: &mut sink,
            listener: self.listener.as_ref(),
            now: Instant::now(),
        };
        match self.handshake.poll_deadlines(&mut ctx) {
            Ok(()) => {}
            Err(TransportError::Disconnected) => {
                self.handshake.on_disconnected();
                return Ok(SessionStatus::Disconnected);
            }
            Err(e) => return Err(e.into()),
        }

        if self.handshake.state() == HandshakeState::Failed {
            if let Some(failure) = self.handshake.failure() {
                return Err(failure);
            }
        }
        Ok(SessionStatus::Running)
    }

    /// Connect and pump the loop until the link drops or the handshake
    /// fails terminally. Readiness changes stream to the listener.
    pub fn run(&mut self) -> Result<(), HandshakeError> {
        self.connect()?;
        loop {
            match self.step()? {
                SessionStatus::Running => {}
                SessionStatus::Disconnected => {
                    info!("Session ended: link disconnected");
                    return Ok(());
                }
            }
        }
    }
}
