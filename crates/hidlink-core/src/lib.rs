//! hidlink-core: bring-up protocol for a Bluetooth HID bridge dongle.
//!
//! The dongle arrives "just connected" and useless; this crate walks it
//! to "accepting HID input" over an unreliable serial link and keeps
//! watching its readiness afterwards.
//!
//! # Architecture
//!
//! The crate is organized into layers:
//!
//! - **Protocol**: Command bytes, outbound packets, decoded frames
//! - **Channel**: Framing codec (start tag, CRC32, optional encryption)
//! - **Device info**: Firmware/security metadata and capability gates
//! - **Handshake**: The bring-up state machine and its retry policies
//! - **Transport**: Serial link abstraction (serialport, mock)
//! - **Events**: Listener interface for readiness notifications
//! - **Session**: High-level orchestrator
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use hidlink_core::events::TracingListener;
//! use hidlink_core::session::{HidlinkSession, SessionConfig};
//!
//! let config = SessionConfig {
//!     device: Some("/dev/rfcomm0".to_string()),
//!     ..Default::default()
//! };
//!
//! let listener = Arc::new(TracingListener);
//! let mut session = HidlinkSession::from_config(&config, listener).expect("open failed");
//! session.run().expect("bring-up failed");
//! ```

pub mod channel;
pub mod crypto;
pub mod device_info;
pub mod events;
pub mod handshake;
pub mod protocol;
pub mod session;
pub mod transport;

// Re-exports for convenience
pub use channel::PacketCodec;
pub use crypto::{AesAuthenticator, Authenticator, ChannelCipher, key_from_password};
pub use device_info::DeviceInfo;
pub use events::{HandshakeListener, NullListener, TracingListener};
pub use handshake::{
    AuthPolicy, HandshakeError, HandshakeState, InitHandshake, RetryPolicy, StallBehavior,
};
pub use protocol::{Frame, Packet};
pub use session::{HidlinkSession, SessionConfig, SessionStatus};
pub use transport::{MockTransport, RfcommTransport, SerialTransport, TransportError};
