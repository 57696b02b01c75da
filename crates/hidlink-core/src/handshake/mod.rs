//! Bring-up handshake module.

pub mod machine;
pub mod policy;
pub mod timer;

use thiserror::Error;

use crate::protocol::Packet;
use crate::transport::TransportError;

pub use machine::{HandshakeContext, HandshakeState, InitHandshake};
pub use policy::{AuthPolicy, RetryPolicy, StallBehavior};
pub use timer::Deadline;

/// Terminal handshake failures.
#[derive(Error, Debug)]
pub enum HandshakeError {
    /// The device explicitly rejected initialization.
    #[error("Device rejected initialization (code 0x{0:02X})")]
    DeviceInit(u8),

    /// The long deadline expired before init completed.
    #[error("Handshake timed out before init completed")]
    Timeout,

    /// Retry budget exhausted while the device kept reporting status.
    #[error("Handshake stalled: retry budget exhausted")]
    Stalled,

    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Outbound capability handed to the state machine.
///
/// The production implementation frames packets through the codec and
/// writes them to the transport; tests substitute a recorder.
pub trait PacketSink {
    fn send(&mut self, packet: Packet) -> Result<(), TransportError>;
}
