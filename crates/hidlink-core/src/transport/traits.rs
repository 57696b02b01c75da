//! Serial transport abstraction.
//!
//! Defines the `SerialTransport` trait the session drives, allowing
//! different backends (serialport, mock).

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Failed to open {path}: {message}")]
    OpenFailed { path: String, message: String },

    #[error("Write failed: {0}")]
    WriteFailed(String),

    #[error("Read failed: {0}")]
    ReadFailed(String),

    #[error("Device disconnected")]
    Disconnected,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Abstract serial link to the dongle.
///
/// This trait enables:
/// - Production implementation over an RFCOMM serial device
/// - Mock implementation for unit testing
pub trait SerialTransport: Send {
    /// Read whatever bytes are available. Returns `Ok(0)` when the read
    /// timeout elapsed with nothing to deliver; the caller uses that as
    /// its timer tick.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, TransportError>;

    /// Write raw bytes to the link.
    fn write(&mut self, data: &[u8]) -> Result<(), TransportError>;

    /// Whether the link is still up.
    fn is_connected(&self) -> bool;

    /// Tear the link down. Idempotent.
    fn disconnect(&mut self);
}
