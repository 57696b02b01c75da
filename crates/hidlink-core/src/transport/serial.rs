//! Production transport over an RFCOMM serial device.
//!
//! A paired dongle shows up as a serial device node (`/dev/rfcomm0` on
//! Linux, a COM port on Windows); the `serialport` crate handles the
//! platform differences.

use std::io::{ErrorKind, Read, Write};
use std::time::Duration;

use serialport::SerialPort;
use tracing::{debug, info};

use super::traits::{SerialTransport, TransportError};

/// Default read timeout; doubles as the session's timer tick.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(50);

pub struct RfcommTransport {
    port: Option<Box<dyn SerialPort>>,
    path: String,
}

impl RfcommTransport {
    /// Open the serial device with the default read timeout.
    pub fn open(path: &str, baud: u32) -> Result<Self, TransportError> {
        Self::open_with_timeout(path, baud, DEFAULT_READ_TIMEOUT)
    }

    pub fn open_with_timeout(
        path: &str,
        baud: u32,
        timeout: Duration,
    ) -> Result<Self, TransportError> {
        let port = serialport::new(path, baud)
            .timeout(timeout)
            .open()
            .map_err(|e| TransportError::OpenFailed {
                path: path.to_string(),
                message: e.to_string(),
            })?;
        info!(path = %path, baud = baud, "Serial link opened");
        Ok(Self {
            port: Some(port),
            path: path.to_string(),
        })
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

impl SerialTransport for RfcommTransport {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
        let Some(port) = self.port.as_mut() else {
            return Err(TransportError::Disconnected);
        };
        match port.read(buf) {
            Ok(n) => Ok(n),
            Err(e) if e.kind() == ErrorKind::TimedOut => Ok(0),
            Err(e) if e.kind() == ErrorKind::BrokenPipe => {
                debug!(error = %e, "Serial link dropped");
                self.port = None;
                Err(TransportError::Disconnected)
            }
            Err(e) => Err(TransportError::ReadFailed(e.to_string())),
        }
    }

    fn write(&mut self, data: &[u8]) -> Result<(), TransportError> {
        let Some(port) = self.port.as_mut() else {
            return Err(TransportError::Disconnected);
        };
        match port.write_all(data) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::BrokenPipe => {
                debug!(error = %e, "Serial link dropped");
                self.port = None;
                Err(TransportError::Disconnected)
            }
            Err(e) => Err(TransportError::WriteFailed(e.to_string())),
        }
    }

    fn is_connected(&self) -> bool {
        self.port.is_some()
    }

    fn disconnect(&mut self) {
        if self.port.take().is_some() {
            info!(path = %self.path, "Serial link closed");
        }
    }
}
