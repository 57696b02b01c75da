//! Mock serial transport for testing.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use super::traits::{SerialTransport, TransportError};

#[derive(Default)]
struct Inner {
    /// Queued inbound chunks, delivered one per read.
    inbound: VecDeque<Vec<u8>>,
    /// Captured writes.
    writes: Vec<Vec<u8>>,
    connected: bool,
    /// When set, the next read reports a disconnect.
    drop_after_drain: bool,
}

/// Mock transport for unit testing the session loop.
///
/// Clones share state, so a test can keep a handle while the session
/// owns the other.
#[derive(Clone)]
pub struct MockTransport {
    inner: Arc<Mutex<Inner>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                connected: true,
                ..Inner::default()
            })),
        }
    }

    /// Queue a chunk to be returned by a future read.
    pub fn queue(&self, bytes: &[u8]) {
        self.inner.lock().unwrap().inbound.push_back(bytes.to_vec());
    }

    /// Report a disconnect once all queued chunks are drained.
    pub fn drop_after_drain(&self) {
        self.inner.lock().unwrap().drop_after_drain = true;
    }

    /// All captured writes, in order.
    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.inner.lock().unwrap().writes.clone()
    }

    /// The captured writes concatenated into one stream.
    pub fn written_stream(&self) -> Vec<u8> {
        self.inner.lock().unwrap().writes.concat()
    }

    /// Simulate the link dropping immediately.
    pub fn sever(&self) {
        self.inner.lock().unwrap().connected = false;
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl SerialTransport for MockTransport {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
        let mut inner = self.inner.lock().unwrap();
        if !inner.connected {
            return Err(TransportError::Disconnected);
        }
        match inner.inbound.pop_front() {
            Some(chunk) => {
                let n = chunk.len().min(buf.len());
                buf[..n].copy_from_slice(&chunk[..n]);
                // Anything the caller's buffer couldn't take goes back
                // to the front of the queue.
                if n < chunk.len() {
                    inner.inbound.push_front(chunk[n..].to_vec());
                }
                Ok(n)
            }
            None => {
                if inner.drop_after_drain {
                    inner.connected = false;
                    return Err(TransportError::Disconnected);
                }
                Ok(0)
            }
        }
    }

    fn write(&mut self, data: &[u8]) -> Result<(), TransportError> {
        let mut inner = self.inner.lock().unwrap();
        if !inner.connected {
            return Err(TransportError::Disconnected);
        }
        inner.writes.push(data.to_vec());
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.inner.lock().unwrap().connected
    }

    fn disconnect(&mut self) {
        self.inner.lock().unwrap().connected = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queue_and_read() {
        let mut mock = MockTransport::new();
        mock.queue(&[1, 2, 3]);
        let mut buf = [0u8; 16];
        assert_eq!(mock.read(&mut buf).unwrap(), 3);
        assert_eq!(&buf[..3], &[1, 2, 3]);
        assert_eq!(mock.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn test_short_buffer_keeps_remainder() {
        let mut mock = MockTransport::new();
        mock.queue(&[1, 2, 3, 4]);
        let mut buf = [0u8; 2];
        assert_eq!(mock.read(&mut buf).unwrap(), 2);
        assert_eq!(mock.read(&mut buf).unwrap(), 2);
        assert_eq!(&buf[..2], &[3, 4]);
    }

    #[test]
    fn test_write_capture() {
        let mut mock = MockTransport::new();
        mock.write(&[0xAA]).unwrap();
        mock.write(&[0xBB, 0xCC]).unwrap();
        assert_eq!(mock.writes().len(), 2);
        assert_eq!(mock.written_stream(), vec![0xAA, 0xBB, 0xCC]);
    }

    #[test]
    fn test_disconnect() {
        let mut mock = MockTransport::new();
        mock.sever();
        assert!(!mock.is_connected());
        assert!(mock.write(&[0]).is_err());
        assert!(matches!(
            mock.read(&mut [0u8; 4]),
            Err(TransportError::Disconnected)
        ));
    }

    #[test]
    fn test_drop_after_drain() {
        let mut mock = MockTransport::new();
        mock.queue(&[1]);
        mock.drop_after_drain();
        let mut buf = [0u8; 4];
        assert_eq!(mock.read(&mut buf).unwrap(), 1);
        assert!(matches!(
            mock.read(&mut buf),
            Err(TransportError::Disconnected)
        ));
    }
}
