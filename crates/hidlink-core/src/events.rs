//! Listener interface for handshake outcomes.
//!
//! The state machine reports readiness transitions and terminal
//! failures through an injected [`HandshakeListener`] rather than
//! holding references into the application. All callbacks are
//! fire-and-forget and arrive on the handshake's serialized execution
//! context.

use crate::device_info::DeviceInfo;

/// Receives readiness/failure notifications from the handshake.
///
/// Implement this in the application layer. Substituting a recording
/// implementation is the intended way to test code driving the
/// handshake.
pub trait HandshakeListener: Send + Sync {
    /// The device completed initialization and accepts HID input.
    fn on_init_ready(&self);

    /// The device left the ready state (e.g. USB host suspended).
    fn on_init_not_ready(&self);

    /// Initialization failed; `code` is the device response code or one
    /// of the host-local `ERROR_*` codes. Terminal for this connection.
    fn on_init_failure(&self, code: u8);

    /// Firmware metadata became available.
    fn on_device_info(&self, _info: &DeviceInfo) {}
}

/// No-op listener that discards all notifications.
pub struct NullListener;

impl HandshakeListener for NullListener {
    fn on_init_ready(&self) {}
    fn on_init_not_ready(&self) {}
    fn on_init_failure(&self, _code: u8) {}
}

/// Listener that logs notifications using tracing.
pub struct TracingListener;

impl HandshakeListener for TracingListener {
    fn on_init_ready(&self) {
        tracing::info!("Device ready, accepting HID input");
    }

    fn on_init_not_ready(&self) {
        tracing::warn!("Device no longer ready");
    }

    fn on_init_failure(&self, code: u8) {
        tracing::error!(code = %format!("0x{code:02X}"), "Initialization failed");
    }

    fn on_device_info(&self, info: &DeviceInfo) {
        tracing::info!(device = %info, "Firmware info received");
    }
}
