//! Wire protocol constants for the HID bridge dongle.
//!
//! Command bytes and the framing layout are shared with the dongle
//! firmware; the response-code convention is: byte 0 echoes the command
//! being acknowledged, byte 1 carries the response/status code, the
//! remaining bytes are payload.

// ============================================================================
// Framing
// ============================================================================

/// Start-of-frame marker preceding every framed packet.
pub const START_TAG: u8 = 0x55;

/// Info-byte flag: the device must acknowledge this packet.
pub const FLAG_RESPOND: u8 = 0x80;

/// Info-byte flag: the frame body is encrypted.
pub const FLAG_ENCRYPTED: u8 = 0x40;

/// Mask for the sub-block count in the info byte.
pub const SUB_BLOCK_COUNT_MASK: u8 = 0x3F;

/// Frame bodies are padded to a multiple of this size.
pub const SUB_BLOCK: usize = 16;

/// CRC32 prefix length inside the frame body.
pub const CRC_LEN: usize = 4;

/// Largest payload a single frame can carry.
pub const MAX_PAYLOAD: usize = 64;

// ============================================================================
// Commands (Host -> Device)
// ============================================================================

/// Wake the application firmware. Idempotent; echoed back by the device.
pub const CMD_RUN_FW: u8 = 0x04;

/// Query firmware/security metadata.
pub const CMD_FW_INFO: u8 = 0x10;

/// Initialize the HID interface. Carries the auth response when a
/// challenge was issued.
pub const CMD_INIT: u8 = 0x11;

/// Request an authentication challenge.
pub const CMD_INIT_AUTH: u8 = 0x12;

/// Request a HID status report.
pub const CMD_HID_STATUS_REPORT: u8 = 0x20;

// ============================================================================
// Responses (Device -> Host)
// ============================================================================

/// Unsolicited / polled HID status update.
pub const CMD_HID_STATUS: u8 = 0x2F;

/// Distinguished success response code.
pub const RESP_OK: u8 = 0x01;

/// Status parameter signifying the device accepts HID input.
pub const HID_STATUS_READY: u8 = 0x05;

// ============================================================================
// Host-local failure codes
// ============================================================================
// Reported through the listener; chosen outside the response-code space
// the device uses.

/// Handshake deadline expired before init completed.
pub const ERROR_TIMEOUT: u8 = 0xF0;

/// Retry budget exhausted while the device kept reporting status.
pub const ERROR_STALLED: u8 = 0xF1;

// ============================================================================
// FW_INFO frame layout (byte offsets within the decoded frame)
// ============================================================================

pub const FW_INFO_TYPE_OFFSET: usize = 2;
pub const FW_INFO_VERSION_MAJOR_OFFSET: usize = 3;
pub const FW_INFO_VERSION_MINOR_OFFSET: usize = 4;
pub const FW_INFO_HW_VERSION_OFFSET: usize = 5;
pub const FW_INFO_SECURITY_STATUS_OFFSET: usize = 19;
pub const FW_INFO_PASSWORD_FLAG_OFFSET: usize = 20;

/// Minimum length of a valid FW_INFO frame.
pub const FW_INFO_MIN_LEN: usize = 21;

// ============================================================================
// Firmware version gates (flattened major*100 + minor scalar)
// ============================================================================

pub const FW_VERSION_ENCRYPTION: u16 = 91;
pub const FW_VERSION_LOCK: u16 = 96;
pub const FW_VERSION_PIN_CHANGE: u16 = 97;
pub const FW_VERSION_GAMEPAD: u16 = 97;
pub const FW_VERSION_RESTORE_OPTIONS: u16 = 98;
