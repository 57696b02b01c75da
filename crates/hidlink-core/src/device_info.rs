//! Device identity and capability snapshot.
//!
//! Decoded once per successful FW_INFO exchange and kept immutable until
//! the next connection replaces it. Capability checks are thresholds on
//! the flattened firmware version (`major * 100 + minor`) — the version
//! is a decimal scalar, not a (major, minor) pair.

use std::fmt;

use crate::protocol::constants::*;
use crate::protocol::{Frame, FrameError};

/// Read-only snapshot of the dongle's firmware/security metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceInfo {
    firmware_type: u8,
    version_major: u8,
    version_minor: u8,
    hardware_version: u8,
    security_status: u8,
    password_protected: bool,
}

impl DeviceInfo {
    /// Decode a FW_INFO response frame.
    ///
    /// Fails if the frame does not carry `CMD_FW_INFO` or is shorter
    /// than the fixed 21-byte layout.
    pub fn parse(frame: &Frame) -> Result<Self, FrameError> {
        if frame.command() != CMD_FW_INFO {
            return Err(FrameError::UnexpectedCommand {
                command: frame.command(),
            });
        }
        if frame.len() < FW_INFO_MIN_LEN {
            return Err(FrameError::TooShort { len: frame.len() });
        }
        let bytes = frame.as_bytes();
        Ok(Self {
            firmware_type: bytes[FW_INFO_TYPE_OFFSET],
            version_major: bytes[FW_INFO_VERSION_MAJOR_OFFSET],
            version_minor: bytes[FW_INFO_VERSION_MINOR_OFFSET],
            hardware_version: bytes[FW_INFO_HW_VERSION_OFFSET],
            security_status: bytes[FW_INFO_SECURITY_STATUS_OFFSET],
            password_protected: bytes[FW_INFO_PASSWORD_FLAG_OFFSET] != 0,
        })
    }

    pub fn firmware_type(&self) -> u8 {
        self.firmware_type
    }

    pub fn version_major(&self) -> u8 {
        self.version_major
    }

    pub fn version_minor(&self) -> u8 {
        self.version_minor
    }

    pub fn hardware_version(&self) -> u8 {
        self.hardware_version
    }

    pub fn security_status(&self) -> u8 {
        self.security_status
    }

    pub fn password_protected(&self) -> bool {
        self.password_protected
    }

    /// Flattened decimal firmware version: `major * 100 + minor`.
    pub fn firmware_version(&self) -> u16 {
        self.version_major as u16 * 100 + self.version_minor as u16
    }

    /// Whether the current session passed authentication.
    pub fn is_authenticated(&self) -> bool {
        self.security_status & 0x10 != 0
    }

    /// Whether the device is unlocked. Firmware below 0.96 has no lock
    /// concept and always reports unlocked.
    pub fn is_unlocked(&self) -> bool {
        if self.firmware_version() < FW_VERSION_LOCK {
            true
        } else {
            self.security_status & 0x08 != 0
        }
    }

    pub fn supports_encryption(&self) -> bool {
        self.firmware_version() >= FW_VERSION_ENCRYPTION
    }

    pub fn supports_pin_change(&self) -> bool {
        self.firmware_version() >= FW_VERSION_PIN_CHANGE
    }

    pub fn supports_gamepad(&self) -> bool {
        self.firmware_version() >= FW_VERSION_GAMEPAD
    }

    pub fn supports_restore_options(&self) -> bool {
        self.firmware_version() >= FW_VERSION_RESTORE_OPTIONS
    }
}

impl fmt::Display for DeviceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "fw {}.{:02} (type {}) hw {} security 0x{:02X}{}",
            self.version_major,
            self.version_minor,
            self.firmware_type,
            self.hardware_version,
            self.security_status,
            if self.password_protected {
                " password-protected"
            } else {
                ""
            }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fw_info_frame(major: u8, minor: u8, security: u8, password: u8) -> Frame {
        let mut bytes = vec![0u8; FW_INFO_MIN_LEN];
        bytes[0] = CMD_FW_INFO;
        bytes[1] = RESP_OK;
        bytes[FW_INFO_TYPE_OFFSET] = 1;
        bytes[FW_INFO_VERSION_MAJOR_OFFSET] = major;
        bytes[FW_INFO_VERSION_MINOR_OFFSET] = minor;
        bytes[FW_INFO_HW_VERSION_OFFSET] = 2;
        bytes[FW_INFO_SECURITY_STATUS_OFFSET] = security;
        bytes[FW_INFO_PASSWORD_FLAG_OFFSET] = password;
        Frame::from_body(bytes).unwrap()
    }

    #[test]
    fn test_parse_is_deterministic() {
        let frame = fw_info_frame(1, 2, 0x18, 1);
        let a = DeviceInfo::parse(&frame).unwrap();
        let b = DeviceInfo::parse(&frame).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.firmware_version(), 102);
        assert_eq!(a.firmware_type(), 1);
        assert_eq!(a.hardware_version(), 2);
        assert!(a.password_protected());
    }

    #[test]
    fn test_short_frame_rejected() {
        let frame = Frame::from_body(vec![CMD_FW_INFO, RESP_OK, 0, 0]).unwrap();
        assert!(DeviceInfo::parse(&frame).is_err());
    }

    #[test]
    fn test_wrong_command_rejected() {
        let mut bytes = vec![0u8; FW_INFO_MIN_LEN];
        bytes[0] = CMD_HID_STATUS;
        let frame = Frame::from_body(bytes).unwrap();
        assert!(DeviceInfo::parse(&frame).is_err());
    }

    #[test]
    fn test_password_flag_nonzero_is_true() {
        let parse = |flag: u8| {
            DeviceInfo::parse(&fw_info_frame(1, 0, 0, flag))
                .unwrap()
                .password_protected()
        };
        assert!(!parse(0x00));
        assert!(parse(0x01));
        assert!(parse(0x7F));
    }

    fn info_at_version(version: u16) -> DeviceInfo {
        let frame = fw_info_frame((version / 100) as u8, (version % 100) as u8, 0, 0);
        DeviceInfo::parse(&frame).unwrap()
    }

    #[test]
    fn test_capability_gates_are_monotonic() {
        let gates: [(u16, fn(&DeviceInfo) -> bool); 4] = [
            (FW_VERSION_ENCRYPTION, DeviceInfo::supports_encryption),
            (FW_VERSION_PIN_CHANGE, DeviceInfo::supports_pin_change),
            (FW_VERSION_GAMEPAD, DeviceInfo::supports_gamepad),
            (
                FW_VERSION_RESTORE_OPTIONS,
                DeviceInfo::supports_restore_options,
            ),
        ];
        for (threshold, gate) in gates {
            for v in 80..threshold {
                assert!(!gate(&info_at_version(v)), "gate open below {threshold} at {v}");
            }
            for v in threshold..=110 {
                assert!(gate(&info_at_version(v)), "gate closed at {v} >= {threshold}");
            }
        }
    }

    #[test]
    fn test_legacy_firmware_is_always_unlocked() {
        for security in [0x00, 0x08, 0xFF] {
            let info = DeviceInfo::parse(&fw_info_frame(0, 95, security, 0)).unwrap();
            assert!(info.is_unlocked());
        }
        let locked = DeviceInfo::parse(&fw_info_frame(0, 96, 0x00, 0)).unwrap();
        assert!(!locked.is_unlocked());
        let unlocked = DeviceInfo::parse(&fw_info_frame(0, 96, 0x08, 0)).unwrap();
        assert!(unlocked.is_unlocked());
    }

    #[test]
    fn test_is_authenticated() {
        let info = DeviceInfo::parse(&fw_info_frame(1, 0, 0x10, 0)).unwrap();
        assert!(info.is_authenticated());
        let info = DeviceInfo::parse(&fw_info_frame(1, 0, 0x08, 0)).unwrap();
        assert!(!info.is_authenticated());
    }
}
