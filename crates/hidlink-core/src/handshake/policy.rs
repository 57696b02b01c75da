//! Retry/authentication policy selection for the handshake.

use std::time::Duration;

use crate::crypto::KEY_LEN;

/// Whether the bring-up sequence must pass an authentication challenge.
///
/// Modeled as a sum type so the auth-wait state is unreachable by
/// construction when no key is configured.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthPolicy {
    /// Device is not password protected; go straight to init.
    None,
    /// Answer the device challenge with this shared key.
    SharedKey([u8; KEY_LEN]),
}

impl AuthPolicy {
    pub fn requires_auth(&self) -> bool {
        matches!(self, AuthPolicy::SharedKey(_))
    }
}

/// What to do when the counter policy runs out of retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StallBehavior {
    /// Stop re-prompting and leave the handshake where it is.
    #[default]
    Silent,
    /// Surface `ERROR_STALLED` through the listener, terminally.
    Report,
}

/// Stall-recovery policy, selected at construction.
///
/// Both variants drive the same state machine; they only differ in how
/// a device that keeps reporting status without ever completing init is
/// nudged back to life.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryPolicy {
    /// Count status updates; after `update_limit` consecutive updates
    /// without init completing, re-emit the wake command, at most
    /// `retry_limit` times.
    Counter {
        update_limit: u32,
        retry_limit: u32,
        stall: StallBehavior,
    },
    /// Two one-shot deadlines armed on connect: `short` re-emits the
    /// wake command, `long` fails the handshake with a timeout.
    Deadline { short: Duration, long: Duration },
}

impl RetryPolicy {
    /// Counter policy with the limits the original firmware tooling
    /// shipped with.
    pub fn default_counter() -> Self {
        RetryPolicy::Counter {
            update_limit: 50,
            retry_limit: 3,
            stall: StallBehavior::Silent,
        }
    }

    /// Deadline policy tuned for a Bluetooth round-trip.
    pub fn default_deadline() -> Self {
        RetryPolicy::Deadline {
            short: Duration::from_millis(1000),
            long: Duration::from_millis(2000),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requires_auth() {
        assert!(!AuthPolicy::None.requires_auth());
        assert!(AuthPolicy::SharedKey([0; KEY_LEN]).requires_auth());
    }

    #[test]
    fn test_default_deadline_ordering() {
        if let RetryPolicy::Deadline { short, long } = RetryPolicy::default_deadline() {
            assert!(short < long);
        } else {
            panic!("expected deadline policy");
        }
    }
}
