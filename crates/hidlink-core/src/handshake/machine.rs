//! The bring-up state machine.
//!
//! Drives a freshly connected dongle through wake → firmware info →
//! (auth) → init → status polling, owning every retry counter and
//! deadline along the way. All entry points run on one serialized
//! execution context; the machine never blocks and never buffers more
//! than the single response it is waiting for.

use std::fmt;
use std::time::Instant;

use tracing::{debug, info, trace, warn};

use crate::crypto::{AesAuthenticator, Authenticator};
use crate::device_info::DeviceInfo;
use crate::events::HandshakeListener;
use crate::protocol::constants::*;
use crate::protocol::{Frame, Packet};
use crate::transport::TransportError;

use super::policy::{AuthPolicy, RetryPolicy, StallBehavior};
use super::timer::Deadline;
use super::{HandshakeError, PacketSink};

/// Where the handshake currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HandshakeState {
    /// No connection, or inert after a disconnect.
    #[default]
    Idle,
    /// Wake command sent, waiting for its echo.
    AwaitingFirmwareRunAck,
    /// Firmware info requested.
    AwaitingFirmwareInfo,
    /// Auth challenge requested. Unreachable without a shared key.
    AwaitingAuthResponse,
    /// Init command sent, waiting for the response code.
    AwaitingInitAck,
    /// Init done; tracking status updates.
    Polling,
    /// Terminal failure reported for this connection.
    Failed,
}

impl fmt::Display for HandshakeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandshakeState::Idle => write!(f, "IDLE"),
            HandshakeState::AwaitingFirmwareRunAck => write!(f, "AWAIT_RUN_ACK"),
            HandshakeState::AwaitingFirmwareInfo => write!(f, "AWAIT_FW_INFO"),
            HandshakeState::AwaitingAuthResponse => write!(f, "AWAIT_AUTH"),
            HandshakeState::AwaitingInitAck => write!(f, "AWAIT_INIT_ACK"),
            HandshakeState::Polling => write!(f, "POLLING"),
            HandshakeState::Failed => write!(f, "FAILED"),
        }
    }
}

/// Resources the machine borrows while handling one event.
pub struct HandshakeContext<'a, S: PacketSink, L: HandshakeListener> {
    pub sink: &'a mut S,
    pub listener: &'a L,
    pub now: Instant,
}

/// The bring-up state machine. One instance per device association,
/// reset (not recreated) on every connect.
pub struct InitHandshake<A: Authenticator = AesAuthenticator> {
    auth: AuthPolicy,
    authenticator: A,
    policy: RetryPolicy,
    state: HandshakeState,
    init_done: bool,
    last_status_param: u8,
    device_info: Option<DeviceInfo>,
    updates: u32,
    retries: u32,
    epoch: u64,
    inert: bool,
    short_deadline: Option<Deadline>,
    long_deadline: Option<Deadline>,
    failure_code: Option<u8>,
}

impl InitHandshake<AesAuthenticator> {
    pub fn new(auth: AuthPolicy, policy: RetryPolicy) -> Self {
        Self::with_authenticator(auth, policy, AesAuthenticator)
    }
}

impl<A: Authenticator> InitHandshake<A> {
    pub fn with_authenticator(auth: AuthPolicy, policy: RetryPolicy, authenticator: A) -> Self {
        Self {
            auth,
            authenticator,
            policy,
            state: HandshakeState::Idle,
            init_done: false,
            last_status_param: 0,
            device_info: None,
            updates: 0,
            retries: 0,
            epoch: 0,
            inert: true,
            short_deadline: None,
            long_deadline: None,
            failure_code: None,
        }
    }

    pub fn state(&self) -> HandshakeState {
        self.state
    }

    pub fn init_done(&self) -> bool {
        self.init_done
    }

    pub fn device_info(&self) -> Option<&DeviceInfo> {
        self.device_info.as_ref()
    }

    /// The terminal failure, if one was reported this connection.
    pub fn failure(&self) -> Option<HandshakeError> {
        self.failure_code.map(|code| match code {
            ERROR_TIMEOUT => HandshakeError::Timeout,
            ERROR_STALLED => HandshakeError::Stalled,
            code => HandshakeError::DeviceInit(code),
        })
    }

    /// Transport connected: reset per-connection state and start the
    /// sequence. The wake command is idempotent; a device already
    /// running its firmware simply echoes it.
    pub fn on_connected<S: PacketSink, L: HandshakeListener>(
        &mut self,
        ctx: &mut HandshakeContext<'_, S, L>,
    ) -> Result<(), TransportError> {
        self.epoch += 1;
        self.inert = false;
        self.init_done = false;
        self.last_status_param = 0;
        self.device_info = None;
        self.updates = 0;
        self.retries = 0;
        self.failure_code = None;
        if let RetryPolicy::Deadline { short, long } = self.policy {
            self.short_deadline = Some(Deadline::new(ctx.now + short, self.epoch));
            self.long_deadline = Some(Deadline::new(ctx.now + long, self.epoch));
        }
        self.goto_state(HandshakeState::AwaitingFirmwareRunAck);
        self.send(ctx, Packet::new(CMD_RUN_FW))
    }

    /// Transport dropped: go inert. Idempotent; pending deadlines are
    /// suppressed by their epoch even if something still polls them.
    pub fn on_disconnected(&mut self) {
        if !self.inert {
            debug!(state = %self.state, "Disconnected, handshake inert");
        }
        self.inert = true;
        self.goto_state(HandshakeState::Idle);
    }

    /// One decoded frame from the channel. Frames that do not match the
    /// currently awaited response are dropped, never queued.
    pub fn on_frame<S: PacketSink, L: HandshakeListener>(
        &mut self,
        frame: &Frame,
        ctx: &mut HandshakeContext<'_, S, L>,
    ) -> Result<(), TransportError> {
        if self.inert || matches!(self.state, HandshakeState::Idle | HandshakeState::Failed) {
            trace!(?frame, state = %self.state, "Frame ignored");
            return Ok(());
        }

        match frame.command() {
            CMD_RUN_FW if self.state == HandshakeState::AwaitingFirmwareRunAck => {
                self.goto_state(HandshakeState::AwaitingFirmwareInfo);
                self.send(ctx, Packet::new(CMD_FW_INFO))
            }
            CMD_FW_INFO if self.state == HandshakeState::AwaitingFirmwareInfo => {
                match DeviceInfo::parse(frame) {
                    Ok(info) => {
                        info!(device = %info, "Firmware info received");
                        ctx.listener.on_device_info(&info);
                        self.device_info = Some(info);
                        match &self.auth {
                            AuthPolicy::SharedKey(_) => {
                                self.goto_state(HandshakeState::AwaitingAuthResponse);
                                self.send(ctx, Packet::new(CMD_INIT_AUTH))
                            }
                            AuthPolicy::None => {
                                self.goto_state(HandshakeState::AwaitingInitAck);
                                self.send(ctx, Packet::new(CMD_INIT))
                            }
                        }
                    }
                    Err(e) => {
                        // Non-fatal: stay put and let the retry policy
                        // request the info again.
                        debug!(error = %e, "Malformed firmware info frame, dropped");
                        Ok(())
                    }
                }
            }
            CMD_INIT_AUTH if self.state == HandshakeState::AwaitingAuthResponse => {
                // The auth-wait state is only reachable with a key.
                let AuthPolicy::SharedKey(key) = &self.auth else {
                    return Ok(());
                };
                let response = self.authenticator.respond(key, frame.payload());
                self.goto_state(HandshakeState::AwaitingInitAck);
                self.send(ctx, Packet::with_payload(CMD_INIT, 0x01, response))
            }
            CMD_INIT if self.state == HandshakeState::AwaitingInitAck => {
                let code = frame.response_code();
                if code == RESP_OK {
                    self.init_done = true;
                    self.updates = 0;
                    self.retries = 0;
                    self.goto_state(HandshakeState::Polling);
                    self.send(ctx, Packet::new(CMD_HID_STATUS_REPORT))
                } else {
                    warn!(code = %format!("0x{code:02X}"), "Device rejected init");
                    self.fail(code, ctx);
                    Ok(())
                }
            }
            CMD_HID_STATUS => self.on_status(frame.param(), ctx),
            cmd => {
                trace!(
                    cmd = %format!("0x{cmd:02X}"),
                    state = %self.state,
                    "Unexpected frame dropped"
                );
                Ok(())
            }
        }
    }

    /// Check the one-shot deadlines (deadline policy only). Called by
    /// the driving loop between reads; cheap when nothing is armed.
    pub fn poll_deadlines<S: PacketSink, L: HandshakeListener>(
        &mut self,
        ctx: &mut HandshakeContext<'_, S, L>,
    ) -> Result<(), TransportError> {
        if self.inert || self.state == HandshakeState::Failed {
            return Ok(());
        }
        if self.init_done {
            self.short_deadline = None;
            self.long_deadline = None;
            return Ok(());
        }

        if let Some(d) = self.short_deadline {
            if d.is_stale(self.epoch) {
                self.short_deadline = None;
            } else if d.is_due(ctx.now, self.epoch) {
                self.short_deadline = None;
                debug!("Init deadline: re-sending wake command");
                // Restart the sequence so the echo is the awaited frame.
                self.goto_state(HandshakeState::AwaitingFirmwareRunAck);
                self.send(ctx, Packet::new(CMD_RUN_FW))?;
            }
        }
        if let Some(d) = self.long_deadline {
            if d.is_stale(self.epoch) {
                self.long_deadline = None;
            } else if d.is_due(ctx.now, self.epoch) {
                self.long_deadline = None;
                warn!("Init deadline expired, giving up");
                self.fail(ERROR_TIMEOUT, ctx);
            }
        }
        Ok(())
    }

    fn on_status<S: PacketSink, L: HandshakeListener>(
        &mut self,
        param: u8,
        ctx: &mut HandshakeContext<'_, S, L>,
    ) -> Result<(), TransportError> {
        if self.init_done {
            // Edge-triggered: only a changed parameter signals.
            if param != self.last_status_param {
                self.last_status_param = param;
                if param == HID_STATUS_READY {
                    ctx.listener.on_init_ready();
                } else {
                    ctx.listener.on_init_not_ready();
                }
            }
            return Ok(());
        }

        // Device is emitting status without having completed init:
        // stall recovery for the counter policy.
        if let RetryPolicy::Counter {
            update_limit,
            retry_limit,
            stall,
        } = self.policy
        {
            if self.updates == update_limit {
                if self.retries < retry_limit {
                    self.retries += 1;
                    self.updates = 0;
                    debug!(
                        retry = self.retries,
                        limit = retry_limit,
                        "Status updates without init, re-sending wake command"
                    );
                    // Restart the sequence so the echo is the awaited frame.
                    self.goto_state(HandshakeState::AwaitingFirmwareRunAck);
                    return self.send(ctx, Packet::new(CMD_RUN_FW));
                }
                if stall == StallBehavior::Report && self.failure_code.is_none() {
                    warn!("Retry budget exhausted, reporting stall");
                    self.fail(ERROR_STALLED, ctx);
                }
                // Silent variant: budget exhausted, stop re-prompting.
            } else {
                self.updates += 1;
            }
        }
        Ok(())
    }

    fn fail<S: PacketSink, L: HandshakeListener>(
        &mut self,
        code: u8,
        ctx: &mut HandshakeContext<'_, S, L>,
    ) {
        // Terminal failures are reported exactly once per connection.
        if self.failure_code.is_none() {
            self.failure_code = Some(code);
            ctx.listener.on_init_failure(code);
        }
        self.goto_state(HandshakeState::Failed);
    }

    fn goto_state(&mut self, new_state: HandshakeState) {
        if self.state != new_state {
            info!(from = %self.state, to = %new_state, "Handshake transition");
        }
        self.state = new_state;
    }

    fn send<S: PacketSink, L: HandshakeListener>(
        &self,
        ctx: &mut HandshakeContext<'_, S, L>,
        packet: Packet,
    ) -> Result<(), TransportError> {
        trace!(cmd = %format!("0x{:02X}", packet.command()), "TX packet");
        ctx.sink.send(packet)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::recording::{RecordingListener, Signal};
    use std::time::Duration;

    /// Sink capturing every emitted packet.
    #[derive(Default)]
    struct RecordingSink {
        packets: Vec<Packet>,
    }

    impl PacketSink for RecordingSink {
        fn send(&mut self, packet: Packet) -> Result<(), TransportError> {
            self.packets.push(packet);
            Ok(())
        }
    }

    struct Harness {
        machine: InitHandshake,
        sink: RecordingSink,
        listener: RecordingListener,
        now: Instant,
    }

    impl Harness {
        fn new(auth: AuthPolicy, policy: RetryPolicy) -> Self {
            Self {
                machine: InitHandshake::new(auth, policy),
                sink: RecordingSink::default(),
                listener: RecordingListener::new(),
                now: Instant::now(),
            }
        }

        fn connect(&mut self) {
            let mut ctx = HandshakeContext {
                sink: &mut self.sink,
                listener: &self.listener,
                now: self.now,
            };
            self.machine.on_connected(&mut ctx).unwrap();
        }

        fn frame(&mut self, body: Vec<u8>) {
            let frame = Frame::from_body(body).unwrap();
            let mut ctx = HandshakeContext {
                sink: &mut self.sink,
                listener: &self.listener,
                now: self.now,
            };
            self.machine.on_frame(&frame, &mut ctx).unwrap();
        }

        fn advance(&mut self, by: Duration) {
            self.now += by;
            let mut ctx = HandshakeContext {
                sink: &mut self.sink,
                listener: &self.listener,
                now: self.now,
            };
            self.machine.poll_deadlines(&mut ctx).unwrap();
        }

        fn sent_commands(&self) -> Vec<u8> {
            self.sink.packets.iter().map(|p| p.command()).collect()
        }
    }

    fn fw_info_body(major: u8, minor: u8) -> Vec<u8> {
        let mut bytes = vec![0u8; FW_INFO_MIN_LEN];
        bytes[0] = CMD_FW_INFO;
        bytes[1] = RESP_OK;
        bytes[FW_INFO_VERSION_MAJOR_OFFSET] = major;
        bytes[FW_INFO_VERSION_MINOR_OFFSET] = minor;
        bytes
    }

    fn run_to_polling(h: &mut Harness) {
        h.connect();
        h.frame(vec![CMD_RUN_FW, RESP_OK]);
        h.frame(fw_info_body(1, 2));
        h.frame(vec![CMD_INIT, RESP_OK]);
    }

    #[test]
    fn test_connect_resets_and_sends_wake() {
        let mut h = Harness::new(AuthPolicy::None, RetryPolicy::default_counter());
        assert!(!h.machine.init_done());
        h.connect();
        assert!(!h.machine.init_done());
        assert_eq!(h.sent_commands(), vec![CMD_RUN_FW]);
        assert_eq!(h.machine.state(), HandshakeState::AwaitingFirmwareRunAck);
    }

    #[test]
    fn test_scenario_a_full_sequence_no_auth() {
        let mut h = Harness::new(AuthPolicy::None, RetryPolicy::default_counter());
        run_to_polling(&mut h);

        assert!(h.machine.init_done());
        assert_eq!(h.machine.state(), HandshakeState::Polling);
        assert_eq!(
            h.sent_commands(),
            vec![CMD_RUN_FW, CMD_FW_INFO, CMD_INIT, CMD_HID_STATUS_REPORT]
        );
        assert_eq!(h.machine.device_info().unwrap().firmware_version(), 102);

        h.frame(vec![CMD_HID_STATUS, HID_STATUS_READY]);
        assert_eq!(
            h.listener.signals(),
            vec![Signal::Info(102), Signal::Ready]
        );
    }

    #[test]
    fn test_scenario_b_init_rejection_is_terminal() {
        let mut h = Harness::new(AuthPolicy::None, RetryPolicy::default_counter());
        h.connect();
        h.frame(vec![CMD_RUN_FW, RESP_OK]);
        h.frame(fw_info_body(1, 2));
        h.frame(vec![CMD_INIT, 0x02]);

        assert_eq!(h.machine.state(), HandshakeState::Failed);
        assert_eq!(
            h.listener.signals(),
            vec![Signal::Info(102), Signal::Failure(0x02)]
        );
        assert!(matches!(
            h.machine.failure(),
            Some(HandshakeError::DeviceInit(0x02))
        ));

        // No further packets, no repeated failure.
        let sent_before = h.sent_commands();
        h.frame(vec![CMD_INIT, 0x02]);
        h.frame(vec![CMD_HID_STATUS, HID_STATUS_READY]);
        assert_eq!(h.sent_commands(), sent_before);
        assert_eq!(h.listener.signals().len(), 2);
    }

    #[test]
    fn test_scenario_c_auth_step_precedes_init() {
        let key = [0x42u8; 16];
        let mut h = Harness::new(AuthPolicy::SharedKey(key), RetryPolicy::default_counter());
        h.connect();
        h.frame(vec![CMD_RUN_FW, RESP_OK]);
        h.frame(fw_info_body(1, 2));
        assert_eq!(h.machine.state(), HandshakeState::AwaitingAuthResponse);
        assert_eq!(h.sent_commands(), vec![CMD_RUN_FW, CMD_FW_INFO, CMD_INIT_AUTH]);

        let challenge = [0xA5u8; 16];
        let mut body = vec![CMD_INIT_AUTH, RESP_OK];
        body.extend_from_slice(&challenge);
        h.frame(body);

        assert_eq!(h.machine.state(), HandshakeState::AwaitingInitAck);
        let init = h.sink.packets.last().unwrap();
        assert_eq!(init.command(), CMD_INIT);
        let expected = AesAuthenticator.respond(&key, &challenge);
        assert_eq!(init.payload(), expected.as_slice());
        // The raw key must not appear in the emitted packet.
        assert!(!init.serialize().windows(key.len()).any(|w| w == key.as_slice()));

        h.frame(vec![CMD_INIT, RESP_OK]);
        assert!(h.machine.init_done());
    }

    #[test]
    fn test_scenario_d_status_edges() {
        let mut h = Harness::new(AuthPolicy::None, RetryPolicy::default_counter());
        run_to_polling(&mut h);

        h.frame(vec![CMD_HID_STATUS, 0x05]);
        h.frame(vec![CMD_HID_STATUS, 0x03]);
        h.frame(vec![CMD_HID_STATUS, 0x05]);
        assert_eq!(
            h.listener.signals(),
            vec![
                Signal::Info(102),
                Signal::Ready,
                Signal::NotReady,
                Signal::Ready
            ]
        );
    }

    #[test]
    fn test_status_unchanged_does_not_signal() {
        let mut h = Harness::new(AuthPolicy::None, RetryPolicy::default_counter());
        run_to_polling(&mut h);

        h.frame(vec![CMD_HID_STATUS, HID_STATUS_READY]);
        h.frame(vec![CMD_HID_STATUS, HID_STATUS_READY]);
        h.frame(vec![CMD_HID_STATUS, HID_STATUS_READY]);
        let ready_count = h
            .listener
            .signals()
            .iter()
            .filter(|s| **s == Signal::Ready)
            .count();
        assert_eq!(ready_count, 1);
    }

    #[test]
    fn test_malformed_fw_info_is_non_fatal() {
        let mut h = Harness::new(AuthPolicy::None, RetryPolicy::default_counter());
        h.connect();
        h.frame(vec![CMD_RUN_FW, RESP_OK]);
        // Too short for the fixed layout.
        h.frame(vec![CMD_FW_INFO, RESP_OK, 1, 2, 3]);
        assert_eq!(h.machine.state(), HandshakeState::AwaitingFirmwareInfo);
        // A valid frame afterwards still advances.
        h.frame(fw_info_body(0, 99));
        assert_eq!(h.machine.state(), HandshakeState::AwaitingInitAck);
    }

    #[test]
    fn test_unexpected_frames_are_dropped_not_queued() {
        let mut h = Harness::new(AuthPolicy::None, RetryPolicy::default_counter());
        h.connect();
        // INIT ack while still waiting for the wake echo: ignored.
        h.frame(vec![CMD_INIT, RESP_OK]);
        assert!(!h.machine.init_done());
        assert_eq!(h.machine.state(), HandshakeState::AwaitingFirmwareRunAck);
        assert_eq!(h.sent_commands(), vec![CMD_RUN_FW]);
    }

    #[test]
    fn test_counter_stall_retry_and_exhaustion() {
        let policy = RetryPolicy::Counter {
            update_limit: 3,
            retry_limit: 2,
            stall: StallBehavior::Silent,
        };
        let mut h = Harness::new(AuthPolicy::None, policy);
        h.connect();

        // Device keeps reporting status without init completing. Each
        // burst of update_limit + 1 statuses consumes one retry.
        for _ in 0..2 {
            for _ in 0..4 {
                h.frame(vec![CMD_HID_STATUS, 0x00]);
            }
        }
        let wakes = |h: &Harness| {
            h.sent_commands()
                .iter()
                .filter(|c| **c == CMD_RUN_FW)
                .count()
        };
        assert_eq!(wakes(&h), 3); // initial + 2 retries

        // Budget exhausted: no more re-emission, no fabricated failure.
        for _ in 0..20 {
            h.frame(vec![CMD_HID_STATUS, 0x00]);
        }
        assert_eq!(wakes(&h), 3);
        assert!(h.listener.signals().is_empty());
        assert_ne!(h.machine.state(), HandshakeState::Failed);
    }

    #[test]
    fn test_counter_stall_report_variant() {
        let policy = RetryPolicy::Counter {
            update_limit: 2,
            retry_limit: 1,
            stall: StallBehavior::Report,
        };
        let mut h = Harness::new(AuthPolicy::None, policy);
        h.connect();
        for _ in 0..8 {
            h.frame(vec![CMD_HID_STATUS, 0x00]);
        }
        assert_eq!(h.listener.signals(), vec![Signal::Failure(ERROR_STALLED)]);
        assert_eq!(h.machine.state(), HandshakeState::Failed);
        assert!(matches!(h.machine.failure(), Some(HandshakeError::Stalled)));
    }

    #[test]
    fn test_deadline_policy_short_retry_then_timeout() {
        let mut h = Harness::new(AuthPolicy::None, RetryPolicy::default_deadline());
        h.connect();
        assert_eq!(h.sent_commands(), vec![CMD_RUN_FW]);

        h.advance(Duration::from_millis(1100));
        assert_eq!(h.sent_commands(), vec![CMD_RUN_FW, CMD_RUN_FW]);
        assert!(h.listener.signals().is_empty());

        h.advance(Duration::from_millis(1000));
        assert_eq!(h.listener.signals(), vec![Signal::Failure(ERROR_TIMEOUT)]);
        assert_eq!(h.machine.state(), HandshakeState::Failed);
        assert!(matches!(h.machine.failure(), Some(HandshakeError::Timeout)));
    }

    #[test]
    fn test_deadlines_cancelled_by_init_success() {
        let mut h = Harness::new(AuthPolicy::None, RetryPolicy::default_deadline());
        run_to_polling(&mut h);
        let sent = h.sent_commands();

        h.advance(Duration::from_secs(10));
        // No spurious retry or timeout after success.
        assert_eq!(h.sent_commands(), sent);
        assert!(h.listener.signals().iter().all(|s| *s != Signal::Failure(ERROR_TIMEOUT)));
    }

    #[test]
    fn test_disconnect_suppresses_pending_deadlines() {
        let mut h = Harness::new(AuthPolicy::None, RetryPolicy::default_deadline());
        h.connect();
        h.machine.on_disconnected();
        // Deadlines from the dead connection must not fire an effect.
        h.advance(Duration::from_secs(10));
        assert_eq!(h.sent_commands(), vec![CMD_RUN_FW]);
        assert!(h.listener.signals().is_empty());
        // Disconnect is idempotent.
        h.machine.on_disconnected();
    }

    #[test]
    fn test_reconnect_fully_resets() {
        let mut h = Harness::new(AuthPolicy::None, RetryPolicy::default_counter());
        run_to_polling(&mut h);
        h.frame(vec![CMD_HID_STATUS, HID_STATUS_READY]);
        assert!(h.machine.init_done());

        h.machine.on_disconnected();
        assert!(h.machine.device_info().is_some());

        h.connect();
        assert!(!h.machine.init_done());
        assert!(h.machine.device_info().is_none());
        assert_eq!(h.machine.state(), HandshakeState::AwaitingFirmwareRunAck);

        // Status edge baseline is reset: ready fires again after the
        // new connection completes init.
        h.frame(vec![CMD_RUN_FW, RESP_OK]);
        h.frame(fw_info_body(1, 2));
        h.frame(vec![CMD_INIT, RESP_OK]);
        h.frame(vec![CMD_HID_STATUS, HID_STATUS_READY]);
        let ready_count = h
            .listener
            .signals()
            .iter()
            .filter(|s| **s == Signal::Ready)
            .count();
        assert_eq!(ready_count, 2);
    }

    #[test]
    fn test_stall_retry_recovers_a_lost_init_ack() {
        let policy = RetryPolicy::Counter {
            update_limit: 2,
            retry_limit: 3,
            stall: StallBehavior::Silent,
        };
        let mut h = Harness::new(AuthPolicy::None, policy);
        h.connect();
        h.frame(vec![CMD_RUN_FW, RESP_OK]);
        h.frame(fw_info_body(1, 2));
        // The INIT ack never arrives; the device keeps reporting status.
        for _ in 0..3 {
            h.frame(vec![CMD_HID_STATUS, 0x00]);
        }
        // The retry restarted the sequence, so the echo advances it.
        assert_eq!(h.machine.state(), HandshakeState::AwaitingFirmwareRunAck);
        h.frame(vec![CMD_RUN_FW, RESP_OK]);
        h.frame(fw_info_body(1, 2));
        h.frame(vec![CMD_INIT, RESP_OK]);
        assert!(h.machine.init_done());
    }

    #[test]
    fn test_frames_ignored_while_inert() {
        let mut h = Harness::new(AuthPolicy::None, RetryPolicy::default_counter());
        h.connect();
        h.machine.on_disconnected();
        h.frame(vec![CMD_RUN_FW, RESP_OK]);
        assert_eq!(h.sent_commands(), vec![CMD_RUN_FW]);
        assert_eq!(h.machine.state(), HandshakeState::Idle);
    }
}
