//! In-memory Boks firmware model
//!
//! `SimulatedBoks` is a [`Transport`] that interprets opcodes the way the
//! firmware does: it keeps the selected buttons and the timeout, runs a
//! microsecond device clock, and answers waits from a queue of scheduled
//! button events. Writes are processed synchronously, so every reply is
//! available to the next read.
//!
//! A wait with an infinite timeout and nothing scheduled produces no reply;
//! the read then comes back empty, as a serial read timeout would.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use boks_transport::protocol::{self, BUTTON_TIMEOUT, MODEL_LEN, ULONG_LEN};
use boks_transport::{
    Command, ProtocolRevision, Transport, TransportDeviceInfo, TransportError,
};
use parking_lot::Mutex;
use tracing::trace;

use crate::buttons::ButtonSet;

#[derive(Debug, Clone, Copy)]
struct ScheduledEvent {
    button: u8,
    after_us: u32,
    release: bool,
}

#[derive(Debug)]
struct SimState {
    revision: ProtocolRevision,
    firmware: String,
    model: String,
    serial_id: String,

    buttons: u8,
    timeout_us: u32,
    continuous: bool,
    led: bool,
    link_led: bool,

    now_us: u64,
    t1_us: u64,
    t2_us: u64,
    held: u8,
    events: VecDeque<ScheduledEvent>,
    silent_identifies: usize,

    /// Opcode waiting for its payload, and the bytes received so far
    pending: Option<(Command, Vec<u8>)>,
    output: VecDeque<u8>,
    written: Vec<u8>,
    closed: bool,
}

impl SimState {
    fn new(revision: ProtocolRevision) -> Self {
        Self {
            revision,
            firmware: "0.1.9".to_string(),
            model: "de.boks".to_string(),
            serial_id: "AB1234".to_string(),
            buttons: ButtonSet::all_except_photodiode(revision).mask(),
            timeout_us: 0,
            continuous: false,
            led: false,
            link_led: true,
            now_us: 0,
            t1_us: 0,
            t2_us: 0,
            held: 0,
            events: VecDeque::new(),
            silent_identifies: 0,
            pending: None,
            output: VecDeque::new(),
            written: Vec::new(),
            closed: false,
        }
    }

    fn payload_len(command: Command) -> usize {
        match command {
            Command::SetTimeout => ULONG_LEN,
            Command::SetButtons | Command::SetContinuous | Command::LinkLed => 1,
            _ => 0,
        }
    }

    fn feed(&mut self, byte: u8) {
        self.written.push(byte);

        if let Some((command, mut payload)) = self.pending.take() {
            payload.push(byte);
            if payload.len() == Self::payload_len(command) {
                self.apply(command, &payload);
            } else {
                self.pending = Some((command, payload));
            }
            return;
        }

        let Some(command) = self.revision.command(byte) else {
            trace!("sim: ignoring unknown opcode 0x{:02x}", byte);
            return;
        };
        if Self::payload_len(command) > 0 {
            self.pending = Some((command, Vec::new()));
        } else {
            self.apply(command, &[]);
        }
    }

    fn push_ulong(&mut self, value: u32) {
        self.output.extend(protocol::encode_ulong(value));
    }

    fn push_text(&mut self, text: &str, width: usize) {
        let mut bytes = text.as_bytes().to_vec();
        bytes.resize(width, b' ');
        self.output.extend(bytes);
    }

    fn apply(&mut self, command: Command, payload: &[u8]) {
        match command {
            Command::Reset => {
                self.buttons = ButtonSet::all_except_photodiode(self.revision).mask();
                self.timeout_us = 0;
                self.continuous = false;
                self.led = false;
            }
            Command::Identify => {
                if self.silent_identifies > 0 {
                    self.silent_identifies -= 1;
                } else {
                    let firmware = self.firmware.clone();
                    let model = self.model.clone();
                    self.push_text(&firmware, protocol::FIRMWARE_VERSION_LEN);
                    self.push_text(&model, MODEL_LEN);
                }
            }
            Command::WaitPress => self.wait(false),
            Command::WaitRelease => self.wait(true),
            Command::WaitSleep => {}
            Command::ButtonState => self.output.push_back(self.held),
            Command::SetT1 => self.t1_us = self.now_us,
            Command::SetT2 => self.t2_us = self.now_us,
            Command::SetTimeout => {
                let mut bytes = [0u8; ULONG_LEN];
                bytes.copy_from_slice(payload);
                self.timeout_us = protocol::decode_ulong(bytes);
            }
            Command::SetButtons => self.buttons = payload[0],
            Command::SetContinuous => self.continuous = payload[0] != 0,
            Command::GetT1 => self.push_ulong(self.t1_us as u32),
            Command::GetT2 => self.push_ulong(self.t2_us as u32),
            Command::GetTd => self.push_ulong((self.now_us - self.t1_us) as u32),
            Command::GetTime => self.push_ulong(self.now_us as u32),
            Command::GetTimeout => self.push_ulong(self.timeout_us),
            Command::GetButtons => self.output.push_back(self.buttons),
            Command::LedOn => self.led = true,
            Command::LedOff => self.led = false,
            Command::GetButtonCount => self.output.push_back(self.revision.max_button()),
            Command::GetSerialId => {
                let sid = self.serial_id.clone();
                self.push_text(&sid, protocol::SERIAL_ID_LEN);
            }
            Command::LinkLed => self.link_led = payload[0] != 0,
        }
    }

    fn selected(&self, button: u8) -> bool {
        match button {
            1..=8 => self.buttons & (1 << (button - 1)) != 0,
            // Out-of-range ids are passed through so tests can provoke bad replies
            _ => true,
        }
    }

    fn wait(&mut self, release: bool) {
        while let Some(event) = self.events.front() {
            if event.release == release && self.selected(event.button) {
                break;
            }
            self.events.pop_front();
        }

        let next = self.events.front().copied();
        match next {
            Some(event) if self.timeout_us == 0 || event.after_us <= self.timeout_us => {
                self.events.pop_front();
                self.now_us = self.t1_us + u64::from(event.after_us);
                self.output.push_back(event.button);
            }
            _ if self.timeout_us != 0 => {
                self.now_us = self.t1_us + u64::from(self.timeout_us);
                self.output.push_back(BUTTON_TIMEOUT);
            }
            _ => trace!("sim: waiting forever with nothing scheduled"),
        }
    }
}

/// Shared view of a `SimulatedBoks`, usable after the transport has moved
/// into an engine
#[derive(Debug, Clone)]
pub struct SimHandle(Arc<Mutex<SimState>>);

impl SimHandle {
    /// Schedule a press `after_ms` after the next T1 mark
    pub fn press(&self, button: u8, after_ms: u32) {
        self.schedule(button, after_ms, false);
    }

    /// Schedule a release `after_ms` after the next T1 mark
    pub fn release(&self, button: u8, after_ms: u32) {
        self.schedule(button, after_ms, true);
    }

    fn schedule(&self, button: u8, after_ms: u32, release: bool) {
        self.0.lock().events.push_back(ScheduledEvent {
            button,
            after_us: after_ms.saturating_mul(1000),
            release,
        });
    }

    /// Buttons reported as held down by BUTTON_STATE
    pub fn hold(&self, buttons: ButtonSet) {
        self.0.lock().held = buttons.mask();
    }

    /// Ignore the next `count` IDENTIFY requests
    pub fn ignore_identify(&self, count: usize) {
        self.0.lock().silent_identifies = count;
    }

    /// Advance the device clock
    pub fn advance(&self, ms: u32) {
        self.0.lock().now_us += u64::from(ms) * 1000;
    }

    pub fn buttons(&self) -> ButtonSet {
        ButtonSet::from_mask(self.0.lock().buttons)
    }

    pub fn timeout_us(&self) -> u32 {
        self.0.lock().timeout_us
    }

    pub fn continuous(&self) -> bool {
        self.0.lock().continuous
    }

    pub fn led(&self) -> bool {
        self.0.lock().led
    }

    pub fn link_led(&self) -> bool {
        self.0.lock().link_led
    }

    /// Every byte the host has written
    pub fn written(&self) -> Vec<u8> {
        self.0.lock().written.clone()
    }

    pub fn clear_written(&self) {
        self.0.lock().written.clear();
    }

    pub fn is_closed(&self) -> bool {
        self.0.lock().closed
    }
}

/// Simulated device reachable through the `Transport` trait
pub struct SimulatedBoks {
    state: Arc<Mutex<SimState>>,
    info: TransportDeviceInfo,
    timeout: Option<Duration>,
}

impl SimulatedBoks {
    pub fn new(revision: ProtocolRevision) -> Self {
        Self {
            state: Arc::new(Mutex::new(SimState::new(revision))),
            info: TransportDeviceInfo::memory("simulated"),
            timeout: None,
        }
    }

    /// Report a different firmware version and model
    pub fn with_identity(self, firmware: &str, model: &str) -> Self {
        {
            let mut state = self.state.lock();
            state.firmware = firmware.to_string();
            state.model = model.to_string();
        }
        self
    }

    pub fn handle(&self) -> SimHandle {
        SimHandle(Arc::clone(&self.state))
    }
}

impl Transport for SimulatedBoks {
    fn write(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(TransportError::Disconnected);
        }
        for &byte in bytes {
            state.feed(byte);
        }
        Ok(())
    }

    fn read(&mut self, n: usize) -> Result<Vec<u8>, TransportError> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(TransportError::Disconnected);
        }
        let count = n.min(state.output.len());
        Ok(state.output.drain(..count).collect())
    }

    fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    fn set_timeout(&mut self, timeout: Option<Duration>) -> Result<(), TransportError> {
        self.timeout = timeout;
        Ok(())
    }

    fn device_info(&self) -> &TransportDeviceInfo {
        &self.info
    }

    fn close(&mut self) -> Result<(), TransportError> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(TransportError::Disconnected);
        }
        state.closed = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use boks_transport::protocol::{current, legacy};

    #[test]
    fn test_identify_reply_is_padded() {
        let mut sim = SimulatedBoks::new(ProtocolRevision::Current);
        sim.write(&[current::IDENTIFY]).unwrap();
        assert_eq!(sim.read(5).unwrap(), b"0.1.9");
        assert_eq!(sim.read(16).unwrap(), b"de.boks         ");
    }

    #[test]
    fn test_split_payload_writes() {
        let mut sim = SimulatedBoks::new(ProtocolRevision::Current);
        let handle = sim.handle();
        sim.write(&[current::SET_TIMEOUT]).unwrap();
        sim.write(&protocol::encode_ulong(750_000)).unwrap();
        sim.write(&[current::SET_BUTTONS, 0x03]).unwrap();
        assert_eq!(handle.timeout_us(), 750_000);
        assert_eq!(handle.buttons().ids(), vec![1, 2]);
    }

    #[test]
    fn test_wait_skips_unselected_buttons() {
        let mut sim = SimulatedBoks::new(ProtocolRevision::Current);
        let handle = sim.handle();
        handle.press(8, 10);
        handle.press(3, 40);
        sim.write(&[current::SET_T1, current::WAIT_PRESS]).unwrap();
        assert_eq!(sim.read(1).unwrap(), vec![3]);
        sim.write(&[current::GET_TD]).unwrap();
        assert_eq!(sim.read(4).unwrap(), protocol::encode_ulong(40_000).to_vec());
    }

    #[test]
    fn test_wait_times_out() {
        let mut sim = SimulatedBoks::new(ProtocolRevision::Legacy);
        let handle = sim.handle();
        handle.press(1, 900);
        sim.write(&[legacy::SET_TIMEOUT]).unwrap();
        sim.write(&protocol::encode_ulong(500_000)).unwrap();
        sim.write(&[legacy::SET_T1, legacy::WAIT_PRESS]).unwrap();
        assert_eq!(sim.read(1).unwrap(), vec![BUTTON_TIMEOUT]);
    }

    #[test]
    fn test_closed_sim_rejects_io() {
        let mut sim = SimulatedBoks::new(ProtocolRevision::Current);
        sim.close().unwrap();
        assert!(sim.write(&[current::RESET]).is_err());
        assert!(sim.close().is_err());
    }
}
