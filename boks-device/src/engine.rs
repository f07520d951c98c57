//! Protocol engine for a Boks attached over a byte transport
//!
//! Every operation is a synchronous request/reply exchange. The engine
//! exclusively owns its transport and takes `&mut self` for every call;
//! interleaved calls would corrupt the reply framing.

use std::sync::Arc;
use std::time::Duration;

use boks_transport::protocol::{
    self, handshake, micros_to_ms, BUTTON_TIMEOUT, FIRMWARE_VERSION_LEN, MODEL_LEN,
    SERIAL_ID_LEN, ULONG_LEN,
};
use boks_transport::{Command, ProtocolRevision, Transport, TransportDeviceInfo, TransportError};
use tracing::{debug, info, info_span, trace, warn, Span};

use crate::buttons::{ButtonId, ButtonSet};
use crate::clock::Clock;
use crate::error::BoksError;
use crate::identity::{decode_ascii, DeviceIdentity};
use crate::timeout::Timeout;
use crate::{ButtonEvent, ResponseBox};

/// Identify handshake settings
#[derive(Debug, Clone)]
pub struct IdentifyOptions {
    /// Read timeout for each IDENTIFY attempt, independent of the response timeout
    pub attempt_timeout: Duration,
    /// Consecutive empty replies tolerated before the handshake fails
    pub max_attempts: u32,
    /// Also read the serial id during the handshake (current revision only)
    pub query_serial_id: bool,
}

impl Default for IdentifyOptions {
    fn default() -> Self {
        Self {
            attempt_timeout: handshake::ATTEMPT_TIMEOUT,
            max_attempts: handshake::MAX_ATTEMPTS,
            query_serial_id: false,
        }
    }
}

/// Settings applied when an engine (or dummy) is constructed
#[derive(Debug, Clone, Default)]
pub struct EngineOptions {
    /// Firmware protocol revision
    pub revision: ProtocolRevision,
    /// Buttons to listen to, `None` for the variant's default set
    pub buttons: Option<ButtonSet>,
    /// Response timeout
    pub timeout: Timeout,
    /// Handshake settings
    pub identify: IdentifyOptions,
    /// Span that all log events are recorded in; a `boks` span is created
    /// when unset
    pub span: Option<Span>,
}

/// A Boks connected through a transport
pub struct Boks<T: Transport> {
    transport: T,
    revision: ProtocolRevision,
    clock: Arc<dyn Clock>,
    span: Span,
    identity: DeviceIdentity,
    identify_options: IdentifyOptions,
    current_buttons: ButtonSet,
    current_timeout: Timeout,
    continuous_mode: bool,
}

impl<T: Transport> Boks<T> {
    /// Identify the device and apply the initial buttons and timeout
    ///
    /// The transport is closed again if any step fails, so the caller never
    /// holds a half-initialised device.
    pub fn connect(
        mut transport: T,
        clock: Arc<dyn Clock>,
        options: EngineOptions,
    ) -> Result<Self, BoksError> {
        let span = options.span.clone().unwrap_or_else(|| {
            info_span!("boks", port = %transport.device_info().port)
        });

        let identity = {
            let _guard = span.enter();
            info!("initializing");
            info!(port = %transport.device_info().port, "port");
            match identify_handshake(&mut transport, options.revision, &options.identify) {
                Ok(identity) => identity,
                Err(e) => {
                    release(&mut transport);
                    return Err(e);
                }
            }
        };

        let mut boks = Self {
            transport,
            revision: options.revision,
            clock,
            span,
            identity,
            identify_options: options.identify,
            current_buttons: ButtonSet::EMPTY,
            current_timeout: Timeout::Infinite,
            continuous_mode: false,
        };

        let setup = boks
            .set_buttons(options.buttons)
            .and_then(|()| boks.set_timeout(options.timeout));
        if let Err(e) = setup {
            let _guard = boks.span.enter();
            release(&mut boks.transport);
            return Err(e);
        }

        boks.span.in_scope(|| info!("ready"));
        Ok(boks)
    }

    /// Protocol revision this engine speaks
    pub fn revision(&self) -> ProtocolRevision {
        self.revision
    }

    /// Buttons most recently sent with SET_BUTTONS
    pub fn current_buttons(&self) -> ButtonSet {
        self.current_buttons
    }

    /// Timeout most recently sent with SET_TIMEOUT
    pub fn current_timeout(&self) -> Timeout {
        self.current_timeout
    }

    pub fn continuous_mode(&self) -> bool {
        self.continuous_mode
    }

    pub fn transport_info(&self) -> &TransportDeviceInfo {
        self.transport.device_info()
    }

    // === Wire helpers ===

    fn opcode(&self, command: Command) -> Result<u8, BoksError> {
        opcode(self.revision, command)
    }

    /// Write an opcode and its payload in one go; the opcode is resolved
    /// before anything is written
    fn send(&mut self, command: Command, payload: &[u8]) -> Result<(), BoksError> {
        let op = self.opcode(command)?;
        let mut buf = Vec::with_capacity(1 + payload.len());
        buf.push(op);
        buf.extend_from_slice(payload);
        self.transport.write(&buf)?;
        Ok(())
    }

    fn read_byte(&mut self) -> Result<u8, BoksError> {
        let data = self.transport.read_exact(1)?;
        Ok(data[0])
    }

    fn read_ulong(&mut self) -> Result<u32, BoksError> {
        let data = self.transport.read_exact(ULONG_LEN)?;
        let mut bytes = [0u8; ULONG_LEN];
        bytes.copy_from_slice(&data[..ULONG_LEN]);
        Ok(protocol::decode_ulong(bytes))
    }

    fn query_byte(&mut self, command: Command) -> Result<u8, BoksError> {
        self.send(command, &[])?;
        self.read_byte()
    }

    fn query_ms(&mut self, command: Command) -> Result<f64, BoksError> {
        self.send(command, &[])?;
        Ok(micros_to_ms(self.read_ulong()?))
    }

    /// Collect a press or release
    ///
    /// The device latches T1, waits, and reports the elapsed delta; the
    /// returned timestamp is the host start time plus that delta.
    fn get_button(&mut self, wait: Command) -> Result<ButtonEvent, BoksError> {
        let set_t1 = self.opcode(Command::SetT1)?;
        let wait_op = self.opcode(wait)?;
        let get_td = self.opcode(Command::GetTd)?;

        let start_time = self.clock.now_ms();
        self.transport.write(&[set_t1])?;
        self.transport.write(&[wait_op])?;
        let reply = self.read_byte()?;
        self.transport.write(&[get_td])?;
        let delta_us = self.read_ulong()?;
        let timestamp_ms = start_time + micros_to_ms(delta_us);

        let button = if reply == BUTTON_TIMEOUT {
            None
        } else {
            Some(ButtonId::new(reply).map_err(|_| {
                BoksError::UnexpectedResponse(format!("button reply {reply} out of range"))
            })?)
        };
        self.span.in_scope(|| {
            debug!(
                command = %wait,
                button = ?button.map(ButtonId::get),
                delta_us,
                "received {}",
                button.map_or("timeout".to_string(), |b| b.to_string())
            )
        });
        Ok(ButtonEvent {
            button,
            timestamp_ms,
        })
    }

    // === Timer marks ===

    /// Reset the device to its power-on state
    pub fn reset(&mut self) -> Result<(), BoksError> {
        self.send(Command::Reset, &[])
    }

    /// Latch timer T1 on the device
    pub fn mark_t1(&mut self) -> Result<(), BoksError> {
        self.send(Command::SetT1, &[])
    }

    /// Latch timer T2 on the device
    pub fn mark_t2(&mut self) -> Result<(), BoksError> {
        self.send(Command::SetT2, &[])
    }

    /// Device time of the last T1 mark, in ms
    pub fn get_t1(&mut self) -> Result<f64, BoksError> {
        self.query_ms(Command::GetT1)
    }

    /// Device time of the last T2 mark, in ms
    pub fn get_t2(&mut self) -> Result<f64, BoksError> {
        self.query_ms(Command::GetT2)
    }

    /// Device time elapsed since the last T1 mark, in ms
    pub fn get_td(&mut self) -> Result<f64, BoksError> {
        self.query_ms(Command::GetTd)
    }

    /// Device clock, in ms. Not comparable with the host clock.
    pub fn device_time(&mut self) -> Result<f64, BoksError> {
        self.query_ms(Command::GetTime)
    }

    /// Switch the link LED on or off
    pub fn set_link_led(&mut self, on: bool) -> Result<(), BoksError> {
        self.send(Command::LinkLed, &[u8::from(on)])
    }

    /// Close the transport
    ///
    /// Consumes the engine, so the channel is released exactly once.
    pub fn close(mut self) -> Result<(), BoksError> {
        let _guard = self.span.enter();
        info!("closing");
        self.transport.close()?;
        info!("closed");
        Ok(())
    }
}

impl<T: Transport> ResponseBox for Boks<T> {
    fn identify(&mut self) -> Result<&DeviceIdentity, BoksError> {
        let identity = {
            let _guard = self.span.enter();
            identify_handshake(&mut self.transport, self.revision, &self.identify_options)?
        };
        if identity.firmware_version != self.identity.firmware_version
            || identity.model != self.identity.model
        {
            return Err(BoksError::UnexpectedResponse(format!(
                "device identity changed from {} {} to {} {}",
                self.identity.model,
                self.identity.firmware_version,
                identity.model,
                identity.firmware_version
            )));
        }
        Ok(&self.identity)
    }

    fn info(&self) -> &DeviceIdentity {
        &self.identity
    }

    fn revision(&self) -> ProtocolRevision {
        self.revision
    }

    fn get_button_press(&mut self) -> Result<ButtonEvent, BoksError> {
        self.get_button(Command::WaitPress)
    }

    fn get_button_release(&mut self) -> Result<ButtonEvent, BoksError> {
        self.get_button(Command::WaitRelease)
    }

    fn get_button_state(&mut self) -> Result<ButtonSet, BoksError> {
        Ok(ButtonSet::from_mask(self.query_byte(Command::ButtonState)?))
    }

    fn get_buttons(&mut self) -> Result<ButtonSet, BoksError> {
        Ok(ButtonSet::from_mask(self.query_byte(Command::GetButtons)?))
    }

    /// `None` selects every push-button, leaving out the photodiode
    fn set_buttons(&mut self, buttons: Option<ButtonSet>) -> Result<(), BoksError> {
        let buttons =
            buttons.unwrap_or_else(|| ButtonSet::all_except_photodiode(self.revision));
        buttons.check_revision(self.revision)?;
        let mask = buttons.mask();
        self.span.in_scope(|| {
            debug!("Setting buttons {:?} with value {:#010b}", buttons, mask)
        });
        self.send(Command::SetButtons, &[mask])?;
        self.current_buttons = buttons;
        Ok(())
    }

    fn get_timeout(&mut self) -> Result<f64, BoksError> {
        self.query_ms(Command::GetTimeout)
    }

    fn set_timeout(&mut self, timeout: Timeout) -> Result<(), BoksError> {
        self.span
            .in_scope(|| debug!("Setting timeout to {}", timeout));
        let micros = timeout.wire_micros()?;
        self.send(Command::SetTimeout, &protocol::encode_ulong(micros))?;
        self.current_timeout = timeout;
        Ok(())
    }

    fn set_continuous(&mut self, continuous: bool) -> Result<(), BoksError> {
        self.send(Command::SetContinuous, &[u8::from(continuous)])?;
        self.continuous_mode = continuous;
        Ok(())
    }

    fn set_led(&mut self, on: bool) -> Result<(), BoksError> {
        let command = if on { Command::LedOn } else { Command::LedOff };
        self.send(command, &[])
    }

    fn button_count(&mut self) -> Result<u8, BoksError> {
        self.query_byte(Command::GetButtonCount)
    }

    fn get_sid(&mut self) -> Result<String, BoksError> {
        self.send(Command::GetSerialId, &[])?;
        read_serial_id(&mut self.transport)
    }

    fn is_dummy(&self) -> bool {
        false
    }

    fn close(self: Box<Self>) -> Result<(), BoksError> {
        Boks::close(*self)
    }
}

fn opcode(revision: ProtocolRevision, command: Command) -> Result<u8, BoksError> {
    revision.opcode(command).ok_or_else(|| {
        BoksError::NotSupported(format!("{command} is not available on {revision} firmware"))
    })
}

fn read_serial_id<T: Transport>(transport: &mut T) -> Result<String, BoksError> {
    let data = transport.read_exact(SERIAL_ID_LEN)?;
    decode_ascii("serial id", &data)
}

/// Run the IDENTIFY exchange under the handshake timeout, then restore the
/// transport's previous read timeout
fn identify_handshake<T: Transport>(
    transport: &mut T,
    revision: ProtocolRevision,
    options: &IdentifyOptions,
) -> Result<DeviceIdentity, BoksError> {
    let identify_op = opcode(revision, Command::Identify)?;
    let sid_op = if options.query_serial_id {
        Some(opcode(revision, Command::GetSerialId)?)
    } else {
        None
    };

    let prior = transport.timeout();
    transport.set_timeout(Some(options.attempt_timeout))?;
    let result = identify_exchange(transport, identify_op, sid_op, options.max_attempts);
    transport.set_timeout(prior)?;
    result
}

fn identify_exchange<T: Transport>(
    transport: &mut T,
    identify_op: u8,
    sid_op: Option<u8>,
    max_attempts: u32,
) -> Result<DeviceIdentity, BoksError> {
    let mut firmware = Vec::new();
    for attempt in 1..=max_attempts {
        transport.write(&[identify_op])?;
        firmware = transport.read(FIRMWARE_VERSION_LEN)?;
        if !firmware.is_empty() {
            break;
        }
        trace!("No reply to IDENTIFY (attempt {}/{})", attempt, max_attempts);
    }
    if firmware.len() < FIRMWARE_VERSION_LEN {
        return Err(TransportError::ShortRead {
            expected: FIRMWARE_VERSION_LEN,
            got: firmware.len(),
        }
        .into());
    }

    let model = transport.read_exact(MODEL_LEN)?;
    let mut identity = DeviceIdentity::from_fields(&firmware, &model)?;
    info!("firmware version: {}", identity.firmware_version);
    info!("model: {}", identity.model);

    if let Some(sid_op) = sid_op {
        transport.write(&[sid_op])?;
        let sid = read_serial_id(transport)?;
        info!("serial id: {}", sid);
        identity.serial_id = Some(sid);
    }
    Ok(identity)
}

/// Close on an error path; the original error is what the caller sees
fn release<T: Transport>(transport: &mut T) {
    if let Err(e) = transport.close() {
        warn!("failed to close transport after error: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use boks_transport::protocol::current;
    use boks_transport::{ScriptedTransport, WireLog};

    const MODEL: &[u8; 16] = b"de.boks         ";

    fn identified() -> ScriptedTransport {
        ScriptedTransport::new().with_read(b"0.1.9").with_read(MODEL)
    }

    fn connect(transport: ScriptedTransport) -> (Boks<ScriptedTransport>, WireLog) {
        let log = transport.log();
        let boks = Boks::connect(
            transport,
            Arc::new(ManualClock::new(1000.0)),
            EngineOptions::default(),
        )
        .unwrap();
        log.clear_written();
        (boks, log)
    }

    #[test]
    fn test_connect_identifies_and_configures() {
        let transport = identified();
        let log = transport.log();
        let boks = Boks::connect(
            transport,
            Arc::new(ManualClock::new(0.0)),
            EngineOptions::default(),
        )
        .unwrap();

        assert_eq!(boks.info().firmware_version, "0.1.9");
        assert_eq!(boks.info().model, "de.boks");
        // IDENTIFY, SET_BUTTONS 0x7F, SET_TIMEOUT 0
        assert_eq!(
            log.written(),
            vec![current::IDENTIFY, current::SET_BUTTONS, 0x7F, current::SET_TIMEOUT, 0, 0, 0, 0]
        );
        assert_eq!(
            boks.current_buttons(),
            ButtonSet::all_except_photodiode(ProtocolRevision::Current)
        );
    }

    #[test]
    fn test_handshake_restores_read_timeout() {
        let transport = identified();
        let log = transport.log();
        let _boks = Boks::connect(
            transport,
            Arc::new(ManualClock::new(0.0)),
            EngineOptions::default(),
        )
        .unwrap();
        assert_eq!(
            log.timeout_history(),
            vec![Some(handshake::ATTEMPT_TIMEOUT), None]
        );
    }

    #[test]
    fn test_handshake_skips_empty_reads() {
        let transport = ScriptedTransport::new()
            .with_empty_reads(3)
            .with_read(b"0.2.0")
            .with_read(MODEL);
        let log = transport.log();
        let boks = Boks::connect(
            transport,
            Arc::new(ManualClock::new(0.0)),
            EngineOptions::default(),
        )
        .unwrap();
        assert_eq!(boks.info().firmware_version, "0.2.0");
        let identifies = log
            .written()
            .iter()
            .filter(|b| **b == current::IDENTIFY)
            .count();
        assert_eq!(identifies, 4);
    }

    #[test]
    fn test_handshake_gives_up_and_closes() {
        let transport = ScriptedTransport::new().with_empty_reads(100);
        let log = transport.log();
        let result = Boks::connect(
            transport,
            Arc::new(ManualClock::new(0.0)),
            EngineOptions::default(),
        );
        let err = result.err().expect("handshake should fail");
        assert!(err.is_connection());
        assert_eq!(log.read_count(), handshake::MAX_ATTEMPTS as usize);
        assert!(log.is_closed());
    }

    #[test]
    fn test_partial_firmware_is_connection_error() {
        let transport = ScriptedTransport::new().with_read(b"0.1");
        let result = Boks::connect(
            transport,
            Arc::new(ManualClock::new(0.0)),
            EngineOptions::default(),
        );
        assert!(result.err().unwrap().is_connection());
    }

    #[test]
    fn test_set_buttons_wire_byte() {
        let (mut boks, log) = connect(identified());
        boks.set_buttons(Some(ButtonSet::from_ids([1, 3]).unwrap()))
            .unwrap();
        assert_eq!(log.written(), vec![current::SET_BUTTONS, 0b0000_0101]);
    }

    #[test]
    fn test_set_buttons_rejects_before_writing() {
        let options = EngineOptions {
            revision: ProtocolRevision::Legacy,
            ..Default::default()
        };
        let transport = identified();
        let log = transport.log();
        let mut boks =
            Boks::connect(transport, Arc::new(ManualClock::new(0.0)), options).unwrap();
        log.clear_written();

        let err = boks
            .set_buttons(Some(ButtonSet::from_ids([5]).unwrap()))
            .unwrap_err();
        assert!(err.is_validation());
        assert!(log.written().is_empty());
    }

    #[test]
    fn test_set_timeout_wire_value() {
        let (mut boks, log) = connect(identified());
        boks.set_timeout(Timeout::from_millis(500).unwrap()).unwrap();
        let mut expected = vec![current::SET_TIMEOUT];
        expected.extend_from_slice(&protocol::encode_ulong(500_000));
        assert_eq!(log.written(), expected);
        assert_eq!(boks.current_timeout(), Timeout::Millis(500));
    }

    #[test]
    fn test_set_timeout_above_max_writes_nothing() {
        let (mut boks, log) = connect(identified());
        let err = boks
            .set_timeout(Timeout::Millis(Timeout::MAX_MS + 1))
            .unwrap_err();
        assert!(err.is_validation());
        assert!(boks.set_timeout(Timeout::Millis(5_000_000)).is_err());
        assert!(log.written().is_empty());
        assert_eq!(boks.current_timeout(), Timeout::Infinite);
    }

    #[test]
    fn test_get_timeout_scales_back() {
        let (mut boks, _log) = connect(identified().with_ulong(2_000_000));
        assert_eq!(boks.get_timeout().unwrap(), 2000.0);
    }

    #[test]
    fn test_button_press_uses_device_delta() {
        let (mut boks, log) = connect(identified().with_byte(2).with_ulong(350_000));
        let event = boks.get_button_press().unwrap();
        assert_eq!(event.button, Some(ButtonId::new(2).unwrap()));
        assert_eq!(event.timestamp_ms, 1000.0 + 350.0);
        assert_eq!(
            log.written(),
            vec![current::SET_T1, current::WAIT_PRESS, current::GET_TD]
        );
    }

    #[test]
    fn test_button_release_timeout_sentinel() {
        let (mut boks, log) = connect(identified().with_byte(BUTTON_TIMEOUT).with_ulong(2_000_000));
        let event = boks.get_button_release().unwrap();
        assert_eq!(event.button, None);
        assert!(event.timestamp_ms >= 1000.0);
        assert_eq!(log.written()[1], current::WAIT_RELEASE);
    }

    #[test]
    fn test_button_press_without_reply_is_connection_error() {
        let (mut boks, _log) = connect(identified());
        assert!(boks.get_button_press().unwrap_err().is_connection());
    }

    #[test]
    fn test_invalid_button_reply() {
        let (mut boks, _log) = connect(identified().with_byte(0).with_ulong(10));
        assert!(matches!(
            boks.get_button_press(),
            Err(BoksError::UnexpectedResponse(_))
        ));
    }

    #[test]
    fn test_button_state_decodes_mask() {
        let (mut boks, log) = connect(identified().with_byte(0b1000_0010));
        let state = boks.get_button_state().unwrap();
        assert_eq!(state.ids(), vec![2, 8]);
        assert_eq!(log.written(), vec![current::BUTTON_STATE]);
    }

    #[test]
    fn test_flags_and_led() {
        let (mut boks, log) = connect(identified());
        boks.set_continuous(true).unwrap();
        boks.set_led(true).unwrap();
        boks.set_led(false).unwrap();
        boks.set_link_led(false).unwrap();
        assert!(boks.continuous_mode());
        assert_eq!(
            log.written(),
            vec![
                current::SET_CONTINUOUS,
                1,
                current::LED_ON,
                current::LED_OFF,
                current::LINK_LED,
                0
            ]
        );
    }

    #[test]
    fn test_legacy_rejects_newer_commands() {
        let options = EngineOptions {
            revision: ProtocolRevision::Legacy,
            ..Default::default()
        };
        let transport = identified();
        let log = transport.log();
        let mut boks =
            Boks::connect(transport, Arc::new(ManualClock::new(0.0)), options).unwrap();
        log.clear_written();

        assert!(matches!(
            boks.set_continuous(true),
            Err(BoksError::NotSupported(_))
        ));
        assert!(matches!(boks.get_sid(), Err(BoksError::NotSupported(_))));
        assert!(log.written().is_empty());
    }

    #[test]
    fn test_count_and_sid() {
        let (mut boks, _log) = connect(identified().with_byte(8).with_read(b"AB1234"));
        assert_eq!(boks.button_count().unwrap(), 8);
        assert_eq!(boks.get_sid().unwrap(), "AB1234");
    }

    #[test]
    fn test_handshake_reads_serial_id_when_asked() {
        let transport = identified().with_read(b"XY0001");
        let options = EngineOptions {
            identify: IdentifyOptions {
                query_serial_id: true,
                ..Default::default()
            },
            ..Default::default()
        };
        let boks = Boks::connect(transport, Arc::new(ManualClock::new(0.0)), options).unwrap();
        assert_eq!(boks.info().serial_id.as_deref(), Some("XY0001"));
    }

    #[test]
    fn test_reidentify_keeps_identity() {
        let (mut boks, _log) = connect(identified().with_read(b"0.1.9").with_read(MODEL));
        let identity = boks.identify().unwrap().clone();
        assert_eq!(identity.model, "de.boks");
    }

    #[test]
    fn test_timer_marks() {
        let (mut boks, log) = connect(identified().with_ulong(1_500).with_ulong(9_000_000));
        boks.mark_t2().unwrap();
        assert_eq!(boks.get_t2().unwrap(), 1.5);
        assert_eq!(boks.device_time().unwrap(), 9000.0);
        assert_eq!(
            log.written(),
            vec![current::SET_T2, current::GET_T2, current::GET_TIME]
        );
    }

    #[test]
    fn test_close_releases_transport() {
        let (boks, log) = connect(identified());
        boks.close().unwrap();
        assert!(log.is_closed());
    }
}
