//! Protocol constants and wire utilities for Boks communication
//!
//! Every command is a single opcode byte, optionally followed by a small
//! payload. Replies are either a single byte, a 4-byte unsigned integer in
//! host byte order, or a fixed-length ASCII field.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default serial baud rate of the Boks firmware
pub const BAUD_RATE: u32 = 115_200;

/// Reply byte meaning "no button within the response timeout"
pub const BUTTON_TIMEOUT: u8 = 255;

/// Length of the firmware version field returned by IDENTIFY (e.g. "0.1.9")
pub const FIRMWARE_VERSION_LEN: usize = 5;

/// Length of the space-padded model field returned by IDENTIFY
pub const MODEL_LEN: usize = 16;

/// Length of the serial id field returned by GET_SID
pub const SERIAL_ID_LEN: usize = 6;

/// Length of an unsigned long on the wire
pub const ULONG_LEN: usize = 4;

/// Button id reserved for the photodiode channel (current revision only)
pub const PHOTODIODE_BUTTON: u8 = 8;

/// Handshake timing
pub mod handshake {
    use std::time::Duration;

    /// Read timeout for a single IDENTIFY attempt
    pub const ATTEMPT_TIMEOUT: Duration = Duration::from_secs(2);
    /// Consecutive empty IDENTIFY reads before giving up
    pub const MAX_ATTEMPTS: u32 = 5;
}

/// Protocol verbs, independent of the opcode value a revision assigns them
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    Reset,
    Identify,
    WaitPress,
    WaitRelease,
    WaitSleep,
    ButtonState,
    SetT1,
    SetT2,
    SetTimeout,
    SetButtons,
    SetContinuous,
    GetT1,
    GetT2,
    GetTd,
    GetTime,
    GetTimeout,
    GetButtons,
    LedOn,
    LedOff,
    GetButtonCount,
    GetSerialId,
    LinkLed,
}

impl Command {
    /// Human-readable name, as used in traces
    pub fn name(&self) -> &'static str {
        match self {
            Command::Reset => "RESET",
            Command::Identify => "IDENTIFY",
            Command::WaitPress => "WAIT_PRESS",
            Command::WaitRelease => "WAIT_RELEASE",
            Command::WaitSleep => "WAIT_SLEEP",
            Command::ButtonState => "BUTTON_STATE",
            Command::SetT1 => "SET_T1",
            Command::SetT2 => "SET_T2",
            Command::SetTimeout => "SET_TIMEOUT",
            Command::SetButtons => "SET_BUTTONS",
            Command::SetContinuous => "SET_CONTINUOUS",
            Command::GetT1 => "GET_T1",
            Command::GetT2 => "GET_T2",
            Command::GetTd => "GET_TD",
            Command::GetTime => "GET_TIME",
            Command::GetTimeout => "GET_TIMEOUT",
            Command::GetButtons => "GET_BUTTONS",
            Command::LedOn => "LED_ON",
            Command::LedOff => "LED_OFF",
            Command::GetButtonCount => "GET_BTNCNT",
            Command::GetSerialId => "GET_SID",
            Command::LinkLed => "LINK_LED",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Opcodes of the original 4-button firmware
pub mod legacy {
    pub const RESET: u8 = 1;
    pub const IDENTIFY: u8 = 2;
    pub const WAIT_PRESS: u8 = 3;
    pub const WAIT_RELEASE: u8 = 4;
    pub const WAIT_SLEEP: u8 = 5;
    pub const BUTTON_STATE: u8 = 6;
    pub const SET_T1: u8 = 7;
    pub const SET_T2: u8 = 8;
    pub const SET_TIMEOUT: u8 = 9;
    pub const SET_BUTTONS: u8 = 10;
    pub const GET_T1: u8 = 11;
    pub const GET_T2: u8 = 12;
    pub const GET_TD: u8 = 13;
    pub const GET_TIME: u8 = 14;
    pub const GET_TIMEOUT: u8 = 15;
    pub const GET_BUTTONS: u8 = 16;
}

/// Opcodes of the 8-button firmware (photodiode, LED, serial id)
pub mod current {
    pub const RESET: u8 = 1;
    pub const IDENTIFY: u8 = 2;
    pub const WAIT_PRESS: u8 = 3;
    pub const WAIT_RELEASE: u8 = 4;
    pub const WAIT_SLEEP: u8 = 5;
    pub const BUTTON_STATE: u8 = 6;
    pub const SET_T1: u8 = 7;
    pub const SET_T2: u8 = 8;
    pub const SET_TIMEOUT: u8 = 9;
    pub const SET_BUTTONS: u8 = 10;
    pub const SET_CONTINUOUS: u8 = 11;
    pub const GET_T1: u8 = 12;
    pub const GET_T2: u8 = 13;
    pub const GET_TD: u8 = 14;
    pub const GET_TIME: u8 = 15;
    pub const GET_TIMEOUT: u8 = 16;
    pub const GET_BUTTONS: u8 = 17;
    pub const LED_ON: u8 = 18;
    pub const LED_OFF: u8 = 19;
    pub const GET_BTNCNT: u8 = 20;
    pub const GET_SID: u8 = 21;
    pub const LINK_LED: u8 = 22;
}

/// Firmware protocol revision
///
/// There is no capability negotiation on the wire: the revision is a
/// configuration fact chosen by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProtocolRevision {
    /// 4 buttons, opcodes 1-16
    Legacy,
    /// 8 buttons (8 = photodiode), opcodes 1-22
    #[default]
    Current,
}

impl ProtocolRevision {
    /// Number of addressable button ids
    pub fn max_button(&self) -> u8 {
        match self {
            Self::Legacy => 4,
            Self::Current => 8,
        }
    }

    /// Whether this revision has a photodiode channel
    pub fn has_photodiode(&self) -> bool {
        matches!(self, Self::Current)
    }

    /// Opcode for a command, or `None` if this firmware lacks it
    pub fn opcode(&self, command: Command) -> Option<u8> {
        match self {
            Self::Legacy => match command {
                Command::Reset => Some(legacy::RESET),
                Command::Identify => Some(legacy::IDENTIFY),
                Command::WaitPress => Some(legacy::WAIT_PRESS),
                Command::WaitRelease => Some(legacy::WAIT_RELEASE),
                Command::WaitSleep => Some(legacy::WAIT_SLEEP),
                Command::ButtonState => Some(legacy::BUTTON_STATE),
                Command::SetT1 => Some(legacy::SET_T1),
                Command::SetT2 => Some(legacy::SET_T2),
                Command::SetTimeout => Some(legacy::SET_TIMEOUT),
                Command::SetButtons => Some(legacy::SET_BUTTONS),
                Command::GetT1 => Some(legacy::GET_T1),
                Command::GetT2 => Some(legacy::GET_T2),
                Command::GetTd => Some(legacy::GET_TD),
                Command::GetTime => Some(legacy::GET_TIME),
                Command::GetTimeout => Some(legacy::GET_TIMEOUT),
                Command::GetButtons => Some(legacy::GET_BUTTONS),
                Command::SetContinuous
                | Command::LedOn
                | Command::LedOff
                | Command::GetButtonCount
                | Command::GetSerialId
                | Command::LinkLed => None,
            },
            Self::Current => Some(match command {
                Command::Reset => current::RESET,
                Command::Identify => current::IDENTIFY,
                Command::WaitPress => current::WAIT_PRESS,
                Command::WaitRelease => current::WAIT_RELEASE,
                Command::WaitSleep => current::WAIT_SLEEP,
                Command::ButtonState => current::BUTTON_STATE,
                Command::SetT1 => current::SET_T1,
                Command::SetT2 => current::SET_T2,
                Command::SetTimeout => current::SET_TIMEOUT,
                Command::SetButtons => current::SET_BUTTONS,
                Command::SetContinuous => current::SET_CONTINUOUS,
                Command::GetT1 => current::GET_T1,
                Command::GetT2 => current::GET_T2,
                Command::GetTd => current::GET_TD,
                Command::GetTime => current::GET_TIME,
                Command::GetTimeout => current::GET_TIMEOUT,
                Command::GetButtons => current::GET_BUTTONS,
                Command::LedOn => current::LED_ON,
                Command::LedOff => current::LED_OFF,
                Command::GetButtonCount => current::GET_BTNCNT,
                Command::GetSerialId => current::GET_SID,
                Command::LinkLed => current::LINK_LED,
            }),
        }
    }

    /// Reverse lookup used by the monitor middleware
    pub fn command(&self, opcode: u8) -> Option<Command> {
        ALL_COMMANDS
            .iter()
            .copied()
            .find(|c| self.opcode(*c) == Some(opcode))
    }
}

impl fmt::Display for ProtocolRevision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Legacy => f.write_str("legacy"),
            Self::Current => f.write_str("current"),
        }
    }
}

impl FromStr for ProtocolRevision {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "legacy" | "4" | "v1" => Ok(Self::Legacy),
            "current" | "8" | "v2" => Ok(Self::Current),
            other => Err(format!("Unknown protocol revision: {other}")),
        }
    }
}

const ALL_COMMANDS: &[Command] = &[
    Command::Reset,
    Command::Identify,
    Command::WaitPress,
    Command::WaitRelease,
    Command::WaitSleep,
    Command::ButtonState,
    Command::SetT1,
    Command::SetT2,
    Command::SetTimeout,
    Command::SetButtons,
    Command::SetContinuous,
    Command::GetT1,
    Command::GetT2,
    Command::GetTd,
    Command::GetTime,
    Command::GetTimeout,
    Command::GetButtons,
    Command::LedOn,
    Command::LedOff,
    Command::GetButtonCount,
    Command::GetSerialId,
    Command::LinkLed,
];

/// Encode an unsigned long in the byte order the firmware uses
///
/// The AVR firmware and the reference host both use native (little-endian
/// on every supported host) order.
#[inline]
pub fn encode_ulong(value: u32) -> [u8; ULONG_LEN] {
    value.to_ne_bytes()
}

/// Decode an unsigned long read from the device
#[inline]
pub fn decode_ulong(bytes: [u8; ULONG_LEN]) -> u32 {
    u32::from_ne_bytes(bytes)
}

/// Convert a device-side microsecond count to host milliseconds
#[inline]
pub fn micros_to_ms(micros: u32) -> f64 {
    0.001 * micros as f64
}

/// Convert an optional read timeout into a human-readable form for traces
pub fn describe_timeout(timeout: Option<Duration>) -> String {
    match timeout {
        Some(t) => format!("{}ms", t.as_millis()),
        None => "blocking".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_current_opcodes_are_dense() {
        let rev = ProtocolRevision::Current;
        let mut codes: Vec<u8> = ALL_COMMANDS.iter().filter_map(|c| rev.opcode(*c)).collect();
        codes.sort_unstable();
        assert_eq!(codes, (1..=22).collect::<Vec<u8>>());
    }

    #[test]
    fn test_legacy_lacks_newer_commands() {
        let rev = ProtocolRevision::Legacy;
        assert_eq!(rev.opcode(Command::SetContinuous), None);
        assert_eq!(rev.opcode(Command::GetSerialId), None);
        assert_eq!(rev.opcode(Command::LedOn), None);
        assert_eq!(rev.opcode(Command::GetButtons), Some(16));
        assert_eq!(rev.opcode(Command::GetTd), Some(13));
    }

    #[test]
    fn test_shifted_opcodes() {
        // SET_CONTINUOUS was inserted at 11 and pushed the getters up by one
        assert_eq!(ProtocolRevision::Current.opcode(Command::GetTd), Some(14));
        assert_eq!(ProtocolRevision::Legacy.opcode(Command::GetTd), Some(13));
    }

    #[test]
    fn test_reverse_lookup() {
        assert_eq!(
            ProtocolRevision::Current.command(14),
            Some(Command::GetTd)
        );
        assert_eq!(ProtocolRevision::Legacy.command(14), Some(Command::GetTime));
        assert_eq!(ProtocolRevision::Legacy.command(20), None);
    }

    #[test]
    fn test_ulong_codec() {
        let bytes = encode_ulong(500_000);
        assert_eq!(decode_ulong(bytes), 500_000);
        if cfg!(target_endian = "little") {
            assert_eq!(bytes, [0x20, 0xA1, 0x07, 0x00]);
        }
    }

    #[test]
    fn test_revision_from_str() {
        assert_eq!("legacy".parse(), Ok(ProtocolRevision::Legacy));
        assert_eq!("Current".parse(), Ok(ProtocolRevision::Current));
        assert!("v3".parse::<ProtocolRevision>().is_err());
    }

    #[test]
    fn test_micros_to_ms() {
        assert_eq!(micros_to_ms(100_000), 100.0);
        assert_eq!(micros_to_ms(0), 0.0);
    }
}
