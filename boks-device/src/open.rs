//! Construction-time device selection
//!
//! The port string chooses between the real engine and the dummy variant
//! once, when the device is opened.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use boks_transport::protocol::BAUD_RATE;
use boks_transport::{resolve_autodetect, BoxedTransport, MonitorTransport, SerialTransport};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::clock::{Clock, MonotonicClock};
use crate::dummy::DummyBoks;
use crate::engine::{Boks, EngineOptions};
use crate::error::BoksError;
use crate::input::KeyInput;
use crate::ResponseBox;

/// Which device to talk to
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum DeviceSelection {
    /// First USB serial port, or the platform default
    #[default]
    Autodetect,
    /// An explicit serial port
    Port(String),
    /// Keyboard emulation
    Dummy,
}

impl FromStr for DeviceSelection {
    type Err = BoksError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        match s.to_lowercase().as_str() {
            "" => Err(BoksError::Validation("Device port is empty".to_string())),
            "autodetect" | "auto" => Ok(DeviceSelection::Autodetect),
            "dummy" => Ok(DeviceSelection::Dummy),
            _ => Ok(DeviceSelection::Port(s.to_string())),
        }
    }
}

impl TryFrom<String> for DeviceSelection {
    type Error = BoksError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<DeviceSelection> for String {
    fn from(selection: DeviceSelection) -> String {
        selection.to_string()
    }
}

impl fmt::Display for DeviceSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceSelection::Autodetect => f.write_str("autodetect"),
            DeviceSelection::Port(port) => f.write_str(port),
            DeviceSelection::Dummy => f.write_str("dummy"),
        }
    }
}

/// Everything needed to open a device
#[derive(Debug, Clone)]
pub struct OpenOptions {
    pub selection: DeviceSelection,
    pub baud_rate: u32,
    /// Host-side serial read timeout, `None` blocks
    pub read_timeout: Option<Duration>,
    /// Wrap the serial port in the tracing monitor
    pub monitor: bool,
    pub engine: EngineOptions,
}

impl Default for OpenOptions {
    fn default() -> Self {
        Self {
            selection: DeviceSelection::default(),
            baud_rate: BAUD_RATE,
            read_timeout: None,
            monitor: false,
            engine: EngineOptions::default(),
        }
    }
}

/// Collaborators supplied by the host environment
pub struct HostEnvironment {
    pub clock: Arc<dyn Clock>,
    /// Keyed input for dummy mode; a host without one cannot run dummy mode
    pub input: Option<Box<dyn KeyInput>>,
}

impl Default for HostEnvironment {
    fn default() -> Self {
        Self {
            clock: Arc::new(MonotonicClock::new()),
            input: None,
        }
    }
}

impl HostEnvironment {
    pub fn with_input(mut self, input: Box<dyn KeyInput>) -> Self {
        self.input = Some(input);
        self
    }
}

/// Open the serial transport for a non-dummy selection
pub fn open_transport(options: &OpenOptions) -> Result<BoxedTransport, BoksError> {
    let port = match &options.selection {
        DeviceSelection::Autodetect => resolve_autodetect(),
        DeviceSelection::Port(port) => port.clone(),
        DeviceSelection::Dummy => {
            return Err(BoksError::Configuration(
                "dummy mode has no transport".to_string(),
            ))
        }
    };
    let serial = SerialTransport::open(&port, options.baud_rate, options.read_timeout)?;
    let transport: BoxedTransport = Box::new(serial);
    Ok(if options.monitor {
        MonitorTransport::wrap(transport, options.engine.revision)
    } else {
        transport
    })
}

/// Open the selected device, identified and configured
pub fn open(
    options: &OpenOptions,
    env: HostEnvironment,
) -> Result<Box<dyn ResponseBox>, BoksError> {
    match options.selection {
        DeviceSelection::Dummy => {
            let input = env.input.ok_or_else(|| {
                BoksError::Configuration(
                    "dummy mode requires a keyboard input source".to_string(),
                )
            })?;
            let boks = DummyBoks::new(input, options.engine.clone())?;
            Ok(Box::new(boks))
        }
        _ => {
            let transport = open_transport(options)?;
            debug!("Opened {}", transport.device_info().port);
            let boks = Boks::connect(transport, env.clock, options.engine.clone())?;
            Ok(Box::new(boks))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::input::QueuedKeyInput;

    #[test]
    fn test_parse_selection() {
        assert_eq!(
            "autodetect".parse::<DeviceSelection>().unwrap(),
            DeviceSelection::Autodetect
        );
        assert_eq!(
            "Dummy".parse::<DeviceSelection>().unwrap(),
            DeviceSelection::Dummy
        );
        assert_eq!(
            "/dev/ttyACM1".parse::<DeviceSelection>().unwrap(),
            DeviceSelection::Port("/dev/ttyACM1".to_string())
        );
        assert!("  ".parse::<DeviceSelection>().is_err());
    }

    #[test]
    fn test_dummy_without_input_is_configuration_error() {
        let options = OpenOptions {
            selection: DeviceSelection::Dummy,
            ..Default::default()
        };
        let result = open(&options, HostEnvironment::default());
        assert!(matches!(result, Err(BoksError::Configuration(_))));
    }

    #[test]
    fn test_dummy_with_input() {
        let clock = Arc::new(ManualClock::new(0.0));
        let options = OpenOptions {
            selection: DeviceSelection::Dummy,
            ..Default::default()
        };
        let env = HostEnvironment {
            clock: clock.clone(),
            input: Some(Box::new(QueuedKeyInput::new(clock))),
        };
        let boks = open(&options, env).unwrap();
        assert!(boks.is_dummy());
        assert_eq!(boks.info().firmware_version, "0.0.0");
        boks.close().unwrap();
    }

    #[test]
    fn test_missing_port_is_connection_error() {
        let options = OpenOptions {
            selection: DeviceSelection::Port("/dev/nonexistent-boks".to_string()),
            ..Default::default()
        };
        let result = open(&options, HostEnvironment::default());
        assert!(result.err().unwrap().is_connection());
    }
}
