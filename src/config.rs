//! Configuration for boksctl
//!
//! Read from TOML. Every field is optional; a missing default file means
//! an all-default configuration (autodetect, current firmware, infinite
//! timeout).

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use boks_device::{
    BoksError, ButtonSet, DeviceSelection, EngineOptions, IdentifyOptions, OpenOptions,
    ProtocolRevision, Timeout,
};
use boks_transport::protocol::{handshake, BAUD_RATE};
use serde::{Deserialize, Serialize};

/// Complete boksctl configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BoksConfig {
    /// `"autodetect"`, `"dummy"` or a serial port
    pub port: DeviceSelection,
    pub baud_rate: u32,
    /// Firmware protocol: `"legacy"` (4 buttons) or `"current"` (8 buttons)
    pub revision: ProtocolRevision,
    /// Allowed responses, e.g. `"1;2;3"`; empty for the device default
    pub buttons: String,
    /// `"infinite"` or milliseconds
    pub timeout: Timeout,
    /// Host-side serial read timeout; unset blocks
    pub read_timeout_ms: Option<u64>,
    pub identify_attempts: u32,
    pub identify_timeout_ms: u64,
    /// Read the serial id while identifying (current firmware only)
    pub query_serial_id: bool,
}

impl Default for BoksConfig {
    fn default() -> Self {
        Self {
            port: DeviceSelection::Autodetect,
            baud_rate: BAUD_RATE,
            revision: ProtocolRevision::default(),
            buttons: String::new(),
            timeout: Timeout::Infinite,
            read_timeout_ms: None,
            identify_attempts: handshake::MAX_ATTEMPTS,
            identify_timeout_ms: handshake::ATTEMPT_TIMEOUT.as_millis() as u64,
            query_serial_id: false,
        }
    }
}

impl BoksConfig {
    /// Get the default config file path
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("boks")
            .join("boks.toml")
    }

    /// Load config from a file, or return default if not found
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            Self::parse(&content).with_context(|| format!("parsing {}", path.display()))
        } else {
            Ok(Self::default())
        }
    }

    /// Load an explicitly named file (which must exist) or the default one
    pub fn load_or_default(explicit: Option<&Path>) -> anyhow::Result<Self> {
        match explicit {
            Some(path) => {
                anyhow::ensure!(path.exists(), "config file {} not found", path.display());
                Self::load(path)
            }
            None => Self::load(&Self::default_path()),
        }
    }

    pub fn parse(content: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Allowed responses, `None` when unspecified
    pub fn allowed_buttons(&self) -> Result<Option<ButtonSet>, BoksError> {
        let set: ButtonSet = self.buttons.parse()?;
        Ok((!set.is_empty()).then_some(set))
    }

    /// Options for opening the configured device
    pub fn open_options(&self, monitor: bool) -> Result<OpenOptions, BoksError> {
        if self.identify_attempts == 0 {
            return Err(BoksError::Validation(
                "identify_attempts must be at least 1".to_string(),
            ));
        }
        Ok(OpenOptions {
            selection: self.port.clone(),
            baud_rate: self.baud_rate,
            read_timeout: self.read_timeout_ms.map(Duration::from_millis),
            monitor,
            engine: EngineOptions {
                revision: self.revision,
                buttons: self.allowed_buttons()?,
                timeout: self.timeout,
                identify: IdentifyOptions {
                    attempt_timeout: Duration::from_millis(self.identify_timeout_ms),
                    max_attempts: self.identify_attempts,
                    query_serial_id: self.query_serial_id,
                },
                span: None,
            },
        })
    }
}
