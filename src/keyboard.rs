//! Terminal keyboard used as the Boks in dummy mode
//!
//! Digit keys stand in for the buttons. Raw mode is held only while
//! waiting, so ordinary output between waits is unaffected.

use std::io;
use std::sync::Arc;
use std::time::{Duration, Instant};

use boks_device::{BoksError, Clock, KeyInput, KeyPress, TransportError};
use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use crossterm::terminal;
use tracing::{debug, warn};

/// Longest single poll while waiting without a deadline
const POLL_SLICE: Duration = Duration::from_millis(100);

struct RawModeGuard;

impl RawModeGuard {
    fn enable() -> io::Result<Self> {
        terminal::enable_raw_mode()?;
        Ok(Self)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        if let Err(e) = terminal::disable_raw_mode() {
            warn!("Failed to restore terminal: {}", e);
        }
    }
}

fn io_error(e: io::Error) -> BoksError {
    BoksError::Connection(TransportError::Io(e))
}

/// Keyed input read from the controlling terminal
pub struct TerminalKeyInput {
    clock: Arc<dyn Clock>,
}

impl TerminalKeyInput {
    /// Fails when stdin is not a terminal
    pub fn new(clock: Arc<dyn Clock>) -> Result<Self, BoksError> {
        // Probe once so a missing terminal is reported at construction
        RawModeGuard::enable().map_err(|e| {
            BoksError::Configuration(format!("dummy mode needs an interactive terminal: {e}"))
        })?;
        Ok(Self { clock })
    }

    fn key_name(code: KeyCode) -> Option<String> {
        match code {
            KeyCode::Char(c) => Some(c.to_string()),
            KeyCode::Enter => Some("return".to_string()),
            KeyCode::Esc => Some("escape".to_string()),
            _ => None,
        }
    }
}

impl KeyInput for TerminalKeyInput {
    fn wait_for_key(
        &mut self,
        keys: &[String],
        timeout: Option<Duration>,
    ) -> Result<KeyPress, BoksError> {
        let _raw = RawModeGuard::enable().map_err(io_error)?;
        let deadline = timeout.map(|t| Instant::now() + t);

        loop {
            let slice = match deadline {
                Some(deadline) => deadline.saturating_duration_since(Instant::now()),
                None => POLL_SLICE,
            };
            if event::poll(slice).map_err(io_error)? {
                if let Event::Key(key) = event::read().map_err(io_error)? {
                    if key.kind != KeyEventKind::Press {
                        continue;
                    }
                    // Raw mode swallows SIGINT
                    if key.code == KeyCode::Char('c')
                        && key.modifiers.contains(KeyModifiers::CONTROL)
                    {
                        return Err(io_error(io::Error::new(
                            io::ErrorKind::Interrupted,
                            "interrupted",
                        )));
                    }
                    let timestamp_ms = self.clock.now_ms();
                    if let Some(name) = Self::key_name(key.code) {
                        if keys.contains(&name) {
                            debug!("key {}", name);
                            return Ok(KeyPress {
                                key: Some(name),
                                timestamp_ms,
                            });
                        }
                    }
                }
            }
            if deadline.is_some_and(|d| Instant::now() >= d) {
                return Ok(KeyPress {
                    key: None,
                    timestamp_ms: self.clock.now_ms(),
                });
            }
        }
    }
}
