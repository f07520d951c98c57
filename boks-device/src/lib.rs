//! High-level interface for the Boks button box
//!
//! This crate implements the request/reply protocol on top of any transport
//! from `boks-transport`, plus a keyboard-emulated variant for running
//! without hardware. Both are used through the [`ResponseBox`] trait.

pub mod buttons;
pub mod clock;
pub mod dummy;
pub mod engine;
pub mod error;
pub mod identity;
pub mod input;
pub mod open;
pub mod response;
pub mod sim;
pub mod timeout;

pub use buttons::{ButtonId, ButtonSet, MAX_BUTTON_ID};
pub use clock::{Clock, ManualClock, MonotonicClock};
pub use dummy::DummyBoks;
pub use engine::{Boks, EngineOptions, IdentifyOptions};
pub use error::BoksError;
pub use identity::DeviceIdentity;
pub use input::{KeyInput, KeyPress, QueuedKeyInput};
pub use open::{open, open_transport, DeviceSelection, HostEnvironment, OpenOptions};
pub use response::{collect_response, ResponseRecord, ResponseRequest};
pub use sim::{SimHandle, SimulatedBoks};
pub use timeout::Timeout;

// Re-export transport types for convenience
pub use boks_transport::{ProtocolRevision, Transport, TransportError};

use serde::Serialize;

/// A button press or release, or a timeout
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ButtonEvent {
    /// Button that fired, `None` on timeout
    pub button: Option<ButtonId>,
    /// Host time of the event in ms
    pub timestamp_ms: f64,
}

impl ButtonEvent {
    pub fn timed_out(&self) -> bool {
        self.button.is_none()
    }
}

/// Common interface of the real and the keyboard-emulated Boks
///
/// Implementations are constructed fully identified; there is no way to
/// issue commands before the handshake has completed.
pub trait ResponseBox: Send {
    /// Repeat the identify handshake
    ///
    /// The identity is fixed for the lifetime of a connection; a device that
    /// answers differently is reported as an unexpected response.
    fn identify(&mut self) -> Result<&DeviceIdentity, BoksError>;

    /// Identity obtained at connection time
    fn info(&self) -> &DeviceIdentity;

    fn revision(&self) -> ProtocolRevision;

    /// Wait for a press on one of the selected buttons
    fn get_button_press(&mut self) -> Result<ButtonEvent, BoksError>;

    /// Wait for a release on one of the selected buttons
    fn get_button_release(&mut self) -> Result<ButtonEvent, BoksError>;

    /// Buttons currently held down
    fn get_button_state(&mut self) -> Result<ButtonSet, BoksError>;

    /// Buttons currently selected for press/release detection
    fn get_buttons(&mut self) -> Result<ButtonSet, BoksError>;

    /// Select the buttons to listen to, `None` for the default set
    fn set_buttons(&mut self, buttons: Option<ButtonSet>) -> Result<(), BoksError>;

    /// Response timeout in ms, 0 meaning infinite
    fn get_timeout(&mut self) -> Result<f64, BoksError>;

    fn set_timeout(&mut self, timeout: Timeout) -> Result<(), BoksError>;

    fn set_continuous(&mut self, continuous: bool) -> Result<(), BoksError>;

    fn set_led(&mut self, on: bool) -> Result<(), BoksError>;

    /// Number of buttons the device has
    fn button_count(&mut self) -> Result<u8, BoksError>;

    /// Device serial id
    fn get_sid(&mut self) -> Result<String, BoksError>;

    fn is_dummy(&self) -> bool;

    /// Release the underlying channel
    fn close(self: Box<Self>) -> Result<(), BoksError>;
}
