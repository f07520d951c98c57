//! Transport error types

use thiserror::Error;

/// Errors that can occur during transport operations
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    /// The transport was already closed
    #[error("Device disconnected")]
    Disconnected,

    /// Fewer bytes arrived than the protocol requires
    #[error("There was an error connecting to the boks: expected {expected} bytes, got {got}")]
    ShortRead { expected: usize, got: usize },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Serial-specific
    #[error("Serial port error: {0}")]
    Serial(String),

    #[error("Serial port permission denied: {0}")]
    PermissionDenied(String),
}

impl From<serialport::Error> for TransportError {
    fn from(e: serialport::Error) -> Self {
        match e.kind() {
            serialport::ErrorKind::NoDevice => TransportError::DeviceNotFound(e.to_string()),
            serialport::ErrorKind::Io(std::io::ErrorKind::PermissionDenied) => {
                TransportError::PermissionDenied(e.to_string())
            }
            _ => TransportError::Serial(e.to_string()),
        }
    }
}

impl TransportError {
    /// Whether this error is a short or empty read
    pub fn is_short_read(&self) -> bool {
        matches!(self, TransportError::ShortRead { .. })
    }
}
