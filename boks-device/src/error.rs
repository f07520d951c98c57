//! Boks device error types

use boks_transport::TransportError;
use thiserror::Error;

/// Errors from Boks operations
#[derive(Error, Debug)]
pub enum BoksError {
    /// Transport layer error, including short or empty reads
    #[error("Connection error: {0}")]
    Connection(#[from] TransportError),

    /// Malformed caller input; nothing was written to the device
    #[error("Invalid parameter: {0}")]
    Validation(String),

    /// The requested mode cannot be set up in this environment
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Command not available on the configured protocol revision
    #[error("Not supported: {0}")]
    NotSupported(String),

    /// Device returned a reply that does not decode
    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),
}

impl BoksError {
    /// Whether the caller should reconnect before retrying
    pub fn is_connection(&self) -> bool {
        matches!(self, BoksError::Connection(_))
    }

    /// Whether the error came from input validation
    pub fn is_validation(&self) -> bool {
        matches!(self, BoksError::Validation(_))
    }
}
