//! Transport abstraction layer for Boks button box communication
//!
//! This crate provides a byte-oriented duplex channel to the device and the
//! protocol tables shared by every layer above it:
//!
//! - Serial (USB-CDC / Arduino UART)
//! - Monitor middleware (traces every opcode and reply)
//! - Scripted in-memory transport for tests

pub mod discovery;
pub mod error;
pub mod mock;
pub mod monitor;
pub mod protocol;
pub mod serial;
pub mod types;

pub use discovery::{default_port, list_ports, resolve_autodetect};
pub use error::TransportError;
pub use mock::{ScriptedTransport, WireLog};
pub use monitor::MonitorTransport;
pub use protocol::{Command, ProtocolRevision};
pub use serial::SerialTransport;
pub use types::{DiscoveredPort, TransportDeviceInfo, TransportType};

use std::time::Duration;

/// The core transport trait - all backends implement this
///
/// A transport is exclusively owned by one protocol engine. Reads never
/// retry: a read that comes back short is reported as-is and escalated by
/// the caller.
pub trait Transport: Send {
    /// Write all bytes to the device
    fn write(&mut self, bytes: &[u8]) -> Result<(), TransportError>;

    /// Read up to `n` bytes, blocking for at most the current read timeout
    ///
    /// Returns fewer than `n` bytes (possibly none) when the timeout elapses
    /// first. With no timeout set, blocks until `n` bytes have arrived.
    fn read(&mut self, n: usize) -> Result<Vec<u8>, TransportError>;

    /// Read exactly `n` bytes; a short or empty read is a connection error
    fn read_exact(&mut self, n: usize) -> Result<Vec<u8>, TransportError> {
        let data = self.read(n)?;
        if data.len() < n {
            return Err(TransportError::ShortRead {
                expected: n,
                got: data.len(),
            });
        }
        Ok(data)
    }

    /// Current read timeout (`None` blocks indefinitely)
    fn timeout(&self) -> Option<Duration>;

    /// Set the read timeout (`None` blocks indefinitely)
    fn set_timeout(&mut self, timeout: Option<Duration>) -> Result<(), TransportError>;

    /// Get connection information
    fn device_info(&self) -> &TransportDeviceInfo;

    /// Close the transport
    fn close(&mut self) -> Result<(), TransportError>;
}

/// Type alias for a boxed transport
pub type BoxedTransport = Box<dyn Transport>;

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn write(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        (**self).write(bytes)
    }

    fn read(&mut self, n: usize) -> Result<Vec<u8>, TransportError> {
        (**self).read(n)
    }

    fn read_exact(&mut self, n: usize) -> Result<Vec<u8>, TransportError> {
        (**self).read_exact(n)
    }

    fn timeout(&self) -> Option<Duration> {
        (**self).timeout()
    }

    fn set_timeout(&mut self, timeout: Option<Duration>) -> Result<(), TransportError> {
        (**self).set_timeout(timeout)
    }

    fn device_info(&self) -> &TransportDeviceInfo {
        (**self).device_info()
    }

    fn close(&mut self) -> Result<(), TransportError> {
        (**self).close()
    }
}
