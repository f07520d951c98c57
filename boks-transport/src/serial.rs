//! Serial transport implementation for USB-CDC / UART connections

use std::io::{ErrorKind, Read, Write};
use std::time::{Duration, Instant};

use serialport::SerialPort;
use tracing::debug;

use crate::error::TransportError;
use crate::protocol::describe_timeout;
use crate::types::{TransportDeviceInfo, TransportType};
use crate::Transport;

/// Poll slice used while blocking without a timeout
const BLOCKING_POLL: Duration = Duration::from_millis(500);

/// Serial transport for a Boks attached as a USB-CDC device
pub struct SerialTransport {
    /// Open port, `None` once closed
    port: Option<Box<dyn SerialPort>>,
    /// Device information
    info: TransportDeviceInfo,
    /// Host-side read timeout (`None` blocks)
    timeout: Option<Duration>,
}

impl SerialTransport {
    /// Open a serial port
    ///
    /// # Arguments
    /// * `port` - Port name (e.g. `/dev/ttyACM0`, `COM3`)
    /// * `baud_rate` - Baud rate, normally `protocol::BAUD_RATE`
    /// * `timeout` - Read timeout, `None` to block until data arrives
    pub fn open(
        port: &str,
        baud_rate: u32,
        timeout: Option<Duration>,
    ) -> Result<Self, TransportError> {
        debug!("Opening serial port {} at {} baud", port, baud_rate);
        let handle = serialport::new(port, baud_rate)
            .timeout(timeout.unwrap_or(BLOCKING_POLL))
            .open()?;

        Ok(Self {
            port: Some(handle),
            info: TransportDeviceInfo {
                port: port.to_string(),
                baud_rate: Some(baud_rate),
                transport_type: TransportType::Serial,
            },
            timeout,
        })
    }

    fn port_mut(&mut self) -> Result<&mut Box<dyn SerialPort>, TransportError> {
        self.port.as_mut().ok_or(TransportError::Disconnected)
    }
}

impl Transport for SerialTransport {
    fn write(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        let port = self.port_mut()?;
        port.write_all(bytes)?;
        port.flush()?;
        Ok(())
    }

    fn read(&mut self, n: usize) -> Result<Vec<u8>, TransportError> {
        let deadline = self.timeout.map(|t| Instant::now() + t);
        let port = self.port_mut()?;
        let mut buf = vec![0u8; n];
        let mut filled = 0;

        while filled < n {
            let slice = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        break;
                    }
                    deadline - now
                }
                None => BLOCKING_POLL,
            };
            port.set_timeout(slice)?;

            match port.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(k) => filled += k,
                Err(e) if e.kind() == ErrorKind::TimedOut => continue,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }

        buf.truncate(filled);
        Ok(buf)
    }

    fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    fn set_timeout(&mut self, timeout: Option<Duration>) -> Result<(), TransportError> {
        debug!("Read timeout: {}", describe_timeout(timeout));
        self.timeout = timeout;
        Ok(())
    }

    fn device_info(&self) -> &TransportDeviceInfo {
        &self.info
    }

    fn close(&mut self) -> Result<(), TransportError> {
        match self.port.take() {
            // Dropping the handle releases the OS file descriptor
            Some(port) => {
                drop(port);
                debug!("Closed serial port {}", self.info.port);
                Ok(())
            }
            None => Err(TransportError::Disconnected),
        }
    }
}

impl Drop for SerialTransport {
    fn drop(&mut self) {
        if self.port.is_some() {
            debug!("SerialTransport for {} dropped without close", self.info.port);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_missing_port_fails() {
        let result = SerialTransport::open("/dev/this-port-does-not-exist", 115_200, None);
        assert!(result.is_err());
    }
}
