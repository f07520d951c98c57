//! MonitorTransport middleware for tracing transport operations
//!
//! Wraps any Transport implementation and emits a `debug` event for every
//! opcode written and every reply read.
//!
//! # Example
//!
//! ```ignore
//! use boks_transport::{MonitorTransport, ProtocolRevision, SerialTransport};
//!
//! let serial = SerialTransport::open("/dev/ttyACM0", 115_200, None)?;
//! let monitored = MonitorTransport::wrap(Box::new(serial), ProtocolRevision::Current);
//! // Now all commands/replies show up under RUST_LOG=boks_transport=debug
//! ```

use std::time::Duration;

use tracing::debug;

use crate::error::TransportError;
use crate::protocol::{describe_timeout, Command, ProtocolRevision, ULONG_LEN};
use crate::types::TransportDeviceInfo;
use crate::{BoxedTransport, Transport};

/// Transport middleware that traces all traffic
pub struct MonitorTransport {
    inner: BoxedTransport,
    revision: ProtocolRevision,
    /// Payload bytes still owed by the last opcode, so they are not
    /// misread as opcodes when split across writes
    pending_payload: usize,
}

impl MonitorTransport {
    /// Wrap a transport with tracing middleware
    pub fn wrap(transport: BoxedTransport, revision: ProtocolRevision) -> BoxedTransport {
        Box::new(Self::new(transport, revision))
    }

    fn new(inner: BoxedTransport, revision: ProtocolRevision) -> Self {
        Self {
            inner,
            revision,
            pending_payload: 0,
        }
    }

    fn payload_len(command: Command) -> usize {
        match command {
            Command::SetTimeout => ULONG_LEN,
            Command::SetButtons | Command::SetContinuous | Command::LinkLed => 1,
            _ => 0,
        }
    }

    /// Describe one write: each line is a decoded opcode or a run of data
    fn describe_write(&mut self, mut bytes: &[u8]) -> Vec<String> {
        let mut lines = Vec::new();
        while !bytes.is_empty() {
            if self.pending_payload > 0 {
                let take = self.pending_payload.min(bytes.len());
                lines.push(format!("DATA {:02x?}", &bytes[..take]));
                self.pending_payload -= take;
                bytes = &bytes[take..];
                continue;
            }

            let opcode = bytes[0];
            bytes = &bytes[1..];
            match self.revision.command(opcode) {
                Some(command) => {
                    lines.push(format!("CMD  0x{:02x} {}", opcode, command.name()));
                    self.pending_payload = Self::payload_len(command);
                }
                None => lines.push(format!("CMD  0x{:02x} UNKNOWN", opcode)),
            }
        }
        lines
    }

    fn trace_write(&mut self, bytes: &[u8]) {
        for line in self.describe_write(bytes) {
            debug!(">>> {}", line);
        }
    }
}

impl Transport for MonitorTransport {
    fn write(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        self.trace_write(bytes);
        self.inner.write(bytes)
    }

    fn read(&mut self, n: usize) -> Result<Vec<u8>, TransportError> {
        let result = self.inner.read(n);
        match &result {
            Ok(data) if data.is_empty() => debug!("<<< RSP  (none, wanted {})", n),
            Ok(data) => debug!("<<< RSP  {:02x?}", data),
            Err(e) => debug!("<<< ERR  {}", e),
        }
        result
    }

    fn timeout(&self) -> Option<Duration> {
        self.inner.timeout()
    }

    fn set_timeout(&mut self, timeout: Option<Duration>) -> Result<(), TransportError> {
        debug!("--- read timeout {}", describe_timeout(timeout));
        self.inner.set_timeout(timeout)
    }

    fn device_info(&self) -> &TransportDeviceInfo {
        self.inner.device_info()
    }

    fn close(&mut self) -> Result<(), TransportError> {
        debug!("--- close {}", self.inner.device_info().port);
        self.inner.close()
    }
}
