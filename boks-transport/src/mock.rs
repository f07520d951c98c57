//! Scripted in-memory transport
//!
//! Replays a queue of canned reads and records every byte written, so tests
//! can drive the protocol engine without hardware and assert on the exact
//! wire traffic.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::error::TransportError;
use crate::types::TransportDeviceInfo;
use crate::Transport;

#[derive(Debug, Default)]
struct WireState {
    written: Vec<u8>,
    timeouts: Vec<Option<Duration>>,
    reads: usize,
    closed: bool,
}

/// Shared view of the traffic a `ScriptedTransport` has seen
///
/// Cloning is cheap; clones observe the same transport.
#[derive(Debug, Clone, Default)]
pub struct WireLog(Arc<Mutex<WireState>>);

impl WireLog {
    /// Every byte written so far, in order
    pub fn written(&self) -> Vec<u8> {
        self.0.lock().written.clone()
    }

    /// Forget the bytes written so far
    pub fn clear_written(&self) {
        self.0.lock().written.clear();
    }

    /// Every read timeout that was set, in order
    pub fn timeout_history(&self) -> Vec<Option<Duration>> {
        self.0.lock().timeouts.clone()
    }

    /// Number of read calls made
    pub fn read_count(&self) -> usize {
        self.0.lock().reads
    }

    /// Whether `close` was called
    pub fn is_closed(&self) -> bool {
        self.0.lock().closed
    }
}

/// Transport that replays scripted reads
pub struct ScriptedTransport {
    reads: VecDeque<Vec<u8>>,
    log: WireLog,
    info: TransportDeviceInfo,
    timeout: Option<Duration>,
}

impl Default for ScriptedTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self {
            reads: VecDeque::new(),
            log: WireLog::default(),
            info: TransportDeviceInfo::memory("scripted"),
            timeout: None,
        }
    }

    /// Queue the bytes returned by one read call
    pub fn with_read(mut self, bytes: &[u8]) -> Self {
        self.reads.push_back(bytes.to_vec());
        self
    }

    /// Queue `count` reads that time out with no data
    pub fn with_empty_reads(mut self, count: usize) -> Self {
        for _ in 0..count {
            self.reads.push_back(Vec::new());
        }
        self
    }

    /// Queue a single-byte reply
    pub fn with_byte(self, value: u8) -> Self {
        self.with_read(&[value])
    }

    /// Queue a 4-byte unsigned long reply
    pub fn with_ulong(self, value: u32) -> Self {
        self.with_read(&crate::protocol::encode_ulong(value))
    }

    /// Handle for inspecting traffic after the transport is moved
    pub fn log(&self) -> WireLog {
        self.log.clone()
    }
}

impl Transport for ScriptedTransport {
    fn write(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        let mut state = self.log.0.lock();
        if state.closed {
            return Err(TransportError::Disconnected);
        }
        state.written.extend_from_slice(bytes);
        Ok(())
    }

    fn read(&mut self, n: usize) -> Result<Vec<u8>, TransportError> {
        {
            let mut state = self.log.0.lock();
            if state.closed {
                return Err(TransportError::Disconnected);
            }
            state.reads += 1;
        }

        let Some(mut chunk) = self.reads.pop_front() else {
            // Script exhausted: behave like a read timeout
            return Ok(Vec::new());
        };
        if chunk.len() > n {
            let rest = chunk.split_off(n);
            self.reads.push_front(rest);
        }
        Ok(chunk)
    }

    fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    fn set_timeout(&mut self, timeout: Option<Duration>) -> Result<(), TransportError> {
        self.log.0.lock().timeouts.push(timeout);
        self.timeout = timeout;
        Ok(())
    }

    fn device_info(&self) -> &TransportDeviceInfo {
        &self.info
    }

    fn close(&mut self) -> Result<(), TransportError> {
        let mut state = self.log.0.lock();
        if state.closed {
            return Err(TransportError::Disconnected);
        }
        state.closed = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reads_replay_in_order() {
        let mut t = ScriptedTransport::new().with_byte(5).with_ulong(1000);
        assert_eq!(t.read(1).unwrap(), vec![5]);
        assert_eq!(t.read_exact(4).unwrap(), crate::protocol::encode_ulong(1000));
        assert!(t.read(1).unwrap().is_empty());
    }

    #[test]
    fn test_short_read_is_error() {
        let mut t = ScriptedTransport::new().with_read(&[1, 2]);
        match t.read_exact(4) {
            Err(TransportError::ShortRead { expected, got }) => {
                assert_eq!(expected, 4);
                assert_eq!(got, 2);
            }
            other => panic!("expected short read, got {other:?}"),
        }
    }

    #[test]
    fn test_oversized_chunk_is_split() {
        let mut t = ScriptedTransport::new().with_read(b"0.1.9dummy");
        assert_eq!(t.read(5).unwrap(), b"0.1.9");
        assert_eq!(t.read(16).unwrap(), b"dummy");
    }

    #[test]
    fn test_log_tracks_writes_and_close() {
        let mut t = ScriptedTransport::new();
        let log = t.log();
        t.write(&[9]).unwrap();
        t.write(&[1, 2, 3, 4]).unwrap();
        assert_eq!(log.written(), vec![9, 1, 2, 3, 4]);

        t.close().unwrap();
        assert!(log.is_closed());
        assert!(matches!(t.write(&[1]), Err(TransportError::Disconnected)));
        assert!(t.close().is_err());
    }
}
