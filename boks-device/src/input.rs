//! Keyed input collaborator used by the dummy variant
//!
//! The host environment supplies something keyboard-like that can wait for
//! one of a set of named keys. The dummy Boks maps button ids to key names
//! ("1" .. "8") and delegates to it.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::clock::Clock;
use crate::error::BoksError;

/// Result of waiting for a key
#[derive(Debug, Clone, PartialEq)]
pub struct KeyPress {
    /// Key name, `None` if the wait timed out
    pub key: Option<String>,
    /// Host time of the key (or of the timeout), in milliseconds
    pub timestamp_ms: f64,
}

/// Something that can wait for one of a set of keys
pub trait KeyInput: Send {
    /// Block until one of `keys` is pressed or `timeout` elapses
    ///
    /// `None` waits indefinitely; `Some(Duration::ZERO)` must not block.
    fn wait_for_key(
        &mut self,
        keys: &[String],
        timeout: Option<Duration>,
    ) -> Result<KeyPress, BoksError>;

    /// Non-blocking poll for one of `keys`
    fn poll_key(&mut self, keys: &[String]) -> Result<KeyPress, BoksError> {
        self.wait_for_key(keys, Some(Duration::ZERO))
    }
}

impl<K: KeyInput + ?Sized> KeyInput for Box<K> {
    fn wait_for_key(
        &mut self,
        keys: &[String],
        timeout: Option<Duration>,
    ) -> Result<KeyPress, BoksError> {
        (**self).wait_for_key(keys, timeout)
    }

    fn poll_key(&mut self, keys: &[String]) -> Result<KeyPress, BoksError> {
        (**self).poll_key(keys)
    }
}

/// Key input fed from a queue instead of a keyboard
///
/// Keys not in the requested set are discarded, as a keyboard with a key
/// list would. An empty queue behaves like a timeout and never blocks.
pub struct QueuedKeyInput {
    keys: VecDeque<(String, f64)>,
    clock: Arc<dyn Clock>,
    requested: Arc<Mutex<Vec<Option<Duration>>>>,
}

impl QueuedKeyInput {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            keys: VecDeque::new(),
            clock,
            requested: Arc::default(),
        }
    }

    /// Queue a key press at a host timestamp
    pub fn with_key(mut self, key: &str, timestamp_ms: f64) -> Self {
        self.keys.push_back((key.to_string(), timestamp_ms));
        self
    }

    /// Handle to the timeouts each wait was called with
    pub fn requested_timeouts(&self) -> Arc<Mutex<Vec<Option<Duration>>>> {
        Arc::clone(&self.requested)
    }
}

impl KeyInput for QueuedKeyInput {
    fn wait_for_key(
        &mut self,
        keys: &[String],
        timeout: Option<Duration>,
    ) -> Result<KeyPress, BoksError> {
        self.requested.lock().push(timeout);
        while let Some((key, timestamp_ms)) = self.keys.pop_front() {
            if keys.iter().any(|k| *k == key) {
                return Ok(KeyPress {
                    key: Some(key),
                    timestamp_ms,
                });
            }
        }
        Ok(KeyPress {
            key: None,
            timestamp_ms: self.clock.now_ms(),
        })
    }
}
