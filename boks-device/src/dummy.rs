//! Keyboard-emulated Boks
//!
//! Behaves like a device without one: buttons are keys "1" .. "8" on a
//! keyed input collaborator, and the timeout is applied by the host.

use boks_transport::ProtocolRevision;
use tracing::{debug, info, info_span, Span};

use crate::buttons::{ButtonId, ButtonSet};
use crate::engine::EngineOptions;
use crate::error::BoksError;
use crate::identity::DeviceIdentity;
use crate::input::KeyInput;
use crate::timeout::Timeout;
use crate::{ButtonEvent, ResponseBox};

/// A Boks emulated with a keyboard
pub struct DummyBoks<K: KeyInput> {
    input: K,
    span: Span,
    revision: ProtocolRevision,
    identity: DeviceIdentity,
    buttons: ButtonSet,
    timeout: Timeout,
    continuous_mode: bool,
}

impl<K: KeyInput> DummyBoks<K> {
    /// Timestamps come from the input collaborator, which owns the host clock
    pub fn new(input: K, options: EngineOptions) -> Result<Self, BoksError> {
        let span = options
            .span
            .clone()
            .unwrap_or_else(|| info_span!("boks", port = "dummy"));
        span.in_scope(|| info!("initializing dummy mode"));

        let mut boks = Self {
            input,
            span,
            revision: options.revision,
            identity: DeviceIdentity::dummy(),
            buttons: ButtonSet::EMPTY,
            timeout: Timeout::Infinite,
            continuous_mode: false,
        };
        boks.set_buttons(options.buttons)?;
        boks.set_timeout(options.timeout)?;
        Ok(boks)
    }

    pub fn current_buttons(&self) -> ButtonSet {
        self.buttons
    }

    pub fn current_timeout(&self) -> Timeout {
        self.timeout
    }

    fn key_names(set: ButtonSet) -> Vec<String> {
        set.iter().map(ButtonId::key_name).collect()
    }

    fn button_for_key(key: &str) -> Result<ButtonId, BoksError> {
        key.parse::<u8>()
            .map_err(|_| BoksError::UnexpectedResponse(format!("key '{key}' is not a button")))
            .and_then(ButtonId::new)
    }

    fn wait(&mut self) -> Result<ButtonEvent, BoksError> {
        let keys = Self::key_names(self.buttons);
        let press = self.input.wait_for_key(&keys, self.timeout.as_duration())?;
        let button = press.key.as_deref().map(Self::button_for_key).transpose()?;
        self.span.in_scope(|| debug!(button = ?button.map(ButtonId::get), "key"));
        Ok(ButtonEvent {
            button,
            timestamp_ms: press.timestamp_ms,
        })
    }
}

impl<K: KeyInput> ResponseBox for DummyBoks<K> {
    fn identify(&mut self) -> Result<&DeviceIdentity, BoksError> {
        Ok(&self.identity)
    }

    fn info(&self) -> &DeviceIdentity {
        &self.identity
    }

    fn revision(&self) -> ProtocolRevision {
        self.revision
    }

    fn get_button_press(&mut self) -> Result<ButtonEvent, BoksError> {
        self.wait()
    }

    /// Keyboards report presses only, so a release is the next key
    fn get_button_release(&mut self) -> Result<ButtonEvent, BoksError> {
        self.wait()
    }

    /// Polls every key without blocking
    fn get_button_state(&mut self) -> Result<ButtonSet, BoksError> {
        let keys = Self::key_names(ButtonSet::full_range(self.revision));
        let press = self.input.poll_key(&keys)?;
        match press.key {
            Some(key) => Ok([Self::button_for_key(&key)?].into_iter().collect()),
            None => Ok(ButtonSet::EMPTY),
        }
    }

    fn get_buttons(&mut self) -> Result<ButtonSet, BoksError> {
        Ok(self.buttons)
    }

    /// `None` selects every key, photodiode included
    ///
    /// An empty set is treated like `None`, so a wait always has keys.
    fn set_buttons(&mut self, buttons: Option<ButtonSet>) -> Result<(), BoksError> {
        let buttons = buttons
            .filter(|set| !set.is_empty())
            .unwrap_or_else(|| ButtonSet::full_range(self.revision));
        buttons.check_revision(self.revision)?;
        self.span
            .in_scope(|| debug!("Setting buttons {:?}", buttons));
        self.buttons = buttons;
        Ok(())
    }

    fn get_timeout(&mut self) -> Result<f64, BoksError> {
        Ok(self.timeout.millis().map_or(0.0, f64::from))
    }

    fn set_timeout(&mut self, timeout: Timeout) -> Result<(), BoksError> {
        self.span
            .in_scope(|| debug!("Setting timeout to {}", timeout));
        timeout.wire_micros()?;
        self.timeout = timeout;
        Ok(())
    }

    fn set_continuous(&mut self, continuous: bool) -> Result<(), BoksError> {
        self.continuous_mode = continuous;
        Ok(())
    }

    fn set_led(&mut self, on: bool) -> Result<(), BoksError> {
        self.span.in_scope(|| debug!("led {}", if on { "on" } else { "off" }));
        Ok(())
    }

    fn button_count(&mut self) -> Result<u8, BoksError> {
        Ok(self.revision.max_button())
    }

    fn get_sid(&mut self) -> Result<String, BoksError> {
        Ok(self.identity.serial_id.clone().unwrap_or_default())
    }

    fn is_dummy(&self) -> bool {
        true
    }

    fn close(self: Box<Self>) -> Result<(), BoksError> {
        self.span.in_scope(|| info!("closed"));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;
    use crate::clock::ManualClock;
    use crate::input::{KeyPress, QueuedKeyInput};

    fn dummy(input: QueuedKeyInput) -> DummyBoks<QueuedKeyInput> {
        DummyBoks::new(input, EngineOptions::default()).unwrap()
    }

    #[test]
    fn test_defaults_to_full_range() {
        let clock = Arc::new(ManualClock::new(0.0));
        let mut boks = dummy(QueuedKeyInput::new(clock));
        assert_eq!(boks.get_buttons().unwrap().ids(), (1..=8).collect::<Vec<u8>>());
        assert_eq!(boks.get_timeout().unwrap(), 0.0);
        assert_eq!(boks.info().model, "dummy.boks");
        assert_eq!(boks.get_sid().unwrap(), "AA0000");
        assert!(boks.is_dummy());
    }

    #[test]
    fn test_press_maps_key_to_button() {
        let clock = Arc::new(ManualClock::new(0.0));
        let input = QueuedKeyInput::new(clock).with_key("3", 120.5);
        let mut boks = dummy(input);
        let event = boks.get_button_press().unwrap();
        assert_eq!(event.button, Some(ButtonId::new(3).unwrap()));
        assert_eq!(event.timestamp_ms, 120.5);
    }

    #[test]
    fn test_timeout_passed_to_input() {
        let clock = Arc::new(ManualClock::new(700.0));
        let input = QueuedKeyInput::new(clock);
        let requested = input.requested_timeouts();
        let mut boks = dummy(input);
        boks.set_timeout(Timeout::Millis(500)).unwrap();
        let event = boks.get_button_press().unwrap();
        assert_eq!(event.button, None);
        assert_eq!(event.timestamp_ms, 700.0);
        assert_eq!(
            requested.lock().as_slice(),
            &[Some(Duration::from_millis(500))]
        );
    }

    #[test]
    fn test_keys_outside_selection_ignored() {
        let clock = Arc::new(ManualClock::new(0.0));
        let input = QueuedKeyInput::new(clock)
            .with_key("5", 10.0)
            .with_key("2", 20.0);
        let mut boks = dummy(input);
        boks.set_buttons(Some(ButtonSet::from_ids([1, 2]).unwrap()))
            .unwrap();
        let event = boks.get_button_press().unwrap();
        assert_eq!(event.button.map(ButtonId::get), Some(2));
    }

    #[test]
    fn test_state_never_blocks() {
        let clock = Arc::new(ManualClock::new(0.0));
        let input = QueuedKeyInput::new(clock).with_key("8", 1.0);
        let requested = input.requested_timeouts();
        let mut boks = dummy(input);
        assert_eq!(boks.get_button_state().unwrap().ids(), vec![8]);
        assert!(boks.get_button_state().unwrap().is_empty());
        assert!(requested
            .lock()
            .iter()
            .all(|t| *t == Some(Duration::ZERO)));
    }

    #[test]
    fn test_legacy_dummy_limits_buttons() {
        let clock = Arc::new(ManualClock::new(0.0));
        let options = EngineOptions {
            revision: ProtocolRevision::Legacy,
            ..Default::default()
        };
        let mut boks = DummyBoks::new(QueuedKeyInput::new(clock), options).unwrap();
        assert_eq!(boks.button_count().unwrap(), 4);
        assert!(boks
            .set_buttons(Some(ButtonSet::from_ids([6]).unwrap()))
            .is_err());
    }

    /// Answers polls only; a blocking wait is an error
    struct PollOnly {
        polls: usize,
    }

    impl KeyInput for PollOnly {
        fn wait_for_key(
            &mut self,
            _keys: &[String],
            _timeout: Option<Duration>,
        ) -> Result<KeyPress, BoksError> {
            Err(BoksError::UnexpectedResponse("blocking wait".to_string()))
        }

        fn poll_key(&mut self, _keys: &[String]) -> Result<KeyPress, BoksError> {
            self.polls += 1;
            Ok(KeyPress {
                key: Some("4".to_string()),
                timestamp_ms: 5.0,
            })
        }
    }

    #[test]
    fn test_state_uses_poll() {
        let mut boks = DummyBoks::new(PollOnly { polls: 0 }, EngineOptions::default()).unwrap();
        assert_eq!(boks.get_button_state().unwrap().ids(), vec![4]);
        assert_eq!(boks.input.polls, 1);
    }

    #[test]
    fn test_empty_selection_listens_to_every_key() {
        let clock = Arc::new(ManualClock::new(0.0));
        let input = QueuedKeyInput::new(clock).with_key("6", 30.0);
        let mut boks = dummy(input);
        boks.set_buttons(Some(ButtonSet::EMPTY)).unwrap();
        assert_eq!(boks.get_buttons().unwrap().ids(), (1..=8).collect::<Vec<u8>>());
        let event = boks.get_button_press().unwrap();
        assert_eq!(event.button.map(ButtonId::get), Some(6));
    }

    #[test]
    fn test_timeout_above_max_rejected() {
        let clock = Arc::new(ManualClock::new(0.0));
        let mut boks = dummy(QueuedKeyInput::new(clock));
        assert!(boks
            .set_timeout(Timeout::Millis(Timeout::MAX_MS + 1))
            .unwrap_err()
            .is_validation());
        assert_eq!(boks.current_timeout(), Timeout::Infinite);
    }
}
