//! One-shot response collection
//!
//! Applies the timeout and allowed buttons, then collects a single press and
//! measures it against the start of the response interval.

use serde::Serialize;

use crate::buttons::{ButtonId, ButtonSet};
use crate::clock::Clock;
use crate::error::BoksError;
use crate::timeout::Timeout;
use crate::ResponseBox;

/// What to collect
#[derive(Debug, Clone, Default)]
pub struct ResponseRequest {
    /// Allowed responses; `None` or an empty set uses the device default
    pub allowed: Option<ButtonSet>,
    pub timeout: Timeout,
    /// Start of the response interval on the host clock; now if unset
    pub start_ms: Option<f64>,
    /// Expected button, if responses are scored
    pub correct: Option<ButtonId>,
}

/// Outcome of a collected response
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResponseRecord {
    /// Button pressed, `None` on timeout
    pub response: Option<ButtonId>,
    pub response_time_ms: f64,
    pub end_time_ms: f64,
    /// Whether the response matched the expected button, when one was given
    pub correct: Option<bool>,
}

impl ResponseRecord {
    pub fn timed_out(&self) -> bool {
        self.response.is_none()
    }
}

/// Collect one button press from `device`
pub fn collect_response(
    device: &mut dyn ResponseBox,
    clock: &dyn Clock,
    request: &ResponseRequest,
) -> Result<ResponseRecord, BoksError> {
    let allowed = request.allowed.filter(|set| !set.is_empty());
    device.set_timeout(request.timeout)?;
    device.set_buttons(allowed)?;

    let start_ms = request.start_ms.unwrap_or_else(|| clock.now_ms());
    let event = device.get_button_press()?;
    Ok(ResponseRecord {
        response: event.button,
        response_time_ms: event.timestamp_ms - start_ms,
        end_time_ms: event.timestamp_ms,
        correct: request.correct.map(|expected| event.button == Some(expected)),
    })
}
