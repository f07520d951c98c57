//! Response timeout
//!
//! Millisecond values are scaled to microseconds on the wire
//! (`timeout_ms * 1000`) and sent as an unsigned long; 0 means infinite.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::BoksError;

/// Response timeout for `get_button_press` / `get_button_release`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Timeout {
    /// Wait until a button arrives
    #[default]
    Infinite,
    /// Give up after this many milliseconds (never 0)
    Millis(u32),
}

impl Timeout {
    /// Largest timeout whose microsecond value fits in an unsigned long
    pub const MAX_MS: u32 = u32::MAX / 1000;

    /// Validate a caller-supplied millisecond value
    ///
    /// 0 normalises to `Infinite`, as on the device.
    pub fn from_millis(ms: i64) -> Result<Self, BoksError> {
        if ms < 0 {
            return Err(BoksError::Validation(format!(
                "Expecting a non-negative timeout, got {ms}"
            )));
        }
        if ms == 0 {
            return Ok(Timeout::Infinite);
        }
        match u32::try_from(ms) {
            Ok(ms) if ms <= Self::MAX_MS => Ok(Timeout::Millis(ms)),
            _ => Err(BoksError::Validation(format!(
                "Timeout {ms} ms exceeds the maximum of {} ms",
                Self::MAX_MS
            ))),
        }
    }

    /// `None` (unset) normalises to `Infinite`
    pub fn from_option(ms: Option<i64>) -> Result<Self, BoksError> {
        ms.map_or(Ok(Timeout::Infinite), Self::from_millis)
    }

    /// Value transmitted after SET_TIMEOUT
    ///
    /// Fails for a `Millis` built directly with a value above `MAX_MS`.
    pub fn wire_micros(&self) -> Result<u32, BoksError> {
        match self {
            Timeout::Infinite => Ok(0),
            Timeout::Millis(ms) => ms.checked_mul(1000).ok_or_else(|| {
                BoksError::Validation(format!(
                    "Timeout {ms} ms exceeds the maximum of {} ms",
                    Self::MAX_MS
                ))
            }),
        }
    }

    /// Rebuild from a GET_TIMEOUT reply
    pub fn from_wire_micros(micros: u32) -> Self {
        match micros / 1000 {
            0 => Timeout::Infinite,
            ms => Timeout::Millis(ms),
        }
    }

    pub fn millis(&self) -> Option<u32> {
        match self {
            Timeout::Infinite => None,
            Timeout::Millis(ms) => Some(*ms),
        }
    }

    /// As a blocking duration (`None` = block indefinitely)
    pub fn as_duration(&self) -> Option<Duration> {
        self.millis().map(|ms| Duration::from_millis(u64::from(ms)))
    }

    pub fn is_infinite(&self) -> bool {
        matches!(self, Timeout::Infinite)
    }
}

impl fmt::Display for Timeout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Timeout::Infinite => f.write_str("infinite"),
            Timeout::Millis(ms) => write!(f, "{ms}"),
        }
    }
}

impl FromStr for Timeout {
    type Err = BoksError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        match s.to_lowercase().as_str() {
            "" | "infinite" | "none" => Ok(Timeout::Infinite),
            _ => {
                let ms: i64 = s.parse().map_err(|_| {
                    BoksError::Validation(format!(
                        "'{s}' is not a valid timeout. Expecting a non-negative number or 'infinite'"
                    ))
                })?;
                Self::from_millis(ms)
            }
        }
    }
}

impl Serialize for Timeout {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        match self {
            Timeout::Infinite => s.serialize_str("infinite"),
            Timeout::Millis(ms) => s.serialize_u32(*ms),
        }
    }
}

impl<'de> Deserialize<'de> for Timeout {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum TimeoutRepr {
            Millis(i64),
            Text(String),
        }

        match TimeoutRepr::deserialize(d)? {
            TimeoutRepr::Millis(ms) => Timeout::from_millis(ms).map_err(serde::de::Error::custom),
            TimeoutRepr::Text(text) => text.parse().map_err(serde::de::Error::custom),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_scaling() {
        assert_eq!(Timeout::from_millis(500).unwrap().wire_micros().unwrap(), 500_000);
        assert_eq!(
            Timeout::from_millis(2000).unwrap().wire_micros().unwrap(),
            2_000_000
        );
        assert_eq!(Timeout::Infinite.wire_micros().unwrap(), 0);
    }

    #[test]
    fn test_unvalidated_millis_rejected_on_wire() {
        assert_eq!(
            Timeout::Millis(Timeout::MAX_MS).wire_micros().unwrap(),
            Timeout::MAX_MS * 1000
        );
        let err = Timeout::Millis(Timeout::MAX_MS + 1).wire_micros().unwrap_err();
        assert!(err.is_validation());
        assert!(Timeout::Millis(5_000_000).wire_micros().is_err());
    }

    #[test]
    fn test_zero_and_unset_are_infinite() {
        assert_eq!(Timeout::from_millis(0).unwrap(), Timeout::Infinite);
        assert_eq!(Timeout::from_option(None).unwrap(), Timeout::Infinite);
        assert_eq!(Timeout::from_wire_micros(0), Timeout::Infinite);
    }

    #[test]
    fn test_negative_rejected() {
        assert!(Timeout::from_millis(-1).unwrap_err().is_validation());
        assert!(Timeout::from_option(Some(-5)).is_err());
    }

    #[test]
    fn test_overflow_rejected() {
        assert!(Timeout::from_millis(i64::from(Timeout::MAX_MS)).is_ok());
        assert!(Timeout::from_millis(i64::from(Timeout::MAX_MS) + 1).is_err());
    }

    #[test]
    fn test_parse() {
        assert_eq!("infinite".parse::<Timeout>().unwrap(), Timeout::Infinite);
        assert_eq!("1500".parse::<Timeout>().unwrap(), Timeout::Millis(1500));
        assert!("soon".parse::<Timeout>().is_err());
        assert!("-3".parse::<Timeout>().is_err());
    }

    #[test]
    fn test_duration() {
        assert_eq!(Timeout::Infinite.as_duration(), None);
        assert_eq!(
            Timeout::Millis(250).as_duration(),
            Some(Duration::from_millis(250))
        );
    }
}
