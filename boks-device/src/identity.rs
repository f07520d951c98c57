//! Device identity established by the identify handshake

use serde::Serialize;

use crate::error::BoksError;

/// Firmware and model reported by the device
///
/// Obtained once per connection and immutable afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceIdentity {
    /// Firmware version, format X.Y.Z
    pub firmware_version: String,
    /// Short model name, right-trimmed
    pub model: String,
    /// Serial id, when read during the handshake (current revision only)
    pub serial_id: Option<String>,
}

impl DeviceIdentity {
    /// Decode the two fixed-width IDENTIFY fields
    pub fn from_fields(firmware: &[u8], model: &[u8]) -> Result<Self, BoksError> {
        Ok(Self {
            firmware_version: decode_ascii("firmware version", firmware)?,
            model: decode_ascii("model", model)?,
            serial_id: None,
        })
    }

    /// Identity reported by the dummy variant
    pub fn dummy() -> Self {
        Self {
            firmware_version: "0.0.0".to_string(),
            model: "dummy.boks".to_string(),
            serial_id: Some("AA0000".to_string()),
        }
    }
}

/// Decode a fixed-width, space/NUL padded ASCII field
pub(crate) fn decode_ascii(field: &str, bytes: &[u8]) -> Result<String, BoksError> {
    let text = std::str::from_utf8(bytes).map_err(|_| {
        BoksError::UnexpectedResponse(format!("{field} is not valid text: {bytes:02x?}"))
    })?;
    Ok(text
        .trim_end_matches(|c: char| c.is_whitespace() || c == '\0')
        .to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_is_right_trimmed() {
        let id = DeviceIdentity::from_fields(b"0.1.9", b"de.boks.8       ").unwrap();
        assert_eq!(id.firmware_version, "0.1.9");
        assert_eq!(id.model, "de.boks.8");
        assert_eq!(id.serial_id, None);
    }

    #[test]
    fn test_nul_padding_trimmed() {
        let id = DeviceIdentity::from_fields(b"1.0.0", b"boks\0\0\0\0\0\0\0\0\0\0\0\0").unwrap();
        assert_eq!(id.model, "boks");
    }

    #[test]
    fn test_invalid_utf8_rejected() {
        let err = DeviceIdentity::from_fields(&[0xFF, 0xFE, 0, 0, 0], b"x").unwrap_err();
        assert!(matches!(err, BoksError::UnexpectedResponse(_)));
    }
}
