//! Common types for transport layer

use serde::Serialize;

/// Transport type identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportType {
    /// USB-CDC / UART serial port
    Serial,
    /// In-memory transport (tests and simulation)
    Memory,
}

/// Connection information for an open transport
#[derive(Debug, Clone, Serialize)]
pub struct TransportDeviceInfo {
    /// Port name or identifier (e.g. `/dev/ttyACM0`, `COM3`)
    pub port: String,
    /// Baud rate, if the transport has one
    pub baud_rate: Option<u32>,
    /// Transport type
    pub transport_type: TransportType,
}

impl TransportDeviceInfo {
    /// Info for an in-memory transport
    pub fn memory(name: &str) -> Self {
        Self {
            port: name.to_string(),
            baud_rate: None,
            transport_type: TransportType::Memory,
        }
    }
}

/// A serial port found during discovery
#[derive(Debug, Clone, Serialize)]
pub struct DiscoveredPort {
    /// Port name as accepted by `SerialTransport::open`
    pub port: String,
    /// USB vendor id, for USB-CDC ports
    pub vid: Option<u16>,
    /// USB product id, for USB-CDC ports
    pub pid: Option<u16>,
    /// USB product string if available
    pub product: Option<String>,
    /// USB serial number if available
    pub serial_number: Option<String>,
}

impl DiscoveredPort {
    /// Check if this port is a USB device
    pub fn is_usb(&self) -> bool {
        self.vid.is_some()
    }
}
