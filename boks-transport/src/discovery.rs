//! Serial port discovery for Boks devices

use serialport::SerialPortType;
use tracing::{debug, info};

use crate::error::TransportError;
use crate::types::DiscoveredPort;

/// Port the Boks enumerates as when nothing better is known
pub fn default_port() -> &'static str {
    if cfg!(unix) {
        "/dev/ttyACM0"
    } else {
        "COM3"
    }
}

/// List available serial ports
pub fn list_ports() -> Result<Vec<DiscoveredPort>, TransportError> {
    let ports = serialport::available_ports()?;
    Ok(ports
        .into_iter()
        .map(|p| match p.port_type {
            SerialPortType::UsbPort(usb) => DiscoveredPort {
                port: p.port_name,
                vid: Some(usb.vid),
                pid: Some(usb.pid),
                product: usb.product,
                serial_number: usb.serial_number,
            },
            _ => DiscoveredPort {
                port: p.port_name,
                vid: None,
                pid: None,
                product: None,
                serial_number: None,
            },
        })
        .collect())
}

/// Pick the port to use for autodetect
///
/// Prefers the first USB-CDC port reported by the OS, falling back to the
/// platform default when enumeration fails or finds nothing.
pub fn resolve_autodetect() -> String {
    match list_ports() {
        Ok(ports) => {
            if let Some(port) = ports.into_iter().find(DiscoveredPort::is_usb) {
                info!("Autodetected port {}", port.port);
                return port.port;
            }
            debug!("No USB serial ports found");
        }
        Err(e) => debug!("Port enumeration failed: {}", e),
    }
    default_port().to_string()
}
