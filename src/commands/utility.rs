//! Utility command handlers.

use boks_transport::{default_port, list_ports};

use super::{CommandResult, Context};

/// List serial ports
pub fn ports(ctx: &Context) -> CommandResult {
    let ports = list_ports()?;
    ctx.print(&ports, |ports| {
        if ports.is_empty() {
            println!("No serial ports found (default: {})", default_port());
            return;
        }
        println!("Serial ports:");
        for port in ports {
            match (port.vid, port.pid) {
                (Some(vid), Some(pid)) => println!(
                    "  {}  VID={:04x} PID={:04x} {}",
                    port.port,
                    vid,
                    pid,
                    port.product.as_deref().unwrap_or("")
                ),
                _ => println!("  {}", port.port),
            }
        }
    })
}
