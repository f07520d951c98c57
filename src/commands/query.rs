//! Query (read-only) command handlers.

use boks_device::{BoksError, ButtonSet, DeviceIdentity};
use serde::Serialize;

use super::{with_boks, with_engine, CommandResult, Context};

#[derive(Serialize)]
struct InfoReport {
    port: String,
    revision: String,
    dummy: bool,
    #[serde(flatten)]
    identity: DeviceIdentity,
    button_count: Option<u8>,
}

/// Firmware version, model, serial id and button count
pub fn info(ctx: &Context) -> CommandResult {
    with_boks(ctx, |boks| {
        let mut identity = boks.info().clone();
        if identity.serial_id.is_none() {
            identity.serial_id = optional(boks.get_sid())?;
        }
        let report = InfoReport {
            port: ctx.options.selection.to_string(),
            revision: boks.revision().to_string(),
            dummy: boks.is_dummy(),
            identity,
            button_count: optional(boks.button_count())?,
        };
        ctx.print(&report, |r| {
            println!("Port:      {}{}", r.port, if r.dummy { " (emulated)" } else { "" });
            println!("Firmware:  {}", r.identity.firmware_version);
            println!("Model:     {}", r.identity.model);
            println!("Protocol:  {}", r.revision);
            if let Some(sid) = &r.identity.serial_id {
                println!("Serial:    {sid}");
            }
            if let Some(count) = r.button_count {
                println!("Buttons:   {count}");
            }
        })
    })
}

/// Treat commands the firmware revision lacks as absent values
fn optional<T>(result: Result<T, BoksError>) -> Result<Option<T>, BoksError> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(BoksError::NotSupported(_)) => Ok(None),
        Err(e) => Err(e),
    }
}

fn print_set(ctx: &Context, label: &str, set: ButtonSet) -> CommandResult {
    ctx.print(&set, |s| {
        if s.is_empty() {
            println!("{label}: none");
        } else {
            println!("{label}: {s}");
        }
    })
}

/// Buttons currently held down
pub fn state(ctx: &Context) -> CommandResult {
    with_boks(ctx, |boks| {
        let state = boks.get_button_state()?;
        print_set(ctx, "Held", state)
    })
}

/// Buttons selected for press/release detection
pub fn buttons(ctx: &Context) -> CommandResult {
    with_boks(ctx, |boks| {
        let buttons = boks.get_buttons()?;
        print_set(ctx, "Selected", buttons)
    })
}

/// Response timeout reported by the device
pub fn timeout(ctx: &Context) -> CommandResult {
    with_boks(ctx, |boks| {
        let ms = boks.get_timeout()?;
        ctx.print(&ms, |ms| {
            if *ms == 0.0 {
                println!("Timeout: infinite");
            } else {
                println!("Timeout: {ms} ms");
            }
        })
    })
}

#[derive(Serialize)]
struct TimeReport {
    device_time_ms: f64,
    t1_ms: f64,
    t2_ms: f64,
    since_t1_ms: f64,
}

/// Device clock and timer marks (hardware only)
pub fn time(ctx: &Context) -> CommandResult {
    with_engine(ctx, "the device clock", |boks| {
        let report = TimeReport {
            device_time_ms: boks.device_time()?,
            t1_ms: boks.get_t1()?,
            t2_ms: boks.get_t2()?,
            since_t1_ms: boks.get_td()?,
        };
        ctx.print(&report, |r| {
            println!("Device time: {:.3} ms", r.device_time_ms);
            println!("T1:          {:.3} ms", r.t1_ms);
            println!("T2:          {:.3} ms", r.t2_ms);
            println!("Since T1:    {:.3} ms", r.since_t1_ms);
        })
    })
}
