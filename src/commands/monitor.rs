//! Live button-state display.

use std::io::{self, Write};
use std::sync::atomic::Ordering;
use std::thread;
use std::time::Duration;

use boks_device::{BoksError, ButtonSet, TransportError};
use tracing::debug;

use super::{setup_interrupt_handler, with_boks, CommandResult, Context};

/// Ctrl-C seen by the terminal keyboard in dummy mode
fn is_interrupt(e: &BoksError) -> bool {
    matches!(
        e,
        BoksError::Connection(TransportError::Io(io)) if io.kind() == io::ErrorKind::Interrupted
    )
}

/// Poll the button state on a dedicated connection until Ctrl-C
pub fn monitor(ctx: &Context, interval_ms: u64) -> CommandResult {
    let running = setup_interrupt_handler();
    let interval = Duration::from_millis(interval_ms);

    with_boks(ctx, |boks| {
        if !ctx.json {
            println!("Monitoring button state (Ctrl-C to stop)");
        }
        let mut last: Option<ButtonSet> = None;
        while running.load(Ordering::SeqCst) {
            let state = match boks.get_button_state() {
                Ok(state) => state,
                Err(e) if is_interrupt(&e) => break,
                Err(e) => return Err(e.into()),
            };
            if last != Some(state) {
                let now = ctx.clock.now_ms();
                if ctx.json {
                    println!(
                        "{}",
                        serde_json::json!({ "time_ms": now, "held": state })
                    );
                } else if state.is_empty() {
                    print!("\r{now:>12.1} ms  held: none          ");
                } else {
                    print!("\r{now:>12.1} ms  held: {state:<12}");
                }
                io::stdout().flush()?;
                last = Some(state);
            }
            thread::sleep(interval);
        }
        if !ctx.json {
            println!();
        }
        debug!("Monitor stopped");
        Ok(())
    })
}
