//! Command handlers for the CLI application.
//!
//! This module organizes command handlers by category:
//! - `query`: Read-only commands (info, state, buttons, timeout, time)
//! - `set`: Setting commands (set-buttons, set-timeout, led, continuous)
//! - `respond`: Response collection (press, release, collect)
//! - `monitor`: Live button-state display
//! - `utility`: Utility commands (ports)

pub mod monitor;
pub mod query;
pub mod respond;
pub mod set;
pub mod utility;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{bail, Context as _};
use boks::TerminalKeyInput;
use boks_device::{
    open, open_transport, Boks, Clock, DeviceSelection, HostEnvironment, OpenOptions, ResponseBox,
};
use boks_transport::BoxedTransport;
use serde::Serialize;
use tracing::warn;

/// Result type for command handlers
pub type CommandResult = anyhow::Result<()>;

/// Settings shared by every command
pub struct Context {
    pub options: OpenOptions,
    pub json: bool,
    /// Host clock shared by the device and response timing
    pub clock: Arc<dyn Clock>,
}

impl Context {
    /// Open the configured device, with a terminal keyboard for dummy mode
    pub fn open(&self) -> anyhow::Result<Box<dyn ResponseBox>> {
        let mut env = HostEnvironment {
            clock: Arc::clone(&self.clock),
            input: None,
        };
        if self.options.selection == DeviceSelection::Dummy {
            let input = TerminalKeyInput::new(Arc::clone(&env.clock))?;
            env = env.with_input(Box::new(input));
        }
        open(&self.options, env).with_context(|| format!("opening Boks on {}", self.options.selection))
    }

    /// Print `value` as JSON, or run `text` to print it for humans
    pub fn print<T: Serialize>(&self, value: &T, text: impl FnOnce(&T)) -> CommandResult {
        if self.json {
            println!("{}", serde_json::to_string_pretty(value)?);
        } else {
            text(value);
        }
        Ok(())
    }
}

/// Open the Boks, run a closure with it, and close it again.
///
/// Closing is best effort: a failure is logged and does not mask the
/// closure's own result.
pub fn with_boks<F>(ctx: &Context, f: F) -> CommandResult
where
    F: FnOnce(&mut dyn ResponseBox) -> CommandResult,
{
    let mut boks = ctx.open()?;
    let result = f(boks.as_mut());
    if let Err(e) = boks.close() {
        warn!("Failed to close Boks: {}", e);
    }
    result
}

/// Like `with_boks`, for engine-only operations such as the timer marks.
///
/// Fails in dummy mode, which has no device to talk to.
pub fn with_engine<F>(ctx: &Context, what: &str, f: F) -> CommandResult
where
    F: FnOnce(&mut Boks<BoxedTransport>) -> CommandResult,
{
    if ctx.options.selection == DeviceSelection::Dummy {
        bail!("{what} is not available in dummy mode");
    }
    let transport = open_transport(&ctx.options)?;
    let mut boks = Boks::connect(
        transport,
        Arc::clone(&ctx.clock),
        ctx.options.engine.clone(),
    )?;
    let result = f(&mut boks);
    if let Err(e) = boks.close() {
        warn!("Failed to close Boks: {}", e);
    }
    result
}

/// Set up a Ctrl-C handler that sets the given flag to false when triggered.
/// Returns the Arc<AtomicBool> for use in the main loop.
pub fn setup_interrupt_handler() -> Arc<AtomicBool> {
    let running = Arc::new(AtomicBool::new(true));
    let running_clone = Arc::clone(&running);

    if let Err(e) = ctrlc::set_handler(move || {
        running_clone.store(false, Ordering::SeqCst);
    }) {
        warn!("Failed to install Ctrl-C handler: {}", e);
    }

    running
}
