//! Setting command handlers.

use boks_device::{ButtonSet, Timeout};

use super::{with_boks, with_engine, CommandResult, Context};
use crate::cli::Switch;

/// Select the buttons to listen to; an empty set selects the default
pub fn set_buttons(ctx: &Context, buttons: ButtonSet) -> CommandResult {
    with_boks(ctx, |boks| {
        let requested = (!buttons.is_empty()).then_some(buttons);
        boks.set_buttons(requested)?;
        let selected = boks.get_buttons()?;
        if !ctx.json {
            println!("Buttons set to {selected}");
        }
        Ok(())
    })
}

pub fn set_timeout(ctx: &Context, timeout: Timeout) -> CommandResult {
    with_boks(ctx, |boks| {
        boks.set_timeout(timeout)?;
        if !ctx.json {
            println!("Timeout set to {timeout}");
        }
        Ok(())
    })
}

pub fn led(ctx: &Context, state: Switch, link: bool) -> CommandResult {
    if link {
        with_engine(ctx, "the link LED", |boks| {
            boks.set_link_led(state.is_on())?;
            Ok(())
        })
    } else {
        with_boks(ctx, |boks| {
            boks.set_led(state.is_on())?;
            Ok(())
        })
    }
}

pub fn continuous(ctx: &Context, state: Switch) -> CommandResult {
    with_boks(ctx, |boks| {
        boks.set_continuous(state.is_on())?;
        if !ctx.json {
            println!(
                "Continuous mode {}",
                if state.is_on() { "on" } else { "off" }
            );
        }
        Ok(())
    })
}
