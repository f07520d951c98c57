//! Response collection command handlers.

use boks_device::{
    collect_response, ButtonEvent, ButtonId, ButtonSet, ResponseBox, ResponseRecord,
    ResponseRequest,
};

use super::{with_boks, CommandResult, Context};
use crate::cli::WaitArgs;

/// Apply per-call overrides on top of the configured buttons and timeout
fn apply_wait_args(boks: &mut dyn ResponseBox, wait: &WaitArgs) -> CommandResult {
    if let Some(buttons) = wait.buttons {
        boks.set_buttons((!buttons.is_empty()).then_some(buttons))?;
    }
    if let Some(timeout) = wait.timeout {
        boks.set_timeout(timeout)?;
    }
    Ok(())
}

fn print_event(ctx: &Context, verb: &str, event: &ButtonEvent) -> CommandResult {
    ctx.print(event, |e| match e.button {
        Some(button) => println!("{verb} {button} at {:.3} ms", e.timestamp_ms),
        None => println!("Timeout at {:.3} ms", e.timestamp_ms),
    })
}

/// Wait for a single press
pub fn press(ctx: &Context, wait: &WaitArgs) -> CommandResult {
    with_boks(ctx, |boks| {
        apply_wait_args(boks, wait)?;
        let event = boks.get_button_press()?;
        print_event(ctx, "Pressed", &event)
    })
}

/// Wait for a single release
pub fn release(ctx: &Context, wait: &WaitArgs) -> CommandResult {
    with_boks(ctx, |boks| {
        apply_wait_args(boks, wait)?;
        let event = boks.get_button_release()?;
        print_event(ctx, "Released", &event)
    })
}

/// Collect `count` responses, each timed from the moment it was requested
pub fn collect(ctx: &Context, wait: &WaitArgs, correct: Option<u8>, count: u32) -> CommandResult {
    let correct = correct.map(ButtonId::new).transpose()?;
    let allowed = match wait.buttons {
        Some(buttons) => Some(buttons),
        None => ctx.options.engine.buttons,
    };
    let request = ResponseRequest {
        allowed: allowed.filter(|set: &ButtonSet| !set.is_empty()),
        timeout: wait.timeout.unwrap_or(ctx.options.engine.timeout),
        start_ms: None,
        correct,
    };

    with_boks(ctx, |boks| {
        let mut records: Vec<ResponseRecord> = Vec::with_capacity(count as usize);
        for trial in 1..=count {
            if !ctx.json {
                println!("Trial {trial}/{count}: waiting for response...");
            }
            let record = collect_response(boks, ctx.clock.as_ref(), &request)?;
            if !ctx.json {
                print_record(&record);
            }
            records.push(record);
        }
        if ctx.json {
            println!("{}", serde_json::to_string_pretty(&records)?);
        } else if count > 1 {
            print_summary(&records);
        }
        Ok(())
    })
}

fn print_record(record: &ResponseRecord) {
    let verdict = match record.correct {
        Some(true) => " (correct)",
        Some(false) => " (incorrect)",
        None => "",
    };
    match record.response {
        Some(button) => println!(
            "  response {button} after {:.1} ms{verdict}",
            record.response_time_ms
        ),
        None => println!("  timeout after {:.1} ms{verdict}", record.response_time_ms),
    }
}

fn print_summary(records: &[ResponseRecord]) {
    let answered: Vec<f64> = records
        .iter()
        .filter(|r| !r.timed_out())
        .map(|r| r.response_time_ms)
        .collect();
    println!();
    println!("Responses: {}/{}", answered.len(), records.len());
    if !answered.is_empty() {
        let mean = answered.iter().sum::<f64>() / answered.len() as f64;
        println!("Mean RT:   {mean:.1} ms");
    }
    let scored: Vec<bool> = records.iter().filter_map(|r| r.correct).collect();
    if !scored.is_empty() {
        let hits = scored.iter().filter(|c| **c).count();
        println!("Accuracy:  {}/{}", hits, scored.len());
    }
}
