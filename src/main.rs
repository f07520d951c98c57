//! Boks response box CLI
//!
//! A command-line interface for the Boks button box.

use std::sync::Arc;

use anyhow::Result;
use boks::BoksConfig;
use boks_device::MonotonicClock;
use clap::Parser;
use tracing::{debug, info};

// CLI definitions
mod cli;
use cli::{Cli, Commands};

// Command handlers
mod commands;
use commands::Context;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    // Load config; command-line flags win over the file
    let mut config = BoksConfig::load_or_default(cli.config.as_deref())?;
    if let Some(port) = cli.port.clone() {
        config.port = port;
    }
    if let Some(revision) = cli.revision {
        config.revision = revision;
    }
    debug!("Configuration: {:?}", config);

    let ctx = Context {
        options: config.open_options(cli.monitor)?,
        json: cli.json,
        clock: Arc::new(MonotonicClock::new()),
    };
    if cli.monitor {
        info!("Monitor mode enabled - logging all commands/replies");
    }

    match cli.command {
        // Default: show device info
        None | Some(Commands::Info) => commands::query::info(&ctx),

        // === Query Commands ===
        Some(Commands::State) => commands::query::state(&ctx),
        Some(Commands::Buttons) => commands::query::buttons(&ctx),
        Some(Commands::Timeout) => commands::query::timeout(&ctx),
        Some(Commands::Time) => commands::query::time(&ctx),
        Some(Commands::Ports) => commands::utility::ports(&ctx),

        // === Set Commands ===
        Some(Commands::SetButtons { buttons }) => commands::set::set_buttons(&ctx, buttons),
        Some(Commands::SetTimeout { timeout }) => commands::set::set_timeout(&ctx, timeout),
        Some(Commands::Led { state, link }) => commands::set::led(&ctx, state, link),
        Some(Commands::Continuous { state }) => commands::set::continuous(&ctx, state),

        // === Response Commands ===
        Some(Commands::Press { wait }) => commands::respond::press(&ctx, &wait),
        Some(Commands::Release { wait }) => commands::respond::release(&ctx, &wait),
        Some(Commands::Collect {
            wait,
            correct,
            count,
        }) => commands::respond::collect(&ctx, &wait, correct, count),
        Some(Commands::Monitor { interval }) => commands::monitor::monitor(&ctx, interval),
    }
}
