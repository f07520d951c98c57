// CLI definitions using clap

use boks_device::{ButtonSet, DeviceSelection, ProtocolRevision, Timeout};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "boksctl")]
#[command(author, version, about = "Boks response button box")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Device: "autodetect", "dummy" or a serial port (overrides the config file)
    #[arg(short, long, global = true, value_name = "PORT")]
    pub port: Option<DeviceSelection>,

    /// Config file path (default: ~/.config/boks/boks.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Firmware protocol revision (legacy, current)
    #[arg(long, global = true)]
    pub revision: Option<ProtocolRevision>,

    /// Enable transport monitoring (logs all commands/replies at debug level)
    #[arg(long, global = true)]
    pub monitor: bool,

    /// Print results as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Log level (error, warn, info, debug, trace); RUST_LOG takes precedence
    #[arg(long, global = true, default_value = "warn")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Switch {
    On,
    Off,
}

impl Switch {
    pub fn is_on(self) -> bool {
        self == Switch::On
    }
}

#[derive(Subcommand)]
pub enum Commands {
    // === Query Commands ===
    /// Show firmware version, model, serial id and button count
    #[command(visible_aliases = ["version", "i"])]
    Info,

    /// Show the buttons currently held down
    #[command(visible_alias = "s")]
    State,

    /// Show the buttons selected for press/release detection
    #[command(visible_alias = "b")]
    Buttons,

    /// Show the device's response timeout
    #[command(visible_alias = "t")]
    Timeout,

    /// Show the device clock and timer marks
    Time,

    /// List serial ports
    #[command(visible_aliases = ["list", "ls"])]
    Ports,

    // === Set Commands ===
    /// Select the buttons to listen to ("1;2;3", empty for the default set)
    #[command(visible_alias = "sb")]
    SetButtons {
        /// Button list, e.g. "1;3"
        #[arg(default_value = "")]
        buttons: ButtonSet,
    },

    /// Set the response timeout
    #[command(visible_alias = "st")]
    SetTimeout {
        /// Milliseconds, or "infinite"
        timeout: Timeout,
    },

    /// Switch the LED on or off
    Led {
        #[arg(value_enum)]
        state: Switch,
        /// Switch the link LED instead
        #[arg(long)]
        link: bool,
    },

    /// Switch continuous mode on or off
    Continuous {
        #[arg(value_enum)]
        state: Switch,
    },

    // === Response Commands ===
    /// Wait for a button press
    #[command(visible_alias = "p")]
    Press {
        #[command(flatten)]
        wait: WaitArgs,
    },

    /// Wait for a button release
    #[command(visible_alias = "r")]
    Release {
        #[command(flatten)]
        wait: WaitArgs,
    },

    /// Collect responses and report response times
    Collect {
        #[command(flatten)]
        wait: WaitArgs,
        /// Expected button, for scoring
        #[arg(long)]
        correct: Option<u8>,
        /// Number of responses to collect
        #[arg(short = 'n', long, default_value = "1")]
        count: u32,
    },

    /// Continuously display button state (Ctrl-C to stop)
    #[command(visible_alias = "watch")]
    Monitor {
        /// Poll interval in milliseconds
        #[arg(short, long, default_value = "20")]
        interval: u64,
    },
}

#[derive(clap::Args, Clone)]
pub struct WaitArgs {
    /// Allowed buttons, e.g. "1;2" (default: configured buttons)
    #[arg(short, long)]
    pub buttons: Option<ButtonSet>,

    /// Timeout in milliseconds, or "infinite" (default: configured timeout)
    #[arg(short, long)]
    pub timeout: Option<Timeout>,
}
