// Boks response box - shared library for boksctl
// Configuration file handling and the terminal keyboard used in dummy mode

pub mod config;
pub mod keyboard;

pub use config::BoksConfig;
pub use keyboard::TerminalKeyInput;
