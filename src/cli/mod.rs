//! CLI module for the stack teardown tool.
//!
//! This module provides the command-line interface for planning and running
//! the self-destruct sequence.

mod commands;
mod output;

pub use commands::{Cli, Commands, LogFormat, OutputFormat};
pub use output::{OutputFormatter, Presence, StackPresence};
