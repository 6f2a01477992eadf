//! CLI module for the chef-resources tool.
//!
//! This module provides the command-line interface: the provider server
//! plus a few commands for inspecting Chef objects by hand.

mod commands;
mod output;

pub use commands::{Cli, Commands, OutputFormat};
pub use output::OutputFormatter;
