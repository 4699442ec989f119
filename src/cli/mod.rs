//! CLI module for pagestream
//!
//! Provides command-line interface for:
//! - serve: Run the order server with live streams
//! - watch: Follow a running server's count and window streams

mod args;
mod commands;
mod errors;

pub use args::{Cli, Command, FilterArgs};
pub use commands::{load_config, run, run_command, serve, watch};
pub use errors::{CliError, CliErrorCode, CliResult};
