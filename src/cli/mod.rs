//! CLI module
//!
//! Command-line interface for running the tap.
//!
//! # Modes
//!
//! - `--discover` - Print the catalog of streams and their schemas
//! - default - Sync the selected streams to standard output

mod commands;
mod runner;

pub use commands::Cli;
pub use runner::{build_client, Runner};
