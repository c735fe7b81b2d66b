//! # aptrev CLI
//!
//! This is the binary entry point for the `aptrev` command-line tool.
//!
//! Its primary responsibilities are:
//! - Parsing command-line arguments using `clap`.
//! - Setting up logging and executing the selected command.
//! - Handling top-level application errors and translating them into
//!   user-friendly output.
//!
//! The snapshot and publication logic lives in the library crate; the binary
//! is a thin wrapper around it.

mod cli;
mod commands;

use anyhow::Result;
use clap::Parser;

fn main() -> Result<()> {
    let cli = cli::Cli::parse();
    cli.execute()
}
