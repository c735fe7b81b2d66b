//! # Update Command Implementation
//!
//! This module implements the `update` subcommand. Every matching mirror is
//! refreshed from upstream and snapshotted; every matching local repository is
//! snapshotted. A new snapshot is kept only when it differs from the previous
//! revision, and each retained change is printed.
//!
//! With `--cron` mirror refreshes run quietly and every change is printed
//! under the name of its source, so an unchanged run prints nothing.

use anyhow::Result;
use clap::Args;
use std::io;

use super::PassArgs;

/// Snapshot mirrors and repositories
#[derive(Args, Debug)]
pub struct UpdateArgs {
    #[command(flatten)]
    pub pass: PassArgs,
}

/// Execute the `update` command.
pub fn execute(args: UpdateArgs, color_flag: &str) -> Result<()> {
    let mut app = args.pass.load_app()?;
    let mut ui = args.pass.decision_surface(color_flag);
    app.exec_update(&args.pass.targets, args.pass.cron, ui.as_mut(), &mut io::stdout())?;
    Ok(())
}
