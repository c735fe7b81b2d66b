//! # Publish Command Implementation
//!
//! This module implements the `publish` subcommand: every publication whose
//! alias matches a target is created if missing, or reconciled with its
//! configured sources and switched where warranted.
//!
//! Interactively, every include/update/remove/switch question is asked on the
//! terminal. `--cron` answers without prompting and only reports the changes
//! it would publish; `--yes` answers the same way but switches.

use anyhow::Result;
use clap::Args;
use std::io;

use super::PassArgs;

/// Reconcile and switch publications
#[derive(Args, Debug)]
pub struct PublishArgs {
    #[command(flatten)]
    pub pass: PassArgs,
}

/// Execute the `publish` command.
pub fn execute(args: PublishArgs, color_flag: &str) -> Result<()> {
    let mut app = args.pass.load_app()?;
    let mut ui = args.pass.decision_surface(color_flag);
    app.exec_publish(&args.pass.targets, args.pass.cron, ui.as_mut(), &mut io::stdout())?;
    Ok(())
}
