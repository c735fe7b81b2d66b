//! # Run Command Implementation
//!
//! `run` combines `update` and `publish`: for each matching publication the
//! mirrors and repositories behind it are snapshotted first, then the
//! publication is reconciled. Sources shared by several publications are
//! updated once per invocation.

use anyhow::Result;
use clap::Args;
use std::io;

use super::PassArgs;

/// Update the sources of each publication, then publish it
#[derive(Args, Debug)]
pub struct RunArgs {
    #[command(flatten)]
    pub pass: PassArgs,
}

/// Execute the `run` command.
pub fn execute(args: RunArgs, color_flag: &str) -> Result<()> {
    let mut app = args.pass.load_app()?;
    let mut ui = args.pass.decision_surface(color_flag);
    app.exec_run(&args.pass.targets, args.pass.cron, ui.as_mut(), &mut io::stdout())?;
    Ok(())
}
