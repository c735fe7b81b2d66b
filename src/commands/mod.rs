//! # CLI Command Implementations
//!
//! This module contains the implementation for each subcommand of the `aptrev`
//! command-line tool. Each subcommand is defined in its own file.
//!
//! ## Structure
//!
//! Each command module contains:
//! - An `Args` struct that defines the command-specific arguments and options,
//!   derived using `clap`.
//! - An `execute` function that takes the parsed `Args` and performs the
//!   command's logic by calling into the `aptrev` library.
//!
//! The three passes (`update`, `publish`, `run`) share [`PassArgs`], which
//! selects the configuration, the aptly installation and the decision mode.

pub mod completions;
pub mod publish;
pub mod run;
pub mod tree;
pub mod update;

use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;

use aptrev::app::App;
use aptrev::aptly::AptlyEngine;
use aptrev::config;
use aptrev::output::OutputConfig;
use aptrev::ui::{BatchUi, DecisionSurface, InteractiveUi};

/// Options shared by the update, publish and run passes.
#[derive(Args, Debug, Clone)]
pub struct PassArgs {
    /// Path to the aptrev configuration file.
    #[arg(
        short,
        long,
        value_name = "FILE",
        env = "APTREV_CONFIG",
        default_value = "aptrev.yaml"
    )]
    pub config: PathBuf,

    /// The aptly binary to run.
    #[arg(long, value_name = "PATH", env = "APTLY_BIN", default_value = "aptly")]
    pub aptly_bin: PathBuf,

    /// Configuration file handed to aptly with `-config`.
    #[arg(long, value_name = "FILE")]
    pub aptly_config: Option<PathBuf>,

    /// Glob patterns selecting what to process; everything when omitted.
    #[arg(value_name = "TARGET")]
    pub targets: Vec<String>,

    /// Never prompt: include and update everything, report changes without
    /// switching publications.
    #[arg(long)]
    pub cron: bool,

    /// Never prompt: include and update everything and switch publications.
    #[arg(long, short = 'y', conflicts_with = "cron")]
    pub yes: bool,
}

impl PassArgs {
    /// Loads the configuration and links it against aptly.
    pub fn load_app(&self) -> Result<App> {
        let config = config::from_file(&self.config)
            .with_context(|| format!("Failed to load config from {}", self.config.display()))?;
        let engine = AptlyEngine::new(&self.aptly_bin)
            .with_config(self.aptly_config.clone())
            .with_keyring(config.keyring.clone());
        Ok(App::load(Box::new(engine), &config)?)
    }

    /// The decision surface matching `--cron` / `--yes`.
    pub fn decision_surface(&self, color_flag: &str) -> Box<dyn DecisionSurface> {
        if self.cron {
            Box::new(BatchUi::report_only())
        } else if self.yes {
            Box::new(BatchUi::auto_approve())
        } else {
            Box::new(InteractiveUi::new(OutputConfig::from_env_and_flag(color_flag)))
        }
    }
}
