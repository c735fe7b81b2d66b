//! CLI argument parsing and command dispatch

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::commands;

/// aptrev - Revisioned snapshots and publications for aptly
#[derive(Parser, Debug)]
#[command(name = "aptrev")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,

    /// Colorize output (always, never, auto)
    #[arg(long, global = true, value_name = "WHEN", default_value = "auto")]
    color: String,

    /// Set log level (error, warn, info, debug, trace)
    #[arg(long, global = true, value_name = "LEVEL", default_value = "warn")]
    log_level: String,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Snapshot mirrors and repositories, keeping only real changes
    Update(commands::update::UpdateArgs),

    /// Reconcile publications and switch them to new snapshots
    Publish(commands::publish::PublishArgs),

    /// Update the sources of each publication, then publish it
    Run(commands::run::RunArgs),

    /// Show the configured publications and their sources
    Tree(commands::tree::TreeArgs),

    /// Generate shell completion scripts
    Completions(commands::completions::CompletionsArgs),
}

impl Cli {
    /// Execute the CLI command
    pub fn execute(self) -> Result<()> {
        init_logging(&self.log_level);

        match self.command {
            Commands::Update(args) => commands::update::execute(args, &self.color),
            Commands::Publish(args) => commands::publish::execute(args, &self.color),
            Commands::Run(args) => commands::run::execute(args, &self.color),
            Commands::Tree(args) => commands::tree::execute(args),
            Commands::Completions(args) => commands::completions::execute(args),
        }
    }
}

/// `RUST_LOG` wins over `--log-level` when set.
fn init_logging(level: &str) {
    let env = env_logger::Env::default().default_filter_or(level);
    let _ = env_logger::Builder::from_env(env)
        .format_timestamp(None)
        .try_init();
}
