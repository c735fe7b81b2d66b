//! # Decision Surface
//!
//! Reconciliation and publication stop at a handful of ambiguous points and
//! ask a `DecisionSurface` what to do: include a newly configured source,
//! take an updated revision, keep a source that was dropped from the
//! configuration, and switch a publication.
//!
//! Two implementations are provided:
//!
//! - **`InteractiveUi`**: prints the relevant snapshot description or diff and
//!   asks the administrator through `dialoguer` prompts.
//! - **`BatchUi`**: answers immediately with fixed defaults. In report-only
//!   mode (cron) textual changes are printed but never switched; in
//!   auto-approve mode they are switched.

use std::io::{self, Write};

use dialoguer::theme::ColorfulTheme;
use dialoguer::Select;

use crate::error::Result;
use crate::output::{underlined, OutputConfig};
use crate::snapshot::Snapshot;

/// Answer to a reconciliation question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Use this snapshot in the merge.
    Keep(Snapshot),
    /// Leave the source out of the merge.
    Reject,
    /// Stop reconciling this merge; nothing is published this round.
    Abort,
}

/// The component a publish pass is currently deciding about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwitchContext {
    pub alias: String,
    pub target: String,
    pub distribution: String,
    pub component: String,
}

impl SwitchContext {
    fn label(&self) -> String {
        format!("{}/{}", self.alias, self.component)
    }
}

/// Questions asked by merges and publications.
pub trait DecisionSurface {
    /// Wraps the upstream refresh of a mirror; `refresh(quiet)` performs it.
    fn mirror_update(&mut self, mirror: &str, refresh: &dyn Fn(bool) -> Result<()>)
        -> Result<()>;

    /// Announces that a decision about `context` starts.
    fn prepare_switch(&mut self, context: &SwitchContext);

    /// The component announced last will not be switched.
    fn skip_switch(&mut self);

    /// A configured source is not part of the live merge yet.
    ///
    /// Answers `Keep(snapshot)` to add it or `Reject` to leave it out.
    fn include_snapshot(&mut self, snapshot: &Snapshot, info: &str) -> Result<Decision>;

    /// A source changed since it was published.
    ///
    /// Answers `Keep(current)`, `Keep(proposed)` or `Abort`.
    fn update_snapshot(
        &mut self,
        current: &Snapshot,
        proposed: &Snapshot,
        diff: &str,
        source: &str,
    ) -> Result<Decision>;

    /// A published source is no longer configured.
    ///
    /// Answers `Keep(current)` to retain it anyway or `Reject` to remove it.
    fn remove_snapshot(&mut self, current: &Snapshot, info: &str) -> Result<Decision>;

    /// Whether to switch the announced component given the rendered diff.
    fn switch(&mut self, diff: &str, context: &SwitchContext) -> Result<bool>;
}

/// Asks the administrator on the terminal.
pub struct InteractiveUi {
    output: OutputConfig,
    theme: ColorfulTheme,
    current: Option<SwitchContext>,
}

impl InteractiveUi {
    pub fn new(output: OutputConfig) -> Self {
        Self {
            output,
            theme: ColorfulTheme::default(),
            current: None,
        }
    }

    /// Shows `items` and returns the picked index; Esc/`q` picks `fallback`.
    fn select(&self, prompt: &str, items: &[&str], default: usize, fallback: usize) -> Result<usize> {
        let picked = Select::with_theme(&self.theme)
            .with_prompt(prompt)
            .items(items)
            .default(default)
            .interact_opt()?;
        Ok(picked.unwrap_or(fallback))
    }
}

impl DecisionSurface for InteractiveUi {
    fn mirror_update(
        &mut self,
        mirror: &str,
        refresh: &dyn Fn(bool) -> Result<()>,
    ) -> Result<()> {
        println!();
        println!("{}", self.output.title(mirror));
        refresh(false)
    }

    fn prepare_switch(&mut self, context: &SwitchContext) {
        println!();
        println!("{}", self.output.section(&context.label()));
        self.current = Some(context.clone());
    }

    fn skip_switch(&mut self) {
        if let Some(context) = &self.current {
            println!(
                "Skipping publication for {}/{} {} - no change",
                context.target, context.distribution, context.component
            );
        }
    }

    fn include_snapshot(&mut self, snapshot: &Snapshot, info: &str) -> Result<Decision> {
        println!("{}", info);
        let picked = self.select("Do you want to include this snapshot", &["yes", "no"], 0, 1)?;
        Ok(match picked {
            0 => Decision::Keep(snapshot.clone()),
            _ => Decision::Reject,
        })
    }

    fn update_snapshot(
        &mut self,
        current: &Snapshot,
        proposed: &Snapshot,
        diff: &str,
        source: &str,
    ) -> Result<Decision> {
        println!("{}", diff);
        let prompt = format!("Include updated version in {}", source);
        let picked = self.select(&prompt, &["yes", "no", "abort"], 1, 2)?;
        Ok(match picked {
            0 => Decision::Keep(proposed.clone()),
            1 => Decision::Keep(current.clone()),
            _ => Decision::Abort,
        })
    }

    fn remove_snapshot(&mut self, current: &Snapshot, info: &str) -> Result<Decision> {
        println!("{}", info);
        let picked = self.select("Do you want to remove this snapshot", &["no", "yes"], 0, 0)?;
        Ok(match picked {
            1 => Decision::Reject,
            _ => Decision::Keep(current.clone()),
        })
    }

    fn switch(&mut self, diff: &str, context: &SwitchContext) -> Result<bool> {
        println!("{}", diff);
        let prompt = format!(
            "Do you want to publish this change to {}/{} {}",
            context.target, context.distribution, context.component
        );
        Ok(self.select(&prompt, &["no", "yes"], 0, 0)? == 1)
    }
}

/// How a `BatchUi` treats publications with a textual change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwitchPolicy {
    /// Print the change, do not switch.
    Report,
    /// Print the change and switch.
    Approve,
}

/// Answers every question without blocking.
///
/// New sources are included, updated sources take the newest revision and
/// sources that left the configuration are removed. Reports go to stdout
/// unless another writer is given.
pub struct BatchUi {
    policy: SwitchPolicy,
    out: Box<dyn Write + Send>,
}

impl BatchUi {
    pub fn new(policy: SwitchPolicy) -> Self {
        Self {
            policy,
            out: Box::new(io::stdout()),
        }
    }

    /// Sends switch reports to `out` instead of stdout.
    pub fn with_output(mut self, out: Box<dyn Write + Send>) -> Self {
        self.out = out;
        self
    }

    /// Cron mode: report textual changes without switching.
    pub fn report_only() -> Self {
        Self::new(SwitchPolicy::Report)
    }

    pub fn auto_approve() -> Self {
        Self::new(SwitchPolicy::Approve)
    }

    pub fn policy(&self) -> SwitchPolicy {
        self.policy
    }
}

impl DecisionSurface for BatchUi {
    fn mirror_update(
        &mut self,
        _mirror: &str,
        refresh: &dyn Fn(bool) -> Result<()>,
    ) -> Result<()> {
        refresh(true)
    }

    fn prepare_switch(&mut self, _context: &SwitchContext) {}

    fn skip_switch(&mut self) {}

    fn include_snapshot(&mut self, snapshot: &Snapshot, _info: &str) -> Result<Decision> {
        Ok(Decision::Keep(snapshot.clone()))
    }

    fn update_snapshot(
        &mut self,
        _current: &Snapshot,
        proposed: &Snapshot,
        _diff: &str,
        _source: &str,
    ) -> Result<Decision> {
        Ok(Decision::Keep(proposed.clone()))
    }

    fn remove_snapshot(&mut self, _current: &Snapshot, _info: &str) -> Result<Decision> {
        Ok(Decision::Reject)
    }

    fn switch(&mut self, diff: &str, context: &SwitchContext) -> Result<bool> {
        writeln!(self.out)?;
        writeln!(self.out, "{}", underlined(&context.label()))?;
        writeln!(self.out, "{}", diff)?;
        Ok(self.policy == SwitchPolicy::Approve)
    }
}
