//! # Application Passes
//!
//! `App` ties a loaded configuration to a repository engine and runs the
//! three passes the command line offers:
//!
//! - **update**: cut a new snapshot of every matching mirror and repo and
//!   report the changes that were retained.
//! - **publish**: reconcile every matching publication with its sources.
//! - **run**: for every matching publication, update the sources behind it
//!   and then publish it.
//!
//! Targets are shell-style globs matched against mirror/repo names (update)
//! or publication aliases (publish, run). No targets means everything.

use std::collections::HashSet;
use std::io::Write;

use glob::Pattern;

use crate::config::Config;
use crate::engine::RepositoryEngine;
use crate::error::{Error, Result};
use crate::output::underlined;
use crate::publish::{Publish, PublishOutcome};
use crate::snapshot::Diff;
use crate::source::{SourceId, SourceKind, SourceRegistry};
use crate::ui::DecisionSurface;

/// Compiled target filters; empty input matches everything.
fn patterns(targets: &[String]) -> Result<Vec<Pattern>> {
    if targets.is_empty() {
        return Ok(vec![Pattern::new("*")?]);
    }
    targets
        .iter()
        .map(|target| Pattern::new(target).map_err(Error::from))
        .collect()
}

fn matches(patterns: &[Pattern], name: &str) -> bool {
    patterns.iter().any(|pattern| pattern.matches(name))
}

/// One invocation's worth of sources and publications.
pub struct App {
    engine: Box<dyn RepositoryEngine>,
    registry: SourceRegistry,
    publications: Vec<Publish>,
    updated: HashSet<SourceId>,
}

impl App {
    /// Builds every source and publication of `config` and links them against
    /// the engine's inventory.
    pub fn load(engine: Box<dyn RepositoryEngine>, config: &Config) -> Result<Self> {
        let mut registry = SourceRegistry::new();
        let publications = config
            .publish
            .iter()
            .map(|entry| Publish::from_entry(entry, &mut registry))
            .collect::<Result<Vec<_>>>()?;
        registry.link(engine.as_ref())?;
        log::debug!(
            "loaded {} publication(s) over {} source(s)",
            publications.len(),
            registry.len()
        );

        Ok(Self {
            engine,
            registry,
            publications,
            updated: HashSet::new(),
        })
    }

    pub fn engine(&self) -> &dyn RepositoryEngine {
        self.engine.as_ref()
    }

    pub fn registry(&self) -> &SourceRegistry {
        &self.registry
    }

    pub fn publications(&self) -> &[Publish] {
        &self.publications
    }

    /// Mirrors and then repos whose name matches one of `targets`.
    pub fn matching_sources(&self, targets: &[String]) -> Result<Vec<SourceId>> {
        let patterns = patterns(targets)?;
        let mut ids = Vec::new();
        for kind in [SourceKind::Mirror, SourceKind::Repo] {
            ids.extend(self.registry.ids().filter(|id| {
                let source = self.registry.get(*id);
                source.kind() == kind && matches(&patterns, source.name())
            }));
        }
        Ok(ids)
    }

    /// Indices of the publications whose alias matches one of `targets`.
    pub fn matching_publications(&self, targets: &[String]) -> Result<Vec<usize>> {
        let patterns = patterns(targets)?;
        Ok(self
            .publications
            .iter()
            .enumerate()
            .filter(|(_, publish)| matches(&patterns, publish.alias()))
            .map(|(index, _)| index)
            .collect())
    }

    /// Updates a single mirror or repo.
    pub fn update_source(&mut self, id: SourceId, ui: &mut dyn DecisionSurface) -> Result<Option<Diff>> {
        self.updated.insert(id);
        self.registry.update(id, self.engine.as_ref(), ui)
    }

    /// Updates every source behind a publication that was not updated yet in
    /// this invocation.
    pub fn update_publication(
        &mut self,
        index: usize,
        ui: &mut dyn DecisionSurface,
    ) -> Result<Vec<(String, Diff)>> {
        self.publications[index].update_all(
            &mut self.registry,
            self.engine.as_ref(),
            ui,
            &mut self.updated,
        )
    }

    /// Publishes a single publication.
    pub fn publish_one(&mut self, index: usize, ui: &mut dyn DecisionSurface) -> Result<PublishOutcome> {
        self.publications[index].publish(&mut self.registry, self.engine.as_ref(), ui)
    }

    /// The `update` pass.
    pub fn exec_update(
        &mut self,
        targets: &[String],
        cron: bool,
        ui: &mut dyn DecisionSurface,
        out: &mut dyn Write,
    ) -> Result<()> {
        for id in self.matching_sources(targets)? {
            if let Some(diff) = self.update_source(id, ui)? {
                let name = self.registry.get(id).name().to_string();
                report_update(out, &name, &diff, cron)?;
            }
        }
        Ok(())
    }

    /// The `publish` pass.
    pub fn exec_publish(
        &mut self,
        targets: &[String],
        cron: bool,
        ui: &mut dyn DecisionSurface,
        out: &mut dyn Write,
    ) -> Result<()> {
        for index in self.matching_publications(targets)? {
            let outcome = self.publish_one(index, ui)?;
            if !cron {
                report_publish(out, &self.publications[index], &outcome)?;
            }
        }
        Ok(())
    }

    /// The `run` pass: update and publish, one publication after another.
    pub fn exec_run(
        &mut self,
        targets: &[String],
        cron: bool,
        ui: &mut dyn DecisionSurface,
        out: &mut dyn Write,
    ) -> Result<()> {
        for index in self.matching_publications(targets)? {
            for (name, diff) in self.update_publication(index, ui)? {
                report_update(out, &name, &diff, cron)?;
            }
            let outcome = self.publish_one(index, ui)?;
            if !cron {
                report_publish(out, &self.publications[index], &outcome)?;
            }
        }
        Ok(())
    }
}

fn report_update(out: &mut dyn Write, name: &str, diff: &Diff, cron: bool) -> Result<()> {
    if cron {
        writeln!(out, "{}", underlined(name))?;
    } else {
        writeln!(out)?;
    }
    writeln!(out, "{}", diff.rendered)?;
    Ok(())
}

fn report_publish(out: &mut dyn Write, publish: &Publish, outcome: &PublishOutcome) -> Result<()> {
    match outcome {
        PublishOutcome::Initial => writeln!(
            out,
            "Published {} to {}/{}",
            publish.alias(),
            publish.target(),
            publish.distribution()
        )?,
        PublishOutcome::Switched(components) => writeln!(
            out,
            "Switched {}/{} {}",
            publish.target(),
            publish.distribution(),
            components.join(", ")
        )?,
        PublishOutcome::Unchanged => {}
    }
    Ok(())
}
