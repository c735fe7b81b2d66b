//! # Publications
//!
//! A `Publish` binds components to content sources at one
//! `(target, distribution)`. Publishing either creates the publication from
//! scratch or walks its components and decides, one at a time, whether the
//! live snapshot should be switched to the source's candidate.
//!
//! Single-component publications are switched with one call and the superseded
//! revisioned snapshot is dropped. Publications with several components are
//! switched in one batched call and superseded snapshots are left in place.

use std::collections::{BTreeSet, HashSet};

use crate::config::PublishEntry;
use crate::engine::{Publication, PublishRequest, RepositoryEngine};
use crate::error::{Error, Result};
use crate::merge::{lineage_map, published_lineage};
use crate::snapshot::{is_revisioned, Diff, Snapshot};
use crate::source::{SourceId, SourceRegistry};
use crate::ui::{DecisionSurface, SwitchContext};

/// What a publish pass did to one publication.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishOutcome {
    /// The publication did not exist and was created.
    Initial,
    /// These components were switched to new snapshots.
    Switched(Vec<String>),
    /// Nothing was changed.
    Unchanged,
}

/// One configured publication.
#[derive(Debug, Clone)]
pub struct Publish {
    alias: String,
    target: String,
    distribution: String,
    origin: Option<String>,
    architectures: Vec<String>,
    components: Vec<(String, SourceId)>,
}

impl Publish {
    /// Registers the sources of `entry` and binds them to its components.
    pub fn from_entry(entry: &PublishEntry, registry: &mut SourceRegistry) -> Result<Self> {
        let mut components = Vec::with_capacity(entry.components.len());
        for (component, spec) in &entry.components {
            components.push((component.clone(), registry.add(spec)?));
        }

        Ok(Self {
            alias: entry.alias.clone(),
            target: entry.destination.clone(),
            distribution: entry.distribution.clone(),
            origin: entry.origin.clone(),
            architectures: entry.architectures.clone(),
            components,
        })
    }

    pub fn alias(&self) -> &str {
        &self.alias
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn distribution(&self) -> &str {
        &self.distribution
    }

    /// Component names and their sources, in configuration order.
    pub fn components(&self) -> &[(String, SourceId)] {
        &self.components
    }

    fn context(&self, component: &str) -> SwitchContext {
        SwitchContext {
            alias: self.alias.clone(),
            target: self.target.clone(),
            distribution: self.distribution.clone(),
            component: component.to_string(),
        }
    }

    /// Updates every mirror and repo behind this publication that is not in
    /// `seen` yet.
    pub fn update_all(
        &self,
        registry: &mut SourceRegistry,
        engine: &dyn RepositoryEngine,
        ui: &mut dyn DecisionSurface,
        seen: &mut HashSet<SourceId>,
    ) -> Result<Vec<(String, Diff)>> {
        let mut diffs = Vec::new();
        for (_, id) in &self.components {
            diffs.extend(registry.update_all(*id, engine, ui, seen)?);
        }
        Ok(diffs)
    }

    /// Brings the live publication in line with the configured sources.
    pub fn publish(
        &self,
        registry: &mut SourceRegistry,
        engine: &dyn RepositoryEngine,
        ui: &mut dyn DecisionSurface,
    ) -> Result<PublishOutcome> {
        let Some(live) = engine.publication(&self.target, &self.distribution)? else {
            self.publish_initially(registry, engine)?;
            return Ok(PublishOutcome::Initial);
        };
        self.check_components(&live)?;

        if self.components.len() < 2 {
            self.publish_component(&live, registry, engine, ui)
        } else {
            self.publish_components(&live, registry, engine, ui)
        }
    }

    fn check_components(&self, live: &Publication) -> Result<()> {
        let published: BTreeSet<&str> = live.components.iter().map(|(c, _)| c.as_str()).collect();
        let configured: BTreeSet<&str> = self.components.iter().map(|(c, _)| c.as_str()).collect();
        if published == configured {
            return Ok(());
        }
        let join = |set: BTreeSet<&str>| set.into_iter().collect::<Vec<_>>().join(", ");
        Err(Error::ComponentMismatch {
            target: self.target.clone(),
            distribution: self.distribution.clone(),
            live: join(published),
            configured: join(configured),
        })
    }

    fn publish_initially(&self, registry: &mut SourceRegistry, engine: &dyn RepositoryEngine) -> Result<()> {
        let mut components = Vec::with_capacity(self.components.len());
        for (component, id) in &self.components {
            let snapshot = registry.require_current(*id, engine)?;
            components.push((component.clone(), snapshot.name));
        }
        log::info!(
            "creating publication {}/{} for {}",
            self.target,
            self.distribution,
            self.alias
        );
        engine.publish(&PublishRequest {
            target: self.target.clone(),
            distribution: self.distribution.clone(),
            components,
            origin: self.origin.clone(),
            architectures: self.architectures.clone(),
            acquire_by_hash: true,
        })
    }

    fn publish_component(
        &self,
        live: &Publication,
        registry: &mut SourceRegistry,
        engine: &dyn RepositoryEngine,
        ui: &mut dyn DecisionSurface,
    ) -> Result<PublishOutcome> {
        let Some((component, id)) = self.components.first() else {
            return Ok(PublishOutcome::Unchanged);
        };
        let published = live.snapshot_for(component).unwrap_or_default();
        let Some(wanted) = self.define_switch(component, *id, published, registry, engine, ui)? else {
            return Ok(PublishOutcome::Unchanged);
        };

        if let Err(err) = engine.switch(&self.distribution, &self.target, &wanted.new.name) {
            abandon(std::slice::from_ref(&wanted.new), engine);
            return Err(err);
        }
        registry.retain(*id, wanted.new);
        if is_revisioned(&wanted.old.name) {
            if let Err(err) = engine.snapshot_drop(&wanted.old.name, false) {
                log::warn!("could not drop superseded snapshot {}: {}", wanted.old, err);
            }
        }
        Ok(PublishOutcome::Switched(vec![component.clone()]))
    }

    fn publish_components(
        &self,
        live: &Publication,
        registry: &mut SourceRegistry,
        engine: &dyn RepositoryEngine,
        ui: &mut dyn DecisionSurface,
    ) -> Result<PublishOutcome> {
        let mut switching: Vec<(String, SourceId, Snapshot)> = Vec::new();
        for (component, id) in &self.components {
            let published = live.snapshot_for(component).unwrap_or_default();
            match self.define_switch(component, *id, published, registry, engine, ui) {
                Ok(Some(wanted)) => switching.push((component.clone(), *id, wanted.new)),
                Ok(None) => {}
                Err(err) => {
                    abandon(switching.iter().map(|(_, _, snapshot)| snapshot), engine);
                    return Err(err);
                }
            }
        }
        if switching.is_empty() {
            return Ok(PublishOutcome::Unchanged);
        }

        let changes: Vec<(String, String)> = switching
            .iter()
            .map(|(component, _, snapshot)| (component.clone(), snapshot.name.clone()))
            .collect();
        if let Err(err) = engine.switch_components(&self.distribution, &self.target, &changes) {
            abandon(switching.iter().map(|(_, _, snapshot)| snapshot), engine);
            return Err(err);
        }

        let mut switched = Vec::with_capacity(switching.len());
        for (component, id, snapshot) in switching {
            registry.retain(id, snapshot);
            switched.push(component);
        }
        Ok(PublishOutcome::Switched(switched))
    }

    /// Decides whether `component` should move from `published` to the
    /// source's candidate; returns the change to apply.
    ///
    /// Every rejected temporary candidate is dropped before returning, and so
    /// is one left behind by a failing engine call or prompt. A candidate
    /// whose content equals the live snapshot but whose lineage differs is
    /// switched without asking the decision surface and without
    /// `skip_switch`.
    fn define_switch(
        &self,
        component: &str,
        id: SourceId,
        published: &str,
        registry: &mut SourceRegistry,
        engine: &dyn RepositoryEngine,
        ui: &mut dyn DecisionSurface,
    ) -> Result<Option<Diff>> {
        let context = self.context(component);
        ui.prepare_switch(&context);

        let Some(candidate) = registry.publication_candidate(id, published, engine, ui)? else {
            ui.skip_switch();
            return Ok(None);
        };
        if candidate.name == published {
            ui.skip_switch();
            candidate.discard(engine)?;
            return Ok(None);
        }

        match judge_switch(&context, published, &candidate, engine, ui) {
            Ok(Some(rendered)) => Ok(Some(Diff {
                rendered,
                old: Snapshot::from_name(published),
                new: candidate,
            })),
            Ok(None) => {
                candidate.discard(engine)?;
                Ok(None)
            }
            Err(err) => {
                abandon(std::slice::from_ref(&candidate), engine);
                Err(err)
            }
        }
    }
}

/// Compares `candidate` with the live snapshot. `Some` carries the rendered
/// difference of a wanted switch, empty when only the lineage moved.
fn judge_switch(
    context: &SwitchContext,
    published: &str,
    candidate: &Snapshot,
    engine: &dyn RepositoryEngine,
    ui: &mut dyn DecisionSurface,
) -> Result<Option<String>> {
    match engine.snapshot_diff(published, &candidate.name)? {
        None => {
            let before = lineage_map(published_lineage(engine, published)?);
            let after = lineage_map(published_lineage(engine, &candidate.name)?);
            if before == after {
                ui.skip_switch();
                return Ok(None);
            }
            log::info!(
                "{} has the same content as {} but different sources",
                candidate,
                published
            );
            Ok(Some(String::new()))
        }
        Some(rendered) => Ok(ui.switch(&rendered, context)?.then_some(rendered)),
    }
}

/// Drops temporary candidates on an error path. Drop failures are logged so
/// the original error is the one reported.
fn abandon<'a>(candidates: impl IntoIterator<Item = &'a Snapshot>, engine: &dyn RepositoryEngine) {
    for candidate in candidates {
        if let Err(err) = candidate.discard(engine) {
            log::warn!("could not drop unretained snapshot {}: {}", candidate, err);
        }
    }
}
