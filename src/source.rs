//! # Content Sources
//!
//! A content source is anything a publication component can point at:
//!
//! - **Mirror**: an engine mirror of an upstream repository; updating it
//!   refreshes the mirror before cutting a snapshot.
//! - **Repo**: an engine-managed local repository; updating it cuts a snapshot
//!   directly.
//! - **Fixed**: an externally managed snapshot that is never created, changed
//!   or dropped here. Its current snapshot is always revision 0.
//! - **Merge**: the combination of several other sources, reconciled against
//!   what is currently published (see [`crate::merge`]).
//!
//! Sources live in a `SourceRegistry` arena for the duration of one
//! invocation. Mirrors, repos and fixed snapshots are deduplicated by name,
//! so a mirror used by several publications is one source with one revision
//! sequence.

use std::collections::{HashMap, HashSet};

use crate::config::SourceSpec;
use crate::engine::RepositoryEngine;
use crate::error::{Error, Result};
use crate::merge;
use crate::revision::Revisions;
use crate::snapshot::{revision_name, Diff, Snapshot};
use crate::ui::DecisionSurface;

/// Index of a source inside its `SourceRegistry`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SourceId(usize);

/// The kind of a content source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    Mirror,
    Repo,
    Fixed,
    Merge,
}

impl SourceKind {
    pub fn label(self) -> &'static str {
        match self {
            SourceKind::Mirror => "mirror",
            SourceKind::Repo => "repo",
            SourceKind::Fixed => "snapshot",
            SourceKind::Merge => "merge",
        }
    }
}

#[derive(Debug, Clone)]
enum Variant {
    Mirror,
    Repo,
    Fixed,
    Merge { sources: Vec<SourceId>, latest: bool },
}

/// One named content source and the snapshots it owns.
#[derive(Debug, Clone)]
pub struct ContentSource {
    name: String,
    variant: Variant,
    revisions: Revisions,
}

impl ContentSource {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> SourceKind {
        match self.variant {
            Variant::Mirror => SourceKind::Mirror,
            Variant::Repo => SourceKind::Repo,
            Variant::Fixed => SourceKind::Fixed,
            Variant::Merge { .. } => SourceKind::Merge,
        }
    }

    /// Constituents of a merge, in configuration order; empty otherwise.
    pub fn constituents(&self) -> &[SourceId] {
        match &self.variant {
            Variant::Merge { sources, .. } => sources,
            _ => &[],
        }
    }

    /// Whether a merge prefers the newest package version on conflicts.
    pub fn latest(&self) -> bool {
        matches!(self.variant, Variant::Merge { latest: true, .. })
    }

    pub fn revisions(&self) -> &Revisions {
        &self.revisions
    }
}

/// Arena of all content sources of one invocation.
#[derive(Debug, Default)]
pub struct SourceRegistry {
    sources: Vec<ContentSource>,
    by_name: HashMap<(SourceKind, String), SourceId>,
    merge_specs: HashMap<String, SourceSpec>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: SourceId) -> &ContentSource {
        &self.sources[id.0]
    }

    pub fn ids(&self) -> impl Iterator<Item = SourceId> {
        (0..self.sources.len()).map(SourceId)
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Looks a source up by kind and name.
    pub fn find(&self, kind: SourceKind, name: &str) -> Option<SourceId> {
        self.by_name.get(&(kind, name.to_string())).copied()
    }

    fn insert(&mut self, kind: SourceKind, name: &str, variant: Variant) -> SourceId {
        let id = SourceId(self.sources.len());
        self.sources.push(ContentSource {
            name: name.to_string(),
            variant,
            revisions: Revisions::new(name),
        });
        self.by_name.insert((kind, name.to_string()), id);
        id
    }

    fn intern(&mut self, kind: SourceKind, name: &str, variant: Variant) -> SourceId {
        match self.find(kind, name) {
            Some(id) => id,
            None => self.insert(kind, name, variant),
        }
    }

    /// Registers the source described by `spec`, reusing existing entries.
    ///
    /// A merge name may be used several times only with an identical
    /// definition.
    pub fn add(&mut self, spec: &SourceSpec) -> Result<SourceId> {
        match spec {
            SourceSpec::Mirror(name) => Ok(self.intern(SourceKind::Mirror, name, Variant::Mirror)),
            SourceSpec::Repo(name) => Ok(self.intern(SourceKind::Repo, name, Variant::Repo)),
            SourceSpec::Snapshot(name) => Ok(self.intern(SourceKind::Fixed, name, Variant::Fixed)),
            SourceSpec::Merge {
                name,
                sources,
                latest,
            } => {
                if let Some(known) = self.merge_specs.get(name) {
                    if known != spec {
                        return Err(Error::ConfigParse {
                            message: format!("merge {} is defined twice with different sources", name),
                            hint: None,
                        });
                    }
                    if let Some(id) = self.find(SourceKind::Merge, name) {
                        return Ok(id);
                    }
                }
                let constituents = sources
                    .iter()
                    .map(|source| self.add(source))
                    .collect::<Result<Vec<_>>>()?;
                self.merge_specs.insert(name.clone(), spec.clone());
                Ok(self.insert(
                    SourceKind::Merge,
                    name,
                    Variant::Merge {
                        sources: constituents,
                        latest: *latest,
                    },
                ))
            }
        }
    }

    /// Checks every mirror and repo against the engine's inventory and
    /// discovers the snapshots each source already owns.
    pub fn link(&mut self, engine: &dyn RepositoryEngine) -> Result<()> {
        let mirrors: HashSet<String> = engine.mirrors()?.into_iter().collect();
        let repos: HashSet<String> = engine.repos()?.into_iter().collect();
        let snapshots = engine.snapshots()?;

        for source in &mut self.sources {
            match source.variant {
                Variant::Mirror if !mirrors.contains(&source.name) => {
                    return Err(Error::UnknownMirror {
                        name: source.name.clone(),
                    });
                }
                Variant::Repo if !repos.contains(&source.name) => {
                    return Err(Error::UnknownRepo {
                        name: source.name.clone(),
                    });
                }
                Variant::Fixed => continue,
                _ => {}
            }
            source.revisions = Revisions::discover(source.name.clone(), &snapshots);
            log::debug!(
                "{} {} has {} snapshot(s)",
                source.kind().label(),
                source.name,
                source.revisions.snapshots().len()
            );
        }
        Ok(())
    }

    /// Cuts a new revision of a mirror or repo, keeping it only on change.
    ///
    /// Fixed snapshots and merges have no update of their own and yield `None`.
    pub fn update(
        &mut self,
        id: SourceId,
        engine: &dyn RepositoryEngine,
        ui: &mut dyn DecisionSurface,
    ) -> Result<Option<Diff>> {
        let source = &mut self.sources[id.0];
        match source.variant {
            Variant::Mirror => {
                let name = source.name.clone();
                ui.mirror_update(&name, &|quiet| engine.mirror_update(&name, quiet))?;
                let (current, candidate) = source.revisions.new_revision()?;
                engine.snapshot_from_mirror(&candidate.name, &name)?;
                source.revisions.retain_or_discard(engine, current, candidate)
            }
            Variant::Repo => {
                let (current, candidate) = source.revisions.new_revision()?;
                engine.snapshot_from_repo(&candidate.name, &source.name)?;
                source.revisions.retain_or_discard(engine, current, candidate)
            }
            Variant::Fixed | Variant::Merge { .. } => Ok(None),
        }
    }

    /// Updates every mirror and repo reachable from `id`, each at most once
    /// per call of the owning pass (tracked in `seen`).
    ///
    /// Returns the retained changes in traversal order, paired with the name
    /// of the source that changed.
    pub fn update_all(
        &mut self,
        id: SourceId,
        engine: &dyn RepositoryEngine,
        ui: &mut dyn DecisionSurface,
        seen: &mut HashSet<SourceId>,
    ) -> Result<Vec<(String, Diff)>> {
        if !seen.insert(id) {
            return Ok(Vec::new());
        }
        let mut diffs = Vec::new();
        match self.get(id).variant.clone() {
            Variant::Merge { sources, .. } => {
                for source in sources {
                    diffs.extend(self.update_all(source, engine, ui, seen)?);
                }
            }
            _ => {
                if let Some(diff) = self.update(id, engine, ui)? {
                    diffs.push((self.get(id).name.clone(), diff));
                }
            }
        }
        Ok(diffs)
    }

    /// The current snapshot of a source, if it has one.
    ///
    /// A merge without any snapshot of its own is materialized once as
    /// revision 1 from the current snapshots of all its sources; the result is
    /// retained so later calls in the same run reuse it.
    pub fn current(&mut self, id: SourceId, engine: &dyn RepositoryEngine) -> Result<Option<Snapshot>> {
        let source = self.get(id);
        match &source.variant {
            Variant::Fixed => Ok(Some(Snapshot::new(source.name.clone(), 0))),
            Variant::Mirror | Variant::Repo => Ok(source.revisions.current().cloned()),
            Variant::Merge { .. } if source.revisions.current().is_some() => {
                Ok(source.revisions.current().cloned())
            }
            Variant::Merge { sources, latest } => {
                let (sources, latest) = (sources.clone(), *latest);
                let mut names = Vec::with_capacity(sources.len());
                for constituent in sources {
                    names.push(self.require_current(constituent, engine)?.name);
                }
                let name = revision_name(&self.get(id).name, 1);
                log::info!("materializing {} from {}", name, names.join(", "));
                engine.snapshot_merge(&name, &names, latest)?;
                let snapshot = self.sources[id.0].revisions.retain(Snapshot::new(name, 1));
                Ok(Some(snapshot))
            }
        }
    }

    /// Like [`current`](Self::current), failing when no snapshot exists.
    pub fn require_current(&mut self, id: SourceId, engine: &dyn RepositoryEngine) -> Result<Snapshot> {
        self.current(id, engine)?.ok_or_else(|| Error::NoSnapshot {
            source_name: self.get(id).name.clone(),
        })
    }

    /// The snapshot this source would like to publish instead of `published`.
    ///
    /// Merges reconcile their sources against the published lineage; all other
    /// sources simply offer their current snapshot.
    pub fn publication_candidate(
        &mut self,
        id: SourceId,
        published: &str,
        engine: &dyn RepositoryEngine,
        ui: &mut dyn DecisionSurface,
    ) -> Result<Option<Snapshot>> {
        match self.get(id).kind() {
            SourceKind::Merge => merge::reconcile(self, id, published, engine, ui),
            _ => self.current(id, engine),
        }
    }

    /// Records that a published candidate is now a retained snapshot of `id`.
    pub fn retain(&mut self, id: SourceId, snapshot: Snapshot) -> Snapshot {
        let source = &mut self.sources[id.0];
        match source.variant {
            Variant::Fixed => snapshot,
            _ => source.revisions.retain(snapshot),
        }
    }
}
