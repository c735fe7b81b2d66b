//! Revision lifecycle of one content source.
//!
//! Every source owns an ordered sequence of snapshots named
//! `<source>+r<revision>`. A new revision is always cut speculatively and is
//! only kept when it differs from the current one, so the sequence grows on
//! real change only.

use crate::engine::RepositoryEngine;
use crate::error::{Error, Result};
use crate::snapshot::{parse_revision, revision_name, Diff, Snapshot};

/// The retained snapshots of one source, ordered by revision.
#[derive(Debug, Clone, Default)]
pub struct Revisions {
    owner: String,
    snapshots: Vec<Snapshot>,
}

impl Revisions {
    /// An empty sequence for a source that has never been snapshotted.
    pub fn new(owner: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            snapshots: Vec::new(),
        }
    }

    /// Picks the snapshots belonging to `owner` out of the engine's inventory.
    pub fn discover(owner: impl Into<String>, inventory: &[String]) -> Self {
        let owner = owner.into();
        let mut snapshots: Vec<Snapshot> = inventory
            .iter()
            .filter_map(|name| match parse_revision(name) {
                Some((source, revision)) if source == owner => Some(Snapshot::new(name, revision)),
                _ => None,
            })
            .collect();
        snapshots.sort_by_key(|s| s.revision);
        snapshots.dedup_by_key(|s| s.revision);
        Self { owner, snapshots }
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn snapshots(&self) -> &[Snapshot] {
        &self.snapshots
    }

    /// The snapshot with the highest revision.
    pub fn current(&self) -> Option<&Snapshot> {
        self.snapshots.last()
    }

    /// Returns the current snapshot (or the revision-0 baseline) together with
    /// a temporary candidate for the next revision.
    pub fn new_revision(&self) -> Result<(Snapshot, Snapshot)> {
        let current = self.current().cloned().unwrap_or_else(Snapshot::baseline);
        let revision = current
            .revision
            .checked_add(1)
            .ok_or_else(|| Error::RevisionExhausted {
                source_name: self.owner.clone(),
            })?;
        let candidate = Snapshot::temporary(revision_name(&self.owner, revision), revision);
        Ok((current, candidate))
    }

    /// Marks `snapshot` as retained and appends it to the sequence.
    ///
    /// Snapshots that are already part of the sequence are left alone.
    pub fn retain(&mut self, mut snapshot: Snapshot) -> Snapshot {
        snapshot.temporary = false;
        if let Some(existing) = self.snapshots.iter().find(|s| s.name == snapshot.name) {
            return existing.clone();
        }
        debug_assert!(self.current().map_or(true, |c| c.revision < snapshot.revision));
        log::info!("retained snapshot {}", snapshot.name);
        self.snapshots.push(snapshot.clone());
        snapshot
    }

    /// Keeps `candidate` if it differs from `current`, otherwise drops it.
    ///
    /// The first snapshot of a source is always kept and reported against the
    /// baseline using the engine's description of the new snapshot.
    pub fn retain_or_discard(
        &mut self,
        engine: &dyn RepositoryEngine,
        current: Snapshot,
        candidate: Snapshot,
    ) -> Result<Option<Diff>> {
        if current.revision == 0 {
            let rendered = engine.snapshot_info(&candidate.name)?;
            let new = self.retain(candidate);
            return Ok(Some(Diff {
                rendered,
                old: current,
                new,
            }));
        }

        match engine.snapshot_diff(&current.name, &candidate.name)? {
            None => {
                log::debug!("{} is identical to {}", candidate.name, current.name);
                candidate.discard(engine)?;
                Ok(None)
            }
            Some(rendered) => {
                let new = self.retain(candidate);
                Ok(Some(Diff {
                    rendered,
                    old: current,
                    new,
                }))
            }
        }
    }
}
