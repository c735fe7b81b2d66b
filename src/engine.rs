//! # Repository Engine Seam
//!
//! All physical work (cutting, diffing, merging and dropping snapshots,
//! refreshing mirrors, creating and switching publications) is delegated to a
//! `RepositoryEngine`. The reconciliation logic in this crate only decides
//! *what* to do with the engine's answers.
//!
//! The production implementation is [`crate::aptly::AptlyEngine`]; tests swap
//! in a scripted implementation to assert the exact sequence of calls.

use crate::error::Result;

/// How a snapshot listed in another snapshot's lineage was created.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineageKind {
    /// Derived from another snapshot (the only kind reconciliation can use).
    Snapshot,
    /// Created directly from a mirror.
    Mirror,
    /// Created directly from a local repository.
    Repo,
}

/// One constituent of a snapshot's lineage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineageEntry {
    pub kind: LineageKind,
    pub name: String,
}

impl LineageEntry {
    pub fn snapshot(name: impl Into<String>) -> Self {
        Self {
            kind: LineageKind::Snapshot,
            name: name.into(),
        }
    }
}

/// The live state of a publication: component name to snapshot name.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Publication {
    pub components: Vec<(String, String)>,
}

impl Publication {
    pub fn snapshot_for(&self, component: &str) -> Option<&str> {
        self.components
            .iter()
            .find(|(name, _)| name == component)
            .map(|(_, snapshot)| snapshot.as_str())
    }
}

/// Everything needed to create a publication from scratch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishRequest {
    pub target: String,
    pub distribution: String,
    /// Component name to snapshot name, in configuration order.
    pub components: Vec<(String, String)>,
    pub origin: Option<String>,
    pub architectures: Vec<String>,
    pub acquire_by_hash: bool,
}

/// Trait for repository engine operations - allows scripting in tests
pub trait RepositoryEngine: Send + Sync {
    /// Names of all mirrors the engine manages.
    fn mirrors(&self) -> Result<Vec<String>>;

    /// Names of all local repositories the engine manages.
    fn repos(&self) -> Result<Vec<String>>;

    /// Names of all existing snapshots.
    fn snapshots(&self) -> Result<Vec<String>>;

    /// Refreshes a mirror from upstream; `quiet` suppresses progress output.
    fn mirror_update(&self, name: &str, quiet: bool) -> Result<()>;

    /// Creates `snapshot` from the current state of `mirror`.
    fn snapshot_from_mirror(&self, snapshot: &str, mirror: &str) -> Result<()>;

    /// Creates `snapshot` from the current state of the local repository `repo`.
    fn snapshot_from_repo(&self, snapshot: &str, repo: &str) -> Result<()>;

    /// Creates `name` by merging `sources` in order.
    ///
    /// With `latest`, the newest package version wins on conflicts.
    fn snapshot_merge(&self, name: &str, sources: &[String], latest: bool) -> Result<()>;

    /// Renders the difference between two snapshots, `None` when identical.
    fn snapshot_diff(&self, old: &str, new: &str) -> Result<Option<String>>;

    /// Drops a snapshot; with `check == false` failures are tolerated.
    fn snapshot_drop(&self, name: &str, check: bool) -> Result<()>;

    /// Human readable description of a snapshot, including its packages.
    fn snapshot_info(&self, name: &str) -> Result<String>;

    /// The snapshots, mirrors and repositories `name` was built from.
    fn snapshot_sources(&self, name: &str) -> Result<Vec<LineageEntry>>;

    /// The live publication at `(target, distribution)`, if any.
    fn publication(&self, target: &str, distribution: &str) -> Result<Option<Publication>>;

    /// Creates a new publication.
    fn publish(&self, request: &PublishRequest) -> Result<()>;

    /// Switches a single-component publication to `snapshot`.
    fn switch(&self, distribution: &str, target: &str, snapshot: &str) -> Result<()>;

    /// Switches several components of a publication in one operation.
    fn switch_components(
        &self,
        distribution: &str,
        target: &str,
        changes: &[(String, String)],
    ) -> Result<()>;
}
