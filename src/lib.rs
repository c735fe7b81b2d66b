//! # aptrev Library
//!
//! This library keeps package repository publications reproducible: instead of
//! mutating a live repository, every change is captured in an immutable,
//! revision-numbered snapshot and publications are switched from one snapshot
//! to the next. It is designed to be used by the `aptrev` command-line tool
//! and drives an [aptly](https://www.aptly.info/) installation through its CLI.
//!
//! ## Quick Example
//!
//! ```
//! use aptrev::config::{self, SourceSpec};
//!
//! let config = config::parse(r#"
//! publish:
//!   - alias: test-distro
//!     destination: s3:apt:mon
//!     distribution: distro
//!     source: !mirror debian
//! "#).unwrap();
//!
//! let entry = &config.publish[0];
//! assert_eq!(entry.components, vec![("main".to_string(), SourceSpec::Mirror("debian".to_string()))]);
//! ```
//!
//! ## Core Concepts
//!
//! - **Snapshots (`snapshot`, `revision`)**: every content source owns a
//!   sequence of snapshots named `<source>+r<N>`. New revisions are cut
//!   speculatively and only kept when the engine reports a difference.
//! - **Content sources (`source`)**: mirrors, local repos, externally fixed
//!   snapshots and merges of those, held in a per-invocation registry.
//! - **Merge reconciliation (`merge`)**: rebuilds a merge against the lineage
//!   of its live snapshot, asking about every source that was added, changed
//!   or dropped.
//! - **Publications (`publish`)**: decide per component whether the live
//!   snapshot is switched to the reconciled candidate.
//! - **Decision surface (`ui`)**: interactive prompts or batch defaults.
//! - **Repository engine (`engine`, `aptly`)**: every physical operation goes
//!   through the `RepositoryEngine` trait.
//!
//! ## Execution Flow
//!
//! [`app::App`] loads the configuration, links all sources against the
//! engine's inventory and then runs one of three passes:
//!
//! 1.  **update**: refresh mirrors, snapshot mirrors and repos, report changes.
//! 2.  **publish**: reconcile and switch publications.
//! 3.  **run**: both, publication by publication.

pub mod app;
pub mod aptly;
pub mod config;
pub mod engine;
pub mod error;
pub mod merge;
pub mod output;
pub mod publish;
pub mod revision;
pub mod snapshot;
pub mod source;
pub mod ui;

#[cfg(test)]
mod revision_proptest;
