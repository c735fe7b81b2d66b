//! Snapshot values and the `<source>+r<revision>` naming convention.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

use crate::engine::RepositoryEngine;
use crate::error::Result;

static REVISION_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<source>.+)\+r(?P<revision>[0-9]+)$").expect("static regex is valid")
});

/// Builds the snapshot name for `revision` of the source called `source`.
///
/// ```
/// assert_eq!(aptrev::snapshot::revision_name("sw1", 3), "sw1+r3");
/// ```
pub fn revision_name(source: &str, revision: u64) -> String {
    format!("{}+r{}", source, revision)
}

/// Splits a revisioned snapshot name into its source name and revision.
///
/// Returns `None` for names that do not follow the convention, such as
/// externally managed snapshots.
pub fn parse_revision(name: &str) -> Option<(&str, u64)> {
    let captures = REVISION_NAME.captures(name)?;
    let source = captures.name("source")?.as_str();
    let revision = captures.name("revision")?.as_str().parse().ok()?;
    Some((source, revision))
}

/// Whether `name` follows the revision convention (and is therefore owned by us).
pub fn is_revisioned(name: &str) -> bool {
    parse_revision(name).is_some()
}

/// One revision of a content source.
///
/// A temporary snapshot exists in the engine but has not been retained by its
/// owner yet; it must either be retained or discarded before the operation
/// that created it returns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub name: String,
    pub revision: u64,
    pub temporary: bool,
}

impl Snapshot {
    /// A retained snapshot.
    pub fn new(name: impl Into<String>, revision: u64) -> Self {
        Self {
            name: name.into(),
            revision,
            temporary: false,
        }
    }

    /// A freshly cut snapshot that is eligible for deletion.
    pub fn temporary(name: impl Into<String>, revision: u64) -> Self {
        Self {
            name: name.into(),
            revision,
            temporary: true,
        }
    }

    /// The synthetic revision-0 snapshot a source has before its first one.
    pub fn baseline() -> Self {
        Self::new(String::new(), 0)
    }

    /// A retained snapshot known only by name; unrevisioned names get revision 0.
    pub fn from_name(name: &str) -> Self {
        let revision = parse_revision(name).map_or(0, |(_, revision)| revision);
        Self::new(name, revision)
    }

    pub fn is_baseline(&self) -> bool {
        self.revision == 0 && self.name.is_empty()
    }

    /// Drops the snapshot through the engine if it is still temporary.
    ///
    /// Retained snapshots are left untouched.
    pub fn discard(&self, engine: &dyn RepositoryEngine) -> Result<()> {
        if !self.temporary {
            return Ok(());
        }
        log::debug!("dropping unretained snapshot {}", self.name);
        engine.snapshot_drop(&self.name, true)
    }
}

impl fmt::Display for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_baseline() {
            write!(f, "(none)")
        } else {
            write!(f, "{}", self.name)
        }
    }
}

/// A retained change: the rendered difference between two snapshots.
///
/// `rendered` may be empty when the change only concerns which sources a
/// merge was built from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diff {
    pub rendered: String,
    pub old: Snapshot,
    pub new: Snapshot,
}
