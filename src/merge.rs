//! # Merge Reconciliation
//!
//! A merge publication is rebuilt source by source. The lineage of the live
//! merge snapshot says which revision of every constituent was published; each
//! configured source is then compared with that record:
//!
//! | published lineage | action                                          |
//! |-------------------|-------------------------------------------------|
//! | missing           | ask whether to include the newest snapshot       |
//! | same revision     | carry the newest snapshot forward                |
//! | older revision    | diff; ask only when the content really changed   |
//!
//! Constituents that are still in the lineage but no longer configured are
//! offered for removal. The chosen snapshots are merged, in configuration
//! order, into a temporary candidate for the next merge revision. Whether the
//! candidate is published (or dropped again) is up to [`crate::publish`].

use std::collections::BTreeMap;

use crate::engine::{LineageKind, RepositoryEngine};
use crate::error::Result;
use crate::snapshot::{parse_revision, Snapshot};
use crate::source::{SourceId, SourceRegistry};
use crate::ui::{Decision, DecisionSurface};

/// The snapshot-derived constituents of `snapshot`, keyed by the name of the
/// source that owns them.
///
/// Revisioned snapshots are keyed by their source name, externally managed
/// ones by their full name. Entries built directly from mirrors or
/// repositories cannot be reconciled and are skipped. Engine order is kept.
pub fn published_lineage(
    engine: &dyn RepositoryEngine,
    snapshot: &str,
) -> Result<Vec<(String, Snapshot)>> {
    let lineage = engine
        .snapshot_sources(snapshot)?
        .into_iter()
        .filter(|entry| entry.kind == LineageKind::Snapshot)
        .map(|entry| {
            let key = match parse_revision(&entry.name) {
                Some((source, _)) => source.to_string(),
                None => entry.name.clone(),
            };
            (key, Snapshot::from_name(&entry.name))
        })
        .collect();
    Ok(lineage)
}

/// Order-independent view of a lineage, used to detect composition changes.
pub fn lineage_map(lineage: Vec<(String, Snapshot)>) -> BTreeMap<String, Snapshot> {
    lineage.into_iter().collect()
}

fn take_published(lineage: &mut Vec<(String, Snapshot)>, source: &str) -> Option<Snapshot> {
    let position = lineage
        .iter()
        .position(|(key, snapshot)| key == source || snapshot.name == source)?;
    Some(lineage.remove(position).1)
}

/// Builds the next publication candidate of the merge `id` against the live
/// snapshot `published`.
///
/// Returns `Ok(None)` when the administrator aborted or nothing is left to
/// merge; in both cases no snapshot was created.
pub fn reconcile(
    registry: &mut SourceRegistry,
    id: SourceId,
    published: &str,
    engine: &dyn RepositoryEngine,
    ui: &mut dyn DecisionSurface,
) -> Result<Option<Snapshot>> {
    let merge_name = registry.get(id).name().to_string();
    let constituents = registry.get(id).constituents().to_vec();
    let latest = registry.get(id).latest();
    let mut lineage = published_lineage(engine, published)?;
    let mut chosen: Vec<Snapshot> = Vec::with_capacity(constituents.len());

    for constituent in constituents {
        let source = registry.get(constituent).name().to_string();
        let newest = registry.require_current(constituent, engine)?;

        match take_published(&mut lineage, &source) {
            None => {
                let info = engine.snapshot_info(&newest.name)?;
                match ui.include_snapshot(&newest, &info)? {
                    Decision::Keep(snapshot) => chosen.push(snapshot),
                    Decision::Reject => log::info!("leaving {} out of {}", newest, merge_name),
                    Decision::Abort => return Ok(None),
                }
            }
            Some(old) if old.name == newest.name || old.revision == newest.revision => {
                chosen.push(newest)
            }
            Some(old) => match engine.snapshot_diff(&old.name, &newest.name)? {
                None => {
                    log::debug!("{} and {} have the same content", old, newest);
                    chosen.push(newest);
                }
                Some(diff) => match ui.update_snapshot(&old, &newest, &diff, &source)? {
                    Decision::Keep(snapshot) => chosen.push(snapshot),
                    Decision::Reject => chosen.push(old),
                    Decision::Abort => {
                        log::info!("reconciliation of {} aborted", merge_name);
                        return Ok(None);
                    }
                },
            },
        }
    }

    for (_, snapshot) in lineage {
        let info = engine.snapshot_info(&snapshot.name)?;
        match ui.remove_snapshot(&snapshot, &info)? {
            Decision::Keep(kept) => chosen.push(kept),
            Decision::Reject => log::info!("removing {} from {}", snapshot, merge_name),
            Decision::Abort => return Ok(None),
        }
    }

    if chosen.is_empty() {
        log::warn!("nothing left to merge into {}", merge_name);
        return Ok(None);
    }

    let (_, candidate) = registry.get(id).revisions().new_revision()?;
    let names: Vec<String> = chosen.into_iter().map(|snapshot| snapshot.name).collect();
    engine.snapshot_merge(&candidate.name, &names, latest)?;
    Ok(Some(candidate))
}
