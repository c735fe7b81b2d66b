//! Property-based tests for snapshot naming and revision sequences.
//!
//! A source's revisions must stay contiguous from 1 no matter how many
//! speculative candidates are thrown away in between.

#[cfg(test)]
mod proptest_tests {
    use crate::engine::{LineageEntry, Publication, PublishRequest, RepositoryEngine};
    use crate::error::Result;
    use crate::revision::Revisions;
    use crate::snapshot::{parse_revision, revision_name, Snapshot};
    use proptest::prelude::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    /// Reports the next diff as changed or identical on demand and records
    /// dropped snapshots.
    #[derive(Default)]
    struct DiffOracle {
        changed: AtomicBool,
        dropped: Mutex<Vec<String>>,
    }

    impl RepositoryEngine for DiffOracle {
        fn mirrors(&self) -> Result<Vec<String>> {
            Ok(vec![])
        }
        fn repos(&self) -> Result<Vec<String>> {
            Ok(vec![])
        }
        fn snapshots(&self) -> Result<Vec<String>> {
            Ok(vec![])
        }
        fn mirror_update(&self, _name: &str, _quiet: bool) -> Result<()> {
            Ok(())
        }
        fn snapshot_from_mirror(&self, _snapshot: &str, _mirror: &str) -> Result<()> {
            Ok(())
        }
        fn snapshot_from_repo(&self, _snapshot: &str, _repo: &str) -> Result<()> {
            Ok(())
        }
        fn snapshot_merge(&self, _name: &str, _sources: &[String], _latest: bool) -> Result<()> {
            Ok(())
        }
        fn snapshot_diff(&self, _old: &str, _new: &str) -> Result<Option<String>> {
            Ok(self.changed.load(Ordering::SeqCst).then(|| "changed".to_string()))
        }
        fn snapshot_drop(&self, name: &str, _check: bool) -> Result<()> {
            self.dropped.lock().unwrap().push(name.to_string());
            Ok(())
        }
        fn snapshot_info(&self, name: &str) -> Result<String> {
            Ok(name.to_string())
        }
        fn snapshot_sources(&self, _name: &str) -> Result<Vec<LineageEntry>> {
            Ok(vec![])
        }
        fn publication(&self, _target: &str, _distribution: &str) -> Result<Option<Publication>> {
            Ok(None)
        }
        fn publish(&self, _request: &PublishRequest) -> Result<()> {
            Ok(())
        }
        fn switch(&self, _distribution: &str, _target: &str, _snapshot: &str) -> Result<()> {
            Ok(())
        }
        fn switch_components(
            &self,
            _distribution: &str,
            _target: &str,
            _changes: &[(String, String)],
        ) -> Result<()> {
            Ok(())
        }
    }

    proptest! {
        /// Property: a built revision name parses back to its parts
        #[test]
        fn revision_name_parses_back(source in "[a-z][a-z0-9._-]{0,20}", revision in 0u64..100_000) {
            let name = revision_name(&source, revision);
            prop_assert_eq!(parse_revision(&name), Some((source.as_str(), revision)));
        }

        /// Property: names without a revision suffix are never claimed
        #[test]
        fn plain_names_are_not_revisioned(name in "[a-z][a-z0-9._-]{0,20}") {
            prop_assert_eq!(parse_revision(&name), None);
            prop_assert_eq!(Snapshot::from_name(&name).revision, 0);
        }

        /// Property: retained revisions are contiguous from 1 whatever the
        /// engine reports for each speculative candidate, and every candidate
        /// that is not kept gets dropped
        #[test]
        fn retained_revisions_are_contiguous(changes in proptest::collection::vec(any::<bool>(), 0..40)) {
            let engine = DiffOracle::default();
            let mut revisions = Revisions::new("src");
            let mut expected_drops = Vec::new();
            for changed in &changes {
                engine.changed.store(*changed, Ordering::SeqCst);
                let (current, candidate) = revisions.new_revision().unwrap();
                prop_assert_eq!(candidate.revision, current.revision + 1);
                prop_assert!(candidate.temporary);
                // The first snapshot of a source is kept without a diff.
                let kept = current.revision == 0 || *changed;
                if !kept {
                    expected_drops.push(candidate.name.clone());
                }

                let diff = revisions.retain_or_discard(&engine, current, candidate).unwrap();

                prop_assert_eq!(diff.is_some(), kept);
                if let Some(diff) = diff {
                    prop_assert!(!diff.new.temporary);
                }
            }

            let kept = match changes.split_first() {
                Some((_, rest)) => 1 + rest.iter().filter(|c| **c).count() as u64,
                None => 0,
            };
            let numbers: Vec<u64> = revisions.snapshots().iter().map(|s| s.revision).collect();
            prop_assert_eq!(numbers, (1..=kept).collect::<Vec<_>>());
            for snapshot in revisions.snapshots() {
                prop_assert_eq!(&snapshot.name, &revision_name("src", snapshot.revision));
            }
            let dropped = engine.dropped.lock().unwrap().clone();
            prop_assert_eq!(dropped, expected_drops);
        }

        /// Property: discovery never reuses a revision below the highest one found
        #[test]
        fn discovered_candidate_exceeds_every_revision(found in proptest::collection::btree_set(1u64..500, 0..20)) {
            let inventory: Vec<String> = found.iter().map(|r| revision_name("src", *r)).collect();
            let revisions = Revisions::discover("src", &inventory);
            let (_, candidate) = revisions.new_revision().unwrap();
            prop_assert!(found.iter().all(|r| *r < candidate.revision));
        }
    }
}
