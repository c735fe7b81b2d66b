//! Shared test utilities for integration and E2E tests.
//!
//! The flow tests drive the library against a `ScriptedEngine`: a fake
//! repository engine that serves a static inventory and checks every other
//! call against a queue of expected calls, answering each with a scripted
//! reply. `ScriptedUi` answers reconciliation questions from a table of
//! decisions, defaulting to "yes".
//!
//! ## Usage
//!
//! ```rust,ignore
//! mod common;
//! use common::prelude::*;
//!
//! #[test]
//! fn test_example() {
//!     let engine = ScriptedEngine::new();
//!     engine.register_repo("pkgs", &[8]);
//!     let mut app = load_app(&engine, configs::SINGLE_REPO);
//!     engine.expect(&["snapshot_repo", "pkgs+r9", "pkgs"]);
//!     // ...
//!     engine.assert_done();
//! }
//! ```

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::io::{self, Write};
use std::sync::{Arc, Mutex};

use aptrev::app::App;
use aptrev::config;
use aptrev::engine::{LineageEntry, LineageKind, Publication, PublishRequest, RepositoryEngine};
use aptrev::error::{Error, Result};
use aptrev::snapshot::Snapshot;
use aptrev::ui::{Decision, DecisionSurface, SwitchContext};

/// Re-export commonly used test helpers for convenience.
pub mod prelude {
    #[allow(unused_imports)]
    pub use super::configs;
    #[allow(unused_imports)]
    pub use super::{load_app, Answer, Reply, ScriptedEngine, ScriptedUi, SharedOutput};
}

/// Common configuration documents.
pub mod configs {
    pub const SINGLE_MIRROR: &str = r#"
publish:
  - alias: 'test-distro'
    destination: s3:apt:mon
    distribution: distro
    component: main
    source: !mirror test
"#;

    pub const SINGLE_REPO: &str = r#"
publish:
  - alias: 'test-distro'
    destination: s3:apt:mon
    distribution: distro
    component: main
    source: !repo test
"#;

    pub const MERGE_THREE: &str = r#"
publish:
  - alias: 'test-distro'
    destination: s3:apt:mon
    distribution: distro
    component: main
    source:
      - !mirror software1
      - !mirror software2
      - !repo pkgs1
"#;

    pub const COMPONENTS: &str = r#"
publish:
  - alias: 'test-distro'
    destination: s3:apt:mon
    distribution: distro
    components:
      main: !snapshot.merge
        name: test-distro-main
        sources:
          - !mirror software1
          - !mirror software2
      extra: !repo pkgs1
"#;

    pub const CRON: &str = r#"
publish:
  - alias: 'test-distro'
    destination: s3:apt:mon
    distribution: distro
    component: main
    source:
    - !mirror sw1
    - !mirror sw2
  - alias: 'test2-distro'
    destination: s3:apt:man
    distribution: distro
    component: main
    source: !repo pkgs
"#;
}

/// Answer of a scripted engine call.
#[derive(Debug, Clone)]
pub enum Reply {
    Done,
    Text(String),
    Identical,
    Lineage(Vec<LineageEntry>),
    Fail(String),
}

#[derive(Default)]
struct EngineState {
    mirrors: Vec<String>,
    repos: Vec<String>,
    snapshots: Vec<String>,
    publications: HashMap<(String, String), Publication>,
    pending: VecDeque<(Vec<String>, Reply)>,
}

/// Fake engine checking calls against an expected sequence.
///
/// Clones share state, so a test can keep one handle while the `App` owns
/// another.
#[derive(Clone, Default)]
pub struct ScriptedEngine {
    state: Arc<Mutex<EngineState>>,
}

impl ScriptedEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_mirror(&self, name: &str, revisions: &[u64]) {
        let mut state = self.state.lock().unwrap();
        state.mirrors.push(name.to_string());
        for revision in revisions {
            state.snapshots.push(format!("{}+r{}", name, revision));
        }
    }

    pub fn register_repo(&self, name: &str, revisions: &[u64]) {
        let mut state = self.state.lock().unwrap();
        state.repos.push(name.to_string());
        for revision in revisions {
            state.snapshots.push(format!("{}+r{}", name, revision));
        }
    }

    pub fn register_snapshot(&self, name: &str) {
        self.state.lock().unwrap().snapshots.push(name.to_string());
    }

    pub fn register_publication(&self, target: &str, distribution: &str, components: &[(&str, &str)]) {
        let publication = Publication {
            components: components
                .iter()
                .map(|(c, s)| (c.to_string(), s.to_string()))
                .collect(),
        };
        self.state
            .lock()
            .unwrap()
            .publications
            .insert((target.to_string(), distribution.to_string()), publication);
    }

    pub fn schedule(&self, call: &[&str], reply: Reply) {
        let call = call.iter().map(|s| s.to_string()).collect();
        self.state.lock().unwrap().pending.push_back((call, reply));
    }

    pub fn expect(&self, call: &[&str]) {
        self.schedule(call, Reply::Done);
    }

    pub fn expect_text(&self, call: &[&str], text: &str) {
        self.schedule(call, Reply::Text(text.to_string()));
    }

    pub fn expect_identical(&self, old: &str, new: &str) {
        self.schedule(&["snapshot_diff", old, new], Reply::Identical);
    }

    pub fn expect_diff(&self, old: &str, new: &str, diff: &str) {
        self.expect_text(&["snapshot_diff", old, new], diff);
    }

    pub fn expect_lineage(&self, snapshot: &str, sources: &[&str]) {
        let lineage = sources.iter().map(|s| LineageEntry::snapshot(*s)).collect();
        self.schedule(&["snapshot_sources", snapshot], Reply::Lineage(lineage));
    }

    pub fn pending(&self) -> Vec<Vec<String>> {
        let state = self.state.lock().unwrap();
        state.pending.iter().map(|(call, _)| call.clone()).collect()
    }

    pub fn assert_done(&self) {
        assert_eq!(self.pending(), Vec::<Vec<String>>::new(), "scheduled calls were not made");
    }

    fn run(&self, call: Vec<String>) -> Result<Reply> {
        let (expected, reply) = self
            .state
            .lock()
            .unwrap()
            .pending
            .pop_front()
            .unwrap_or_else(|| panic!("unexpected engine call {:?}", call));
        assert_eq!(call, expected, "engine call out of order");
        match reply {
            Reply::Fail(stderr) => Err(Error::Engine {
                command: call.join(" "),
                stderr,
            }),
            other => Ok(other),
        }
    }

    fn run_text(&self, call: Vec<String>) -> Result<Option<String>> {
        match self.run(call)? {
            Reply::Text(text) => Ok(Some(text)),
            _ => Ok(None),
        }
    }
}

fn call(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|s| s.to_string()).collect()
}

impl RepositoryEngine for ScriptedEngine {
    fn mirrors(&self) -> Result<Vec<String>> {
        Ok(self.state.lock().unwrap().mirrors.clone())
    }

    fn repos(&self) -> Result<Vec<String>> {
        Ok(self.state.lock().unwrap().repos.clone())
    }

    fn snapshots(&self) -> Result<Vec<String>> {
        Ok(self.state.lock().unwrap().snapshots.clone())
    }

    fn mirror_update(&self, name: &str, quiet: bool) -> Result<()> {
        self.run(call(&["mirror_update", name, quiet.to_string().as_str()]))
            .map(|_| ())
    }

    fn snapshot_from_mirror(&self, snapshot: &str, mirror: &str) -> Result<()> {
        self.run(call(&["snapshot_mirror", snapshot, mirror])).map(|_| ())
    }

    fn snapshot_from_repo(&self, snapshot: &str, repo: &str) -> Result<()> {
        self.run(call(&["snapshot_repo", snapshot, repo])).map(|_| ())
    }

    fn snapshot_merge(&self, name: &str, sources: &[String], latest: bool) -> Result<()> {
        let mut parts = call(&["snapshot_merge", name, latest.to_string().as_str()]);
        parts.extend(sources.iter().cloned());
        self.run(parts).map(|_| ())
    }

    fn snapshot_diff(&self, old: &str, new: &str) -> Result<Option<String>> {
        self.run_text(call(&["snapshot_diff", old, new]))
    }

    fn snapshot_drop(&self, name: &str, check: bool) -> Result<()> {
        self.run(call(&["snapshot_drop", name, check.to_string().as_str()]))
            .map(|_| ())
    }

    fn snapshot_info(&self, name: &str) -> Result<String> {
        Ok(self
            .run_text(call(&["snapshot_info", name]))?
            .unwrap_or_default())
    }

    fn snapshot_sources(&self, name: &str) -> Result<Vec<LineageEntry>> {
        match self.run(call(&["snapshot_sources", name]))? {
            Reply::Lineage(lineage) => Ok(lineage),
            _ => Ok(Vec::new()),
        }
    }

    fn publication(&self, target: &str, distribution: &str) -> Result<Option<Publication>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .publications
            .get(&(target.to_string(), distribution.to_string()))
            .cloned())
    }

    fn publish(&self, request: &PublishRequest) -> Result<()> {
        let mut parts = call(&[
            "publish",
            request.target.as_str(),
            request.distribution.as_str(),
            request.origin.as_deref().unwrap_or("-"),
        ]);
        parts.extend(request.components.iter().map(|(c, s)| format!("{}={}", c, s)));
        parts.push(format!("architectures={}", request.architectures.join(",")));
        parts.push(format!("by-hash={}", request.acquire_by_hash));
        self.run(parts).map(|_| ())
    }

    fn switch(&self, distribution: &str, target: &str, snapshot: &str) -> Result<()> {
        self.run(call(&["switch", distribution, target, snapshot])).map(|_| ())
    }

    fn switch_components(&self, distribution: &str, target: &str, changes: &[(String, String)]) -> Result<()> {
        let mut parts = call(&["switch_components", distribution, target]);
        parts.extend(changes.iter().map(|(c, s)| format!("{}={}", c, s)));
        self.run(parts).map(|_| ())
    }
}

/// Lineage entry built from a mirror rather than a snapshot.
pub fn mirror_lineage(name: &str) -> LineageEntry {
    LineageEntry {
        kind: LineageKind::Mirror,
        name: name.to_string(),
    }
}

/// Scripted answer for `ScriptedUi`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Answer {
    Yes,
    No,
    Abort,
}

/// Decision surface answering from a table; unknown questions get "yes".
#[derive(Default)]
pub struct ScriptedUi {
    decisions: HashMap<(String, String), Answer>,
    pub asked: Vec<String>,
    pub skipped: usize,
    pub prepared: Vec<String>,
}

impl ScriptedUi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn decide(&mut self, action: &str, object: &str, answer: Answer) {
        self.decisions
            .insert((action.to_string(), object.to_string()), answer);
    }

    fn answer(&mut self, action: &str, object: String) -> Answer {
        self.asked.push(format!("{} {}", action, object));
        self.decisions
            .get(&(action.to_string(), object))
            .copied()
            .unwrap_or(Answer::Yes)
    }
}

impl DecisionSurface for ScriptedUi {
    fn mirror_update(&mut self, _mirror: &str, refresh: &dyn Fn(bool) -> Result<()>) -> Result<()> {
        refresh(true)
    }

    fn prepare_switch(&mut self, context: &SwitchContext) {
        self.prepared
            .push(format!("{}/{}", context.alias, context.component));
    }

    fn skip_switch(&mut self) {
        self.skipped += 1;
    }

    fn include_snapshot(&mut self, snapshot: &Snapshot, _info: &str) -> Result<Decision> {
        Ok(match self.answer("include_snapshot", snapshot.name.clone()) {
            Answer::Yes => Decision::Keep(snapshot.clone()),
            Answer::No => Decision::Reject,
            Answer::Abort => Decision::Abort,
        })
    }

    fn update_snapshot(
        &mut self,
        current: &Snapshot,
        proposed: &Snapshot,
        _diff: &str,
        _source: &str,
    ) -> Result<Decision> {
        let object = format!("{}->{}", current.name, proposed.name);
        Ok(match self.answer("update_snapshot", object) {
            Answer::Yes => Decision::Keep(proposed.clone()),
            Answer::No => Decision::Keep(current.clone()),
            Answer::Abort => Decision::Abort,
        })
    }

    fn remove_snapshot(&mut self, current: &Snapshot, _info: &str) -> Result<Decision> {
        Ok(match self.answer("remove_snapshot", current.name.clone()) {
            Answer::Yes => Decision::Reject,
            Answer::No => Decision::Keep(current.clone()),
            Answer::Abort => Decision::Abort,
        })
    }

    fn switch(&mut self, _diff: &str, context: &SwitchContext) -> Result<bool> {
        let object = format!("{}/{} {}", context.target, context.distribution, context.component);
        Ok(self.answer("switch", object) == Answer::Yes)
    }
}

/// Writer whose content stays readable after it was handed out.
#[derive(Clone, Default)]
pub struct SharedOutput(Arc<Mutex<Vec<u8>>>);

impl SharedOutput {
    pub fn contents(&self) -> String {
        String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
    }
}

impl Write for SharedOutput {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Parses `yaml` and links it against `engine`.
pub fn load_app(engine: &ScriptedEngine, yaml: &str) -> App {
    let config = config::parse(yaml).expect("test configuration parses");
    match App::load(Box::new(engine.clone()), &config) {
        Ok(app) => app,
        Err(err) => panic!("failed to load app: {}", err),
    }
}
