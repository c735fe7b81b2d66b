//! `RepositoryEngine` backed by the `aptly` command-line tool.
//!
//! Every operation is a subprocess call. Output that the reconciliation logic
//! needs (inventories, diffs, lineage, publications) is parsed by the pure
//! functions at the bottom of this module.

use std::path::PathBuf;
use std::process::{Command, Output, Stdio};
use std::sync::OnceLock;

use crate::engine::{LineageEntry, LineageKind, Publication, PublishRequest, RepositoryEngine};
use crate::error::{Error, Result};

const IDENTICAL_MARKER: &str = "Snapshots are identical.";

/// The system `aptly` binary, optionally pointed at a specific aptly config.
pub struct AptlyEngine {
    binary: PathBuf,
    config: Option<PathBuf>,
    keyring: Option<String>,
    published: OnceLock<Vec<(String, String)>>,
}

impl AptlyEngine {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            config: None,
            keyring: None,
            published: OnceLock::new(),
        }
    }

    /// Passes `-config=PATH` to every aptly invocation.
    pub fn with_config(mut self, config: Option<PathBuf>) -> Self {
        self.config = config;
        self
    }

    /// Keyring used to verify mirror signatures on refresh.
    pub fn with_keyring(mut self, keyring: Option<String>) -> Self {
        self.keyring = keyring;
        self
    }

    fn command<S: AsRef<str>>(&self, args: &[S]) -> (Command, String) {
        let mut command = Command::new(&self.binary);
        if let Some(config) = &self.config {
            command.arg(format!("-config={}", config.display()));
        }
        let args: Vec<&str> = args.iter().map(AsRef::as_ref).collect();
        command.args(&args);
        let rendered = format!("{} {}", self.binary.display(), args.join(" "));
        log::debug!("running {}", rendered);
        (command, rendered)
    }

    /// Runs aptly capturing stdout, failing on non-zero exit.
    fn capture<S: AsRef<str>>(&self, args: &[S]) -> Result<String> {
        let (mut command, rendered) = self.command(args);
        let output = command.stdin(Stdio::null()).output()?;
        check(&rendered, &output)?;
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// Runs aptly discarding stdout, failing on non-zero exit.
    fn silent<S: AsRef<str>>(&self, args: &[S]) -> Result<()> {
        let (mut command, rendered) = self.command(args);
        let output = command
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()?;
        check(&rendered, &output)
    }

    /// Runs aptly with its output shown to the administrator.
    fn visible<S: AsRef<str>>(&self, args: &[S]) -> Result<()> {
        let (mut command, rendered) = self.command(args);
        let status = command.status()?;
        if !status.success() {
            return Err(Error::Engine {
                command: rendered,
                stderr: format!("exited with {}", status),
            });
        }
        Ok(())
    }

    fn raw_list(&self, kind: &str) -> Result<Vec<String>> {
        Ok(parse_raw_list(&self.capture(&[kind, "list", "-raw"])?))
    }

    fn published(&self) -> Result<&[(String, String)]> {
        if let Some(published) = self.published.get() {
            return Ok(published);
        }
        let listed = parse_publish_list(&self.capture(&["publish", "list", "-raw"])?);
        Ok(self.published.get_or_init(|| listed))
    }
}

fn check(command: &str, output: &Output) -> Result<()> {
    if output.status.success() {
        return Ok(());
    }
    Err(Error::Engine {
        command: command.to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
    })
}

impl RepositoryEngine for AptlyEngine {
    fn mirrors(&self) -> Result<Vec<String>> {
        self.raw_list("mirror")
    }

    fn repos(&self) -> Result<Vec<String>> {
        self.raw_list("repo")
    }

    fn snapshots(&self) -> Result<Vec<String>> {
        self.raw_list("snapshot")
    }

    fn mirror_update(&self, name: &str, quiet: bool) -> Result<()> {
        let args = mirror_update_args(self.keyring.as_deref(), name);
        if quiet {
            self.silent(&args)
        } else {
            self.visible(&args)
        }
    }

    fn snapshot_from_mirror(&self, snapshot: &str, mirror: &str) -> Result<()> {
        self.silent(&["snapshot", "create", snapshot, "from", "mirror", mirror])
    }

    fn snapshot_from_repo(&self, snapshot: &str, repo: &str) -> Result<()> {
        self.silent(&["snapshot", "create", snapshot, "from", "repo", repo])
    }

    fn snapshot_merge(&self, name: &str, sources: &[String], latest: bool) -> Result<()> {
        self.silent(&merge_args(name, sources, latest))
    }

    fn snapshot_diff(&self, old: &str, new: &str) -> Result<Option<String>> {
        Ok(parse_diff(&self.capture(&["snapshot", "diff", old, new])?))
    }

    fn snapshot_drop(&self, name: &str, check: bool) -> Result<()> {
        let args = ["snapshot", "drop", name];
        if check {
            return self.silent(&args);
        }
        let (mut command, rendered) = self.command(&args);
        let output = command.stdin(Stdio::null()).stdout(Stdio::null()).output()?;
        if !output.status.success() {
            log::warn!(
                "ignoring failed {}: {}",
                rendered,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        Ok(())
    }

    fn snapshot_info(&self, name: &str) -> Result<String> {
        self.capture(&["snapshot", "show", "-with-packages", name])
    }

    fn snapshot_sources(&self, name: &str) -> Result<Vec<LineageEntry>> {
        Ok(parse_snapshot_sources(
            name,
            &self.capture(&["snapshot", "show", name])?,
        ))
    }

    fn publication(&self, target: &str, distribution: &str) -> Result<Option<Publication>> {
        let exists = self
            .published()?
            .iter()
            .any(|(t, d)| t == target && d == distribution);
        if !exists {
            return Ok(None);
        }
        let shown = self.capture(&["publish", "show", distribution, target])?;
        Ok(Some(Publication {
            components: parse_publish_sources(&shown),
        }))
    }

    fn publish(&self, request: &PublishRequest) -> Result<()> {
        self.visible(&publish_args(request))
    }

    fn switch(&self, distribution: &str, target: &str, snapshot: &str) -> Result<()> {
        self.visible(&["publish", "switch", distribution, target, snapshot])
    }

    fn switch_components(
        &self,
        distribution: &str,
        target: &str,
        changes: &[(String, String)],
    ) -> Result<()> {
        self.visible(&switch_components_args(distribution, target, changes))
    }
}

/// `mirror update [-keyring=K] NAME`
fn mirror_update_args(keyring: Option<&str>, name: &str) -> Vec<String> {
    let mut args = vec!["mirror".to_string(), "update".to_string()];
    if let Some(keyring) = keyring {
        args.push(format!("-keyring={}", keyring));
    }
    args.push(name.to_string());
    args
}

/// `snapshot merge [-latest] NAME SOURCES...`
fn merge_args(name: &str, sources: &[String], latest: bool) -> Vec<String> {
    let mut args = vec!["snapshot".to_string(), "merge".to_string()];
    if latest {
        args.push("-latest".to_string());
    }
    args.push(name.to_string());
    args.extend(sources.iter().cloned());
    args
}

fn component_flag<'a>(components: impl Iterator<Item = &'a String>) -> String {
    let components: Vec<&str> = components.map(String::as_str).collect();
    format!("-component={}", components.join(","))
}

/// `publish snapshot` with one snapshot per component, in component order.
fn publish_args(request: &PublishRequest) -> Vec<String> {
    let mut args = vec![
        "publish".to_string(),
        "snapshot".to_string(),
        component_flag(request.components.iter().map(|(c, _)| c)),
    ];
    if !request.architectures.is_empty() {
        args.push(format!("-architectures={}", request.architectures.join(",")));
    }
    args.push(format!("-distribution={}", request.distribution));
    if request.acquire_by_hash {
        args.push("-acquire-by-hash".to_string());
    }
    if let Some(origin) = &request.origin {
        args.push(format!("-origin={}", origin));
    }
    args.extend(request.components.iter().map(|(_, s)| s.clone()));
    args.push(request.target.clone());
    args
}

fn switch_components_args(distribution: &str, target: &str, changes: &[(String, String)]) -> Vec<String> {
    let mut args = vec![
        "publish".to_string(),
        "switch".to_string(),
        component_flag(changes.iter().map(|(c, _)| c)),
        distribution.to_string(),
        target.to_string(),
    ];
    args.extend(changes.iter().map(|(_, s)| s.clone()));
    args
}

/// One name per non-empty line.
pub fn parse_raw_list(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// `None` when aptly reports the snapshots as identical.
pub fn parse_diff(stdout: &str) -> Option<String> {
    if stdout.contains(IDENTICAL_MARKER) {
        None
    } else {
        Some(stdout.to_string())
    }
}

/// Indented lines following a `Sources:` header line.
fn sources_block(stdout: &str) -> impl Iterator<Item = &str> {
    stdout
        .lines()
        .skip_while(|line| line.trim_end() != "Sources:")
        .skip(1)
        .take_while(|line| line.starts_with("  "))
}

/// Lineage entries from `aptly snapshot show` output.
pub fn parse_snapshot_sources(name: &str, stdout: &str) -> Vec<LineageEntry> {
    const SUFFIXES: [(&str, LineageKind); 3] = [
        (" [snapshot]", LineageKind::Snapshot),
        (" [repo]", LineageKind::Mirror),
        (" [local]", LineageKind::Repo),
    ];

    let mut entries = Vec::new();
    for line in sources_block(stdout) {
        let line = line.trim_end();
        let Some((suffix, kind)) = SUFFIXES.iter().find(|(s, _)| line.ends_with(s)) else {
            log::warn!("Ignore unknown snapshot source: {} in ({})", line.trim(), name);
            continue;
        };
        let source = line
            .strip_suffix(suffix)
            .and_then(|rest| rest.get(2..))
            .map(str::trim)
            .unwrap_or_default();
        if source.is_empty() {
            log::warn!("Ignore unnamed snapshot source: {} in ({})", line.trim(), name);
            continue;
        }
        entries.push(LineageEntry {
            kind: *kind,
            name: source.to_string(),
        });
    }
    entries
}

/// `(target, distribution)` pairs from `aptly publish list -raw`.
pub fn parse_publish_list(stdout: &str) -> Vec<(String, String)> {
    stdout
        .lines()
        .filter_map(|line| line.trim().rsplit_once(' '))
        .map(|(target, distribution)| (target.trim().to_string(), distribution.to_string()))
        .collect()
}

/// Component to snapshot mapping from `aptly publish show` output.
pub fn parse_publish_sources(stdout: &str) -> Vec<(String, String)> {
    sources_block(stdout)
        .filter_map(|line| {
            let (component, rest) = line.trim().split_once(": ")?;
            let snapshot = rest.rsplit_once(" [").map_or(rest, |(name, _)| name);
            Some((component.to_string(), snapshot.trim().to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SNAPSHOT_SHOW: &str = "Name: test-distro+r1
Created At: 2024-03-01 10:00:00 UTC
Description: Merged from sources: 'sw1+r1', 'sw2+r3'
Number of packages: 42
Sources:
  sw1+r1 [snapshot]
  sw2+r3 [snapshot]
  debian-main [repo]
  pkgs [local]
  weird [unknown]
";

    #[test]
    fn test_parse_raw_list() {
        let list = parse_raw_list("sw1\nsw2\n\n  pkgs  \n");
        assert_eq!(list, vec!["sw1", "sw2", "pkgs"]);
        assert!(parse_raw_list("").is_empty());
    }

    #[test]
    fn test_parse_diff_identical() {
        assert_eq!(parse_diff("Snapshots are identical.\n"), None);
    }

    #[test]
    fn test_parse_diff_changed() {
        let out = "  Arch   | Package         | Version in A | Version in B\n+ amd64  | hello           | -            | 2.10-3\n";
        assert_eq!(parse_diff(out), Some(out.to_string()));
    }

    #[test]
    fn test_parse_snapshot_sources() {
        let entries = parse_snapshot_sources("test-distro+r1", SNAPSHOT_SHOW);
        assert_eq!(
            entries,
            vec![
                LineageEntry::snapshot("sw1+r1"),
                LineageEntry::snapshot("sw2+r3"),
                LineageEntry {
                    kind: LineageKind::Mirror,
                    name: "debian-main".to_string()
                },
                LineageEntry {
                    kind: LineageKind::Repo,
                    name: "pkgs".to_string()
                },
            ]
        );
    }

    #[test]
    fn test_parse_snapshot_sources_warns_on_unknown_kind() {
        testing_logger::setup();
        let out = "Sources:\n  a+r1 [snapshot]\n  weird [remote]\n";

        let entries = parse_snapshot_sources("x+r2", out);

        assert_eq!(entries, vec![LineageEntry::snapshot("a+r1")]);
        testing_logger::validate(|captured| {
            assert_eq!(captured.len(), 1);
            assert_eq!(captured[0].level, log::Level::Warn);
            assert_eq!(
                captured[0].body,
                "Ignore unknown snapshot source: weird [remote] in (x+r2)"
            );
        });
    }

    #[test]
    fn test_parse_snapshot_sources_skips_unnamed_entry() {
        assert!(parse_snapshot_sources("x+r1", "Sources:\n  [snapshot]\n").is_empty());
        assert!(parse_snapshot_sources("x+r1", "Sources:\n   [local]\n").is_empty());
        assert_eq!(
            parse_snapshot_sources("x+r1", "Sources:\n  [snapshot]\n  a+r1 [snapshot]\n"),
            vec![LineageEntry::snapshot("a+r1")]
        );
    }

    #[test]
    fn test_parse_snapshot_sources_without_block() {
        let out = "Name: sw1+r1\nNumber of packages: 3\n";
        assert!(parse_snapshot_sources("sw1+r1", out).is_empty());
    }

    #[test]
    fn test_parse_snapshot_sources_stops_at_unindented_line() {
        let out = "Sources:\n  a+r1 [snapshot]\nPackages:\n  b+r1 [snapshot]\n";
        assert_eq!(
            parse_snapshot_sources("x", out),
            vec![LineageEntry::snapshot("a+r1")]
        );
    }

    #[test]
    fn test_parse_publish_list() {
        let out = "s3:apt:mon distro\n. bookworm\n";
        assert_eq!(
            parse_publish_list(out),
            vec![
                ("s3:apt:mon".to_string(), "distro".to_string()),
                (".".to_string(), "bookworm".to_string()),
            ]
        );
    }

    #[test]
    fn test_parse_publish_sources() {
        let out = "Prefix: s3:apt:mon
Distribution: distro
Architectures: amd64
Sources:
  main: test-distro-main+r1 [snapshot]
  extra: pkgs1+r1 [snapshot]
";
        assert_eq!(
            parse_publish_sources(out),
            vec![
                ("main".to_string(), "test-distro-main+r1".to_string()),
                ("extra".to_string(), "pkgs1+r1".to_string()),
            ]
        );
    }

    fn request() -> PublishRequest {
        PublishRequest {
            target: "s3:apt:mon".to_string(),
            distribution: "distro".to_string(),
            components: vec![
                ("main".to_string(), "test-distro-main+r1".to_string()),
                ("extra".to_string(), "pkgs1+r1".to_string()),
            ],
            origin: Some("cloud".to_string()),
            architectures: vec!["amd64".to_string(), "arm64".to_string()],
            acquire_by_hash: true,
        }
    }

    #[test]
    fn test_mirror_update_args() {
        assert_eq!(mirror_update_args(None, "debian"), vec!["mirror", "update", "debian"]);
        assert_eq!(
            mirror_update_args(Some("trustedkeys.gpg"), "debian"),
            vec!["mirror", "update", "-keyring=trustedkeys.gpg", "debian"]
        );
    }

    #[test]
    fn test_merge_args_put_latest_before_name() {
        let sources = vec!["sw1+r1".to_string(), "pkgs+r2".to_string()];
        assert_eq!(
            merge_args("test-distro+r2", &sources, true),
            vec!["snapshot", "merge", "-latest", "test-distro+r2", "sw1+r1", "pkgs+r2"]
        );
        assert_eq!(
            merge_args("test-distro+r2", &sources, false),
            vec!["snapshot", "merge", "test-distro+r2", "sw1+r1", "pkgs+r2"]
        );
    }

    #[test]
    fn test_publish_args() {
        assert_eq!(
            publish_args(&request()),
            vec![
                "publish",
                "snapshot",
                "-component=main,extra",
                "-architectures=amd64,arm64",
                "-distribution=distro",
                "-acquire-by-hash",
                "-origin=cloud",
                "test-distro-main+r1",
                "pkgs1+r1",
                "s3:apt:mon",
            ]
        );
    }

    #[test]
    fn test_publish_args_minimal() {
        let request = PublishRequest {
            components: vec![("main".to_string(), "test+r1".to_string())],
            origin: None,
            architectures: vec![],
            acquire_by_hash: false,
            ..request()
        };
        assert_eq!(
            publish_args(&request),
            vec![
                "publish",
                "snapshot",
                "-component=main",
                "-distribution=distro",
                "test+r1",
                "s3:apt:mon",
            ]
        );
    }

    #[test]
    fn test_switch_components_args() {
        let changes = vec![
            ("main".to_string(), "test-distro-main+r2".to_string()),
            ("extra".to_string(), "pkgs1+r2".to_string()),
        ];
        assert_eq!(
            switch_components_args("distro", "s3:apt:mon", &changes),
            vec![
                "publish",
                "switch",
                "-component=main,extra",
                "distro",
                "s3:apt:mon",
                "test-distro-main+r2",
                "pkgs1+r2",
            ]
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_unchecked_drop_ignores_exit_status() {
        let engine = AptlyEngine::new("false");
        assert!(engine.snapshot_drop("sw1+r1", false).is_ok());
        let err = engine.snapshot_drop("sw1+r1", true).unwrap_err();
        assert!(matches!(err, Error::Engine { ref command, .. } if command == "false snapshot drop sw1+r1"));
    }

    #[test]
    fn test_engine_reports_missing_binary() {
        let engine = AptlyEngine::new("/nonexistent/aptly-binary");
        let err = engine.mirrors().unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }
}
