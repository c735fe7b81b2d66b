//! # Configuration Document
//!
//! This module turns the YAML configuration document into plain data:
//! a list of publish entries, each binding one or more components to a
//! content source. Sources are written as tagged YAML values:
//!
//! ```yaml
//! keyring: trustedkeys.gpg
//! publish:
//!   - alias: test-distro
//!     destination: s3:apt:mon
//!     distribution: distro
//!     component: main
//!     source:
//!       - !mirror software1
//!       - !repo pkgs1
//!   - alias: components
//!     destination: s3:apt:other
//!     distribution: distro
//!     components:
//!       main: !snapshot.merge
//!         name: distro-main
//!         latest: true
//!         sources:
//!           - !mirror software2
//!           - !snapshot extern-managed
//!       extra: !repo pkgs2
//! ```
//!
//! A bare list under `source` is shorthand for a merge named after the alias.
//! Turning these specs into linked content sources is the job of
//! [`crate::source::SourceRegistry`].

use std::path::Path;

use serde::Deserialize;
use serde_yaml::{Mapping, Value};

use crate::error::{Error, Result};

/// Component used when a publish entry names none.
pub const DEFAULT_COMPONENT: &str = "main";

/// The content source of a component, as written in the document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceSpec {
    /// `!mirror NAME`
    Mirror(String),
    /// `!repo NAME`
    Repo(String),
    /// `!snapshot NAME` - an externally managed snapshot.
    Snapshot(String),
    /// `!snapshot.merge {name, sources, latest}`
    Merge {
        name: String,
        sources: Vec<SourceSpec>,
        latest: bool,
    },
}

impl SourceSpec {
    pub fn name(&self) -> &str {
        match self {
            SourceSpec::Mirror(name) | SourceSpec::Repo(name) | SourceSpec::Snapshot(name) => name,
            SourceSpec::Merge { name, .. } => name,
        }
    }
}

/// One publication target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishEntry {
    pub alias: String,
    pub destination: String,
    pub distribution: String,
    pub origin: Option<String>,
    pub architectures: Vec<String>,
    /// Component name to source, in document order.
    pub components: Vec<(String, SourceSpec)>,
}

/// The whole configuration document.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Config {
    /// Keyring used to verify mirrors on refresh.
    pub keyring: Option<String>,
    pub publish: Vec<PublishEntry>,
}

#[derive(Debug, Deserialize)]
struct RawConfig {
    #[serde(default)]
    keyring: Option<String>,
    #[serde(default)]
    publish: Vec<RawPublish>,
}

#[derive(Debug, Deserialize)]
struct RawPublish {
    alias: String,
    destination: String,
    distribution: String,
    #[serde(default)]
    component: Option<String>,
    #[serde(default)]
    components: Option<Mapping>,
    #[serde(default)]
    source: Option<Value>,
    #[serde(default)]
    origin: Option<String>,
    #[serde(default)]
    architectures: Vec<String>,
}

/// Parses a configuration document from a YAML string.
pub fn parse(yaml_content: &str) -> Result<Config> {
    let raw: RawConfig = serde_yaml::from_str(yaml_content)?;
    let publish = raw
        .publish
        .into_iter()
        .map(convert_publish)
        .collect::<Result<Vec<_>>>()?;
    Ok(Config {
        keyring: raw.keyring,
        publish,
    })
}

/// Parses the configuration document at `path`.
pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Config> {
    let content = std::fs::read_to_string(path)?;
    parse(&content)
}

fn config_error(message: impl Into<String>, hint: Option<&str>) -> Error {
    Error::ConfigParse {
        message: message.into(),
        hint: hint.map(str::to_string),
    }
}

fn convert_publish(raw: RawPublish) -> Result<PublishEntry> {
    let components = match (raw.components, raw.source) {
        (Some(_), _) if raw.component.is_some() => {
            return Err(config_error(
                format!("{}: component and components are mutually exclusive", raw.alias),
                None,
            ));
        }
        (Some(_), Some(_)) => {
            return Err(config_error(
                format!("{}: source is only allowed together with component", raw.alias),
                Some("give each entry under components its own source"),
            ));
        }
        (Some(mapping), None) => convert_components(&raw.alias, mapping)?,
        (None, Some(source)) => {
            let component = raw.component.unwrap_or_else(|| DEFAULT_COMPONENT.to_string());
            let spec = match source {
                Value::Sequence(items) => SourceSpec::Merge {
                    name: raw.alias.clone(),
                    sources: convert_source_list(&raw.alias, items)?,
                    latest: true,
                },
                other => convert_source(&raw.alias, other)?,
            };
            vec![(component, spec)]
        }
        (None, None) => {
            return Err(config_error(
                format!("{}: source is required without components", raw.alias),
                None,
            ));
        }
    };

    Ok(PublishEntry {
        alias: raw.alias,
        destination: raw.destination,
        distribution: raw.distribution,
        origin: raw.origin,
        architectures: raw.architectures,
        components,
    })
}

fn convert_components(alias: &str, mapping: Mapping) -> Result<Vec<(String, SourceSpec)>> {
    if mapping.is_empty() {
        return Err(config_error(format!("{}: components is empty", alias), None));
    }
    let mut components: Vec<(String, SourceSpec)> = Vec::new();
    for (key, value) in mapping {
        let component = key
            .as_str()
            .ok_or_else(|| config_error(format!("{}: component names must be strings", alias), None))?
            .to_string();
        if components.iter().any(|(c, _)| *c == component) {
            return Err(config_error(
                format!("{}: component {} listed twice", alias, component),
                None,
            ));
        }
        components.push((component, convert_source(alias, value)?));
    }
    Ok(components)
}

fn convert_source_list(alias: &str, items: Vec<Value>) -> Result<Vec<SourceSpec>> {
    if items.is_empty() {
        return Err(config_error(format!("{}: merge has no sources", alias), None));
    }
    items
        .into_iter()
        .map(|item| convert_source(alias, item))
        .collect()
}

/// Converts a tagged YAML value into a source spec.
fn convert_source(alias: &str, value: Value) -> Result<SourceSpec> {
    let tagged = match value {
        Value::Tagged(tagged) => *tagged,
        other => {
            return Err(config_error(
                format!("{}: untagged source {:?}", alias, other),
                Some("write sources as `!mirror NAME`, `!repo NAME`, `!snapshot NAME` or `!snapshot.merge {...}`"),
            ));
        }
    };
    let tag = tagged.tag.to_string();
    let kind = tag.trim_start_matches('!');

    match kind {
        "mirror" => Ok(SourceSpec::Mirror(scalar_name(alias, kind, tagged.value)?)),
        "repo" => Ok(SourceSpec::Repo(scalar_name(alias, kind, tagged.value)?)),
        "snapshot" => Ok(SourceSpec::Snapshot(scalar_name(alias, kind, tagged.value)?)),
        "snapshot.merge" | "merge" => convert_merge(alias, tagged.value),
        other => Err(config_error(
            format!("{}: unknown source type !{}", alias, other),
            Some("known source types are !mirror, !repo, !snapshot and !snapshot.merge"),
        )),
    }
}

fn scalar_name(alias: &str, kind: &str, value: Value) -> Result<String> {
    match value {
        Value::String(name) if !name.is_empty() => Ok(name),
        _ => Err(config_error(
            format!("{}: !{} needs a name", alias, kind),
            None,
        )),
    }
}

fn convert_merge(alias: &str, value: Value) -> Result<SourceSpec> {
    let Value::Mapping(mut map) = value else {
        return Err(config_error(
            format!("{}: merge must be a mapping with name and sources", alias),
            None,
        ));
    };

    let name = map
        .remove("name")
        .and_then(|v| v.as_str().map(str::to_string))
        .ok_or_else(|| config_error(format!("{}: merge is missing name", alias), None))?;

    let sources = match map.remove("sources") {
        Some(Value::Sequence(items)) => convert_source_list(alias, items)?,
        _ => {
            return Err(config_error(
                format!("{}: merge {} needs a list of sources", alias, name),
                None,
            ));
        }
    };

    let latest = match map.remove("latest") {
        None => true,
        Some(Value::Bool(latest)) => latest,
        Some(_) => {
            return Err(config_error(
                format!("{}: latest of merge {} must be true or false", alias, name),
                None,
            ));
        }
    };

    if let Some((key, _)) = map.into_iter().next() {
        return Err(config_error(
            format!("{}: unknown key {:?} in merge {}", alias, key, name),
            None,
        ));
    }

    Ok(SourceSpec::Merge {
        name,
        sources,
        latest,
    })
}
