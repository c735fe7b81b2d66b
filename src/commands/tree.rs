//! # Tree Command Implementation
//!
//! This module implements the `tree` subcommand, which displays every
//! configured publication with its components and, for merges, the sources
//! they are built from.
//!
//! This command only reads the configuration file; aptly is never invoked.

use anyhow::{Context, Result};
use clap::Args;
use ptree::{print_tree, TreeItem};
use std::borrow::Cow;
use std::path::PathBuf;

use aptrev::config::{self, Config, SourceSpec};

/// Show the configured publications and their sources
#[derive(Args, Debug)]
pub struct TreeArgs {
    /// Path to the aptrev configuration file.
    #[arg(
        short,
        long,
        value_name = "FILE",
        env = "APTREV_CONFIG",
        default_value = "aptrev.yaml"
    )]
    pub config: PathBuf,
}

/// Execute the `tree` command.
pub fn execute(args: TreeArgs) -> Result<()> {
    let config = config::from_file(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;
    print_tree(&build_tree(&args.config.display().to_string(), &config))
        .context("Failed to display tree")?;
    Ok(())
}

fn build_tree(root: &str, config: &Config) -> TreeNode {
    let children = config
        .publish
        .iter()
        .map(|entry| TreeNode {
            label: format!(
                "{} -> {}/{}",
                entry.alias, entry.destination, entry.distribution
            ),
            children: entry
                .components
                .iter()
                .map(|(component, spec)| source_node(&format!("{}: ", component), spec))
                .collect(),
        })
        .collect();
    TreeNode {
        label: root.to_string(),
        children,
    }
}

fn source_node(prefix: &str, spec: &SourceSpec) -> TreeNode {
    match spec {
        SourceSpec::Mirror(name) => TreeNode::leaf(format!("{}mirror {}", prefix, name)),
        SourceSpec::Repo(name) => TreeNode::leaf(format!("{}repo {}", prefix, name)),
        SourceSpec::Snapshot(name) => TreeNode::leaf(format!("{}snapshot {}", prefix, name)),
        SourceSpec::Merge {
            name,
            sources,
            latest,
        } => TreeNode {
            label: format!(
                "{}merge {}{}",
                prefix,
                name,
                if *latest { " (latest)" } else { "" }
            ),
            children: sources.iter().map(|source| source_node("", source)).collect(),
        },
    }
}

/// Tree node structure for ptree visualization
#[derive(Clone, Debug)]
struct TreeNode {
    label: String,
    children: Vec<TreeNode>,
}

impl TreeNode {
    fn leaf(label: String) -> Self {
        Self {
            label,
            children: vec![],
        }
    }
}

impl TreeItem for TreeNode {
    type Child = TreeNode;

    fn write_self<W: std::io::Write>(
        &self,
        f: &mut W,
        _style: &ptree::Style,
    ) -> std::io::Result<()> {
        write!(f, "{}", self.label)
    }

    fn children(&self) -> Cow<'_, [Self::Child]> {
        Cow::Borrowed(&self.children)
    }
}
