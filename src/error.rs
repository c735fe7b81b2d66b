//! # Error Handling
//!
//! This module defines the centralized error type for `aptrev`. It uses the
//! `thiserror` library to build a single `Error` enum covering every failure
//! the library can report, each variant carrying enough context to tell the
//! administrator what to fix.
//!
//! ## Key Components
//!
//! - **`Error`**: The enum of all failures: configuration problems, links to
//!   mirrors or repositories the engine does not know, publications whose
//!   component set drifted from the configuration, engine command failures and
//!   prompt I/O failures.
//!
//! - **`Result<T>`**: A type alias for `std::result::Result<T, Error>`.
//!
//! Note that "no change" and "reconciliation aborted" are *not* errors; they
//! are ordinary outcomes and are modelled as `Option`/`Decision` values by the
//! callers.

use thiserror::Error;

/// Main error type for aptrev operations
#[derive(Error, Debug)]
pub enum Error {
    /// The configuration document could not be turned into publications.
    #[error("Configuration parsing error: {message}{}", hint.as_ref().map(|h| format!("\n  hint: {}", h)).unwrap_or_default())]
    ConfigParse {
        message: String,
        /// Optional hint for how to fix the configuration issue
        hint: Option<String>,
    },

    /// The configuration references a mirror the engine does not have.
    #[error("Unknown mirror {name}")]
    UnknownMirror { name: String },

    /// The configuration references a local repository the engine does not have.
    #[error("Unknown repo {name}")]
    UnknownRepo { name: String },

    /// The live publication has a different component set than configured.
    ///
    /// The engine cannot add or remove components of an existing
    /// publication, so this is never patched incrementally.
    #[error("Components of {target}/{distribution} differ: published [{live}], configured [{configured}]\n  hint: republish the repository")]
    ComponentMismatch {
        target: String,
        distribution: String,
        live: String,
        configured: String,
    },

    /// A content source has no snapshot yet but one is required.
    #[error("No snapshot exists for {source_name}\n  hint: run `aptrev update {source_name}` first")]
    NoSnapshot { source_name: String },

    /// The newest snapshot of a source already carries the highest revision.
    #[error("Revision numbers of {source_name} are exhausted\n  hint: drop or rename its newest snapshot")]
    RevisionExhausted { source_name: String },

    /// An engine command exited unsuccessfully.
    #[error("Engine command failed: {command} - {stderr}")]
    Engine { command: String, stderr: String },

    /// Reading an answer from the terminal failed.
    #[error("Prompt error: {0}")]
    Prompt(#[from] dialoguer::Error),

    /// An I/O error, wrapped from `std::io::Error`.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A YAML parsing error, wrapped from `serde_yaml::Error`.
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A target filter is not a valid glob pattern.
    #[error("Glob pattern error: {0}")]
    Glob(#[from] glob::PatternError),
}

/// A convenient type alias for `Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;
