//! Error handling utilities shared across the crate.

use std::path::PathBuf;

use thiserror::Error;

/// Convenient result type used throughout the crate.
pub type Result<T, E = BpeError> = std::result::Result<T, E>;

/// Domain-specific error describing failures while learning, loading, or applying merge tables.
#[derive(Debug, Error)]
pub enum BpeError {
    /// Learner or encoder configuration failed validation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// Filesystem IO error with optional context path.
    #[error("io error while processing {path:?}: {source}")]
    Io {
        /// Underlying IO error returned by the standard library.
        source: std::io::Error,
        /// Target path associated with the IO failure if available.
        path: Option<PathBuf>,
    },
    /// A merge table line did not contain exactly two symbols.
    #[error("malformed merge line {line}: {content:?}")]
    MalformedMergeLine {
        /// One-based line number within the merge table.
        line: usize,
        /// Raw line content.
        content: String,
    },
    /// A vocabulary line was not a `WORD FREQUENCY` pair.
    #[error("malformed vocabulary line {line}: {content:?}")]
    MalformedVocabLine {
        /// One-based line number within the vocabulary file.
        line: usize,
        /// Raw line content.
        content: String,
    },
    /// The merge table declares a version with no defined end-of-word semantics.
    #[error("unsupported merge table version: {0}")]
    UnsupportedVersion(String),
    /// A glossary or force-code filter pattern failed to compile or match.
    #[error("regex error: {0}")]
    Regex(String),
    /// Serialization or deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<fancy_regex::Error> for BpeError {
    fn from(err: fancy_regex::Error) -> Self {
        Self::Regex(err.to_string())
    }
}

impl From<serde_json::Error> for BpeError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl BpeError {
    /// Helper constructor that attaches an optional path when wrapping IO errors.
    pub fn io(source: std::io::Error, path: Option<PathBuf>) -> Self {
        Self::Io { source, path }
    }
}
