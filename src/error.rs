//! Error types shared across the engine.
//!
//! Most entry points return `anyhow::Result`; the enums here exist for the
//! failure classes callers are expected to match on.

use std::path::PathBuf;

use thiserror::Error;

/// A single file could not be turned into a syntax tree.
///
/// Recovered per file: the run records a Finding and moves on.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("cannot read file: {0}")]
    Io(#[from] std::io::Error),

    #[error("file is {size} bytes, larger than the {limit} byte limit")]
    TooLarge { size: u64, limit: u64 },

    #[error("parsing exceeded the {timeout_ms}ms time limit")]
    Timeout { timeout_ms: u64 },

    #[error("syntax error near line {line}")]
    Syntax { line: usize },

    #[error("parser setup failed: {0}")]
    Language(String),
}

impl ParseError {
    /// Rule name of the Finding this error is reported as.
    pub fn rule(&self) -> &'static str {
        match self {
            ParseError::Io(_) => "unreadable",
            ParseError::TooLarge { .. } => "too_large",
            ParseError::Timeout { .. } => "timeout",
            ParseError::Syntax { .. } => "syntax_error",
            ParseError::Language(_) => "unsupported",
        }
    }

    /// Line to attach the Finding to.
    pub fn line(&self) -> usize {
        match self {
            ParseError::Syntax { line } => *line,
            _ => 1,
        }
    }
}

/// The snapshot directory could not be read or written.
///
/// Fatal to the snapshot stage; never leaves a partially written snapshot
/// visible.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("snapshot I/O failed for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize snapshot: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("snapshot file {path} is corrupt: {reason}")]
    Corrupt { path: PathBuf, reason: String },

    #[error("failed to publish snapshot {path}: {source}")]
    Persist {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl StorageError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StorageError::Io {
            path: path.into(),
            source,
        }
    }
}
