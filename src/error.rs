//! Error types for configuration, event extraction, execution and search.

use thiserror::Error;

/// Unrecoverable configuration problems, reported before any evaluation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("failed to parse configuration: {0}")]
    Parse(String),

    #[error("missing configuration key `{0}`")]
    MissingKey(&'static str),

    #[error("unknown {kind} `{name}`")]
    Unknown { kind: &'static str, name: String },

    #[error("`{key}` must be within [{min}, {max}], got {value}")]
    OutOfRange {
        key: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("contradictory configuration: {0}")]
    Contradiction(String),
}

impl ConfigError {
    pub(crate) fn unknown(kind: &'static str, name: impl Into<String>) -> Self {
        Self::Unknown {
            kind,
            name: name.into(),
        }
    }
}

/// Transient failure while inspecting program state for applicable events.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("event extraction failed: {0}")]
pub struct ExtractionError(pub String);

/// Failure reported by the program-under-test while being driven.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExecutionError {
    #[error("program reset failed: {0}")]
    Reset(String),

    #[error("applying `{event}` failed: {reason}")]
    Event { event: String, reason: String },

    #[error("program crashed: {0}")]
    Crashed(String),
}

/// Errors surfaced by a search run.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SearchError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("search is not configured: {0} was never set")]
    NotConfigured(&'static str),
}

/// Failure reading or writing a population snapshot.
#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("failed to access snapshot: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed snapshot: {0}")]
    Json(#[from] serde_json::Error),
}
