// Error types shared across the engine and its collaborators.

use thiserror::Error;

/// Input rejected at the boundary before it reaches engine state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("missing required field `{field}`")]
    MissingField { field: &'static str },

    #[error("invalid value for `{field}`: {message}")]
    Invalid { field: &'static str, message: String },

    #[error("unknown formation format `{0}`")]
    UnknownFormat(String),
}

/// Failure reported by a roster, persistence, or notification collaborator.
///
/// All variants are treated as transient by callers: nothing here is retried
/// automatically and the in-memory selection state is never rolled back
/// because of one.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("database error: {0:#}")]
    Database(anyhow::Error),

    #[error("CSV error in {path}: {source}")]
    Csv { path: String, source: csv::Error },

    #[error("request failed: {0}")]
    Http(String),
}
