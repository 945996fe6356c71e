//! Error types for Scopecalc core.

use thiserror::Error;

/// Errors that can occur while manipulating or persisting a notebook
#[derive(Error, Debug)]
pub enum ScopecalcError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error in {key}: {source}")]
    Json {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Unknown scope: {0}")]
    UnknownScope(String),

    #[error("Unknown module: {0}")]
    UnknownModule(String),

    #[error("Line {index} out of range (scope has {len} lines)")]
    LineOutOfRange { index: usize, len: usize },

    #[error("Scope index {index} out of range ({len} scopes)")]
    ScopeOutOfRange { index: usize, len: usize },

    #[error("Scope name must not be empty")]
    EmptyScopeName,

    #[error("A scope named '{0}' already exists")]
    DuplicateScopeName(String),

    #[error("Invalid module name '{0}': use letters, digits and underscores, not starting with a digit")]
    InvalidModuleName(String),

    #[error("A module named '{0}' already exists")]
    DuplicateModuleName(String),

    #[error("Nothing to undo")]
    NothingToUndo,
}

pub type Result<T> = std::result::Result<T, ScopecalcError>;
