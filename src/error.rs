//! Error types for the scopecalc command line

use thiserror::Error;

/// Errors in command-line arguments that clap cannot check by itself
#[derive(Error, Debug, PartialEq)]
pub enum ArgError {
    #[error("expected NAME=FILE, got '{0}'")]
    MissingSeparator(String),

    #[error("'{0}' is not a valid module name")]
    InvalidModuleName(String),
}
