//! CLI error types.

use std::path::PathBuf;
use thiserror::Error;

/// CLI errors.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new variants
/// in future versions without breaking downstream code.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The usage ledger does not exist yet.
    ///
    /// This typically means no completion has been recorded.
    #[error("usage database not found at {path}. Run 'conduit ask' first")]
    DatabaseNotFound { path: PathBuf },

    /// An input file could not be read.
    #[error("failed to read {path}: {source}")]
    ReadInput {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Query results passed to `analyze` are not valid JSON.
    #[error("invalid query results: {0}")]
    InvalidResults(#[from] serde_json::Error),

    /// Configuration is invalid or missing required fields.
    #[error(transparent)]
    Config(#[from] crate::config::ConfigError),

    /// An error occurred in the runtime layer.
    #[error(transparent)]
    Runtime(#[from] runtime::Error),

    /// An error occurred in the storage layer.
    #[error(transparent)]
    Storage(#[from] storage::Error),

    /// An I/O error occurred.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
