//! Core error types.

use thiserror::Error;

/// Feed engine errors.
#[derive(Debug, Error)]
pub enum Error {
    /// The record source could not answer a query.
    #[error("record source error: {0}")]
    Source(String),

    /// SQLite error from the bundled record source.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// A catch-up token or source row carried an unusable identifier.
    #[error("invalid identifier: {0}")]
    InvalidIdentifier(String),

    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// A blocking source query task panicked or was cancelled.
    #[error("source task failed: {0}")]
    Join(String),
}

impl From<tokio::task::JoinError> for Error {
    fn from(err: tokio::task::JoinError) -> Self {
        Error::Join(err.to_string())
    }
}

/// Result alias for feed operations.
pub type Result<T> = std::result::Result<T, Error>;
