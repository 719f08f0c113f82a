//! Error types for scout.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// Policy or daemon configuration is unreadable or unwritable.
    /// Fatal for the current run.
    #[error("Config error: {0}")]
    Config(String),

    /// The instance directory could not be fetched or is structurally
    /// invalid. Aborts the run; the previously persisted list stays
    /// authoritative.
    #[error("Instance directory unavailable: {0}")]
    SourceUnavailable(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
