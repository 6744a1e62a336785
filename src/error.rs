//! Error types for verdict-rs.
//!
//! The engine itself never surfaces these past a cycle: extraction errors
//! skip a candidate, remote errors become placeholder verdicts, persistence
//! errors are logged. They exist so each layer can say precisely what went
//! wrong to the layer that absorbs it.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// The document collaborator could not enumerate or read a candidate.
    #[error("extraction failed: {0}")]
    Extraction(String),

    /// Network failure, timeout, or a non-success HTTP status.
    #[error("analysis service unreachable: {0}")]
    RemoteUnreachable(String),

    /// The service answered, but the round trip failed otherwise
    /// (unparseable body, missing `response` field).
    #[error("analysis failed: {0}")]
    Analysis(String),

    #[error("persistence error: {0}")]
    Persistence(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;
