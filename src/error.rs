//! Error taxonomy for service calls and ingestion.
//!
//! Command entry points (`run_*`) return `anyhow::Result`; the pipeline
//! pieces return these typed errors so callers can tell a conflict (retried)
//! from a missing file (fatal to one ingest call) from everything else.

use std::path::PathBuf;

use thiserror::Error;

/// Failure talking to the search service.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// HTTP 409: a document or collection already exists at that key.
    #[error("conflict: {0}")]
    Conflict(String),

    /// HTTP 404: the collection or document does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Any other non-success status.
    #[error("search service error {status}: {body}")]
    Status { status: u16, body: String },

    /// Network, TLS or timeout failure before a status was received.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The response body did not have the expected shape.
    #[error("invalid response: {0}")]
    Decode(String),
}

impl ServiceError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, ServiceError::Conflict(_))
    }
}

/// Failure ingesting one local file.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("file {} not found", .0.display())]
    NotFound(PathBuf),

    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Service(#[from] ServiceError),

    #[error("ingest gate closed")]
    GateClosed,

    /// A submission task panicked or was cancelled; its document was not sent.
    #[error("submission task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}
