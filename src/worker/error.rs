//! Worker-specific error types.

use std::io;
use thiserror::Error;

/// Result type for worker operations.
pub type WorkerResult<T> = Result<T, WorkerError>;

/// Errors that can occur on the UI side of the worker channel.
///
/// Transport failures (`ChannelClosed`, `Timeout`, `ReadFailed`) are local;
/// the rest are classifications of typed error responses produced by the
/// dispatcher on the other end.
#[derive(Error, Debug)]
pub enum WorkerError {
    /// The background task is gone and cannot answer.
    #[error("worker channel closed unexpectedly")]
    ChannelClosed,

    /// Request timed out waiting for its response.
    #[error("request timed out after {0} seconds")]
    Timeout(u64),

    /// Failed to read from the byte stream being ingested.
    #[error("failed to read input stream: {0}")]
    ReadFailed(#[source] io::Error),

    /// The identifier does not name a live queryable entity.
    #[error("entity not found: {0}")]
    NotFound(String),

    /// The identifier names a derived source where a table is required.
    #[error("not a table: {0}")]
    NotATable(String),

    /// The request arrived in an ingestion phase that does not permit it.
    #[error("phase violation: {0}")]
    PhaseViolation(String),

    /// The named column does not exist in the target table.
    #[error("unknown column: {0}")]
    UnknownColumn(String),

    /// The engine rejected the operation.
    #[error("engine failure: {0}")]
    EngineFailure(String),

    /// A response arrived whose variant does not match the request.
    #[error("unexpected response to {0} request")]
    UnexpectedResponse(&'static str),

    /// Any other error response.
    #[error("worker error: {message} (code: {code})")]
    Remote {
        /// Error code from the dispatcher.
        code: String,
        /// Error message from the dispatcher.
        message: String,
    },
}

impl WorkerError {
    /// Create a remote error from an error response.
    pub fn remote(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Remote {
            code: code.into(),
            message: message.into(),
        }
    }

    /// Check if this error indicates the background task has exited.
    pub fn is_worker_exited(&self) -> bool {
        match self {
            Self::ChannelClosed => true,
            Self::Remote { code, .. } => code == super::protocol::codes::WORKER_EXITED,
            _ => false,
        }
    }
}

impl From<io::Error> for WorkerError {
    fn from(err: io::Error) -> Self {
        Self::ReadFailed(err)
    }
}
