//! Protocol types for worker communication.
//!
//! The tagged unions mirror the message vocabulary the UI collaborators speak:
//! every request names an operation on a queryable entity (or on the registry
//! itself), and every response carries the data the UI renders. Wire tags keep
//! the names the original client protocol used (`parsing`, `getChunk`, ...).
//!
//! Rows cross the wire as a structured sequence of sequences; there is no
//! reserved delimiter token to collide with user data.

use serde::{Deserialize, Serialize};

use crate::entity::EntityId;

// ============================================================================
// Request/Response Envelope
// ============================================================================

/// Request envelope sent to the background task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestEnvelope {
    /// Unique request ID for correlation.
    pub id: String,
    /// The operation to perform.
    #[serde(flatten)]
    pub request: Request,
}

/// Response envelope sent back to the UI context.
///
/// Exactly one envelope answers each request envelope, carrying its id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    /// Request ID this response corresponds to.
    pub id: String,
    /// Whether the request succeeded.
    pub success: bool,
    /// Result data (present if success = true).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Response>,
    /// Error information (present if success = false).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorInfo>,
}

impl ResponseEnvelope {
    pub fn ok(id: impl Into<String>, result: Response) -> Self {
        Self {
            id: id.into(),
            success: true,
            result: Some(result),
            error: None,
        }
    }

    pub fn error(id: impl Into<String>, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            success: false,
            result: None,
            error: Some(ErrorInfo {
                code: code.into(),
                message: message.into(),
            }),
        }
    }
}

/// Error information in a failed response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Stable error code (see [`codes`]).
    pub code: String,
    /// Human-readable error message.
    pub message: String,
}

/// Stable wire codes for dispatch failures.
pub mod codes {
    pub const NOT_FOUND: &str = "NOT_FOUND";
    pub const NOT_A_TABLE: &str = "NOT_A_TABLE";
    pub const PHASE_VIOLATION: &str = "PHASE_VIOLATION";
    pub const UNKNOWN_COLUMN: &str = "UNKNOWN_COLUMN";
    pub const ENGINE_FAILURE: &str = "ENGINE_FAILURE";
    pub const WORKER_EXITED: &str = "WORKER_EXITED";
}

// ============================================================================
// Requests
// ============================================================================

/// Inbound message: one operation on the registry or a queryable entity.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum Request {
    /// Stream one chunk of raw file bytes into the table with this id,
    /// creating the table on first sight of the id.
    #[serde(rename = "parsing")]
    IngestChunk {
        id: EntityId,
        name: String,
        chunk: Vec<u8>,
        header: bool,
    },

    /// Fetch a slice of rows from any queryable entity.
    #[serde(rename = "getChunk")]
    FetchChunk {
        id: EntityId,
        offset: usize,
        len: usize,
    },

    /// Index and return the header row of a table.
    #[serde(rename = "getHeader")]
    FetchHeader { id: EntityId },

    /// Flush the buffered partial row once the input stream ends.
    #[serde(rename = "processRemainder")]
    FlushTail { id: EntityId },

    /// Derive a new source by an equal-to filter on a column.
    #[serde(rename = "addFilter")]
    ApplyFilter {
        id: EntityId,
        column: String,
        bytes: Vec<u8>,
    },

    /// Derive a new source by running an ad-hoc command.
    #[serde(rename = "command")]
    ApplyCommand { id: EntityId, command: String },

    /// Display names of every queryable entity, in insertion order.
    #[serde(rename = "names")]
    ListNames,

    /// Distinct values of a column of a table.
    #[serde(rename = "distinct")]
    Distinct { id: EntityId, column: String },

    /// Numeric sum of a named column of a table.
    #[serde(rename = "sumCol")]
    SumColumn { id: EntityId, column_name: String },
}

// ============================================================================
// Responses
// ============================================================================

/// Outbound message: the successful result of one request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum Response {
    /// Chunk-progress counter after an ingest step.
    #[serde(rename = "parsing")]
    Progress { progress: u64 },

    /// A slice of rows, row-major.
    #[serde(rename = "chunk")]
    Chunk { rows: Vec<Vec<String>> },

    /// Header names in column order.
    #[serde(rename = "header")]
    Header { names: Vec<String> },

    /// Display names of all queryable entities.
    #[serde(rename = "names")]
    Names { names: Vec<String> },

    /// A derived source was registered under `index`.
    #[serde(rename = "addSource")]
    AddSource { index: EntityId, names: Vec<String> },

    /// Distinct values of a column.
    #[serde(rename = "distinct")]
    Distinct { values: Vec<String> },

    /// Rendered numeric sum.
    #[serde(rename = "sumCol")]
    Sum { value: String },

    /// The tail flush completed. The original protocol left flush-tail
    /// unanswered; answering it keeps the exactly-once envelope pairing.
    #[serde(rename = "flushed")]
    Flushed,
}
