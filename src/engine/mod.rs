//! Native engine capability interface.
//!
//! The columnar engine that actually stores tables and evaluates filters is an
//! external collaborator; this crate only sees it through the [`Engine`] trait
//! and the opaque handles it issues. The dispatcher owns exactly one engine
//! instance, and every handle is held by exactly one queryable entity.
//!
//! [`memory::MemoryEngine`] is a reference implementation used by the demo
//! binary and the test suite.

pub mod memory;

use thiserror::Error;

pub use memory::MemoryEngine;

/// Opaque reference to engine-owned table storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TableHandle(pub(crate) u64);

/// Opaque reference to an engine-owned derived source (filter or command result).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SourceHandle(pub(crate) u64);

/// A slice of rows, outermost vec in row order, inner vec in column order.
pub type Rows = Vec<Vec<String>>;

/// Errors surfaced by the native engine.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("unknown table handle {0}")]
    UnknownTable(u64),

    #[error("unknown source handle {0}")]
    UnknownSource(u64),

    #[error("unknown column: {0}")]
    UnknownColumn(String),

    #[error("column index {0} out of range")]
    ColumnIndexOutOfRange(usize),

    #[error("column {0} is not numeric")]
    NotNumeric(String),

    #[error("cannot parse command: {0}")]
    BadCommand(String),

    #[error("ingested bytes are not valid utf-8")]
    InvalidUtf8,
}

/// Capability interface of the native columnar engine.
///
/// Ingestion is append-only and chunked: `ingest_chunk` accepts an arbitrary
/// byte slice (chunk boundaries need not align with rows; the engine buffers
/// partial trailing rows), and `ingest_tail` flushes whatever is still
/// buffered once the stream ends. Progress is read back separately via
/// [`Engine::chunk_count`].
pub trait Engine: Send + 'static {
    /// Allocate storage for a new table.
    fn new_table(&mut self) -> TableHandle;

    /// Append one chunk of raw bytes to a table. `is_header` marks the chunk
    /// that carries the header row.
    fn ingest_chunk(
        &mut self,
        table: TableHandle,
        bytes: &[u8],
        is_header: bool,
    ) -> Result<(), EngineError>;

    /// Flush the buffered partial row, if any.
    fn ingest_tail(&mut self, table: TableHandle) -> Result<(), EngineError>;

    /// Number of chunks processed so far for a table.
    fn chunk_count(&self, table: TableHandle) -> Result<u64, EngineError>;

    /// Rows `offset..offset+len`, truncated at the end of the table.
    fn slice(&self, table: TableHandle, offset: usize, len: usize) -> Result<Rows, EngineError>;

    /// Column names in column order.
    fn header(&self, table: TableHandle) -> Result<Vec<String>, EngineError>;

    /// Distinct values of a column, first-seen order.
    fn distinct(&self, table: TableHandle, column: &str) -> Result<Vec<String>, EngineError>;

    /// Numeric sum of a column, rendered as a string.
    fn sum(&self, table: TableHandle, column_index: usize) -> Result<String, EngineError>;

    /// Allocate an empty derived source.
    fn new_source(&mut self) -> SourceHandle;

    /// Attach an equal-to predicate to a source: rows of `table` where
    /// `column` equals the given raw value.
    fn apply_equal_to_filter(
        &mut self,
        source: SourceHandle,
        table: TableHandle,
        bytes: &[u8],
        column: &str,
    ) -> Result<(), EngineError>;

    /// Run an ad-hoc command against a table, producing a derived source and
    /// an operation discriminator for display names (e.g. `"filter"`).
    fn run_command(
        &mut self,
        command: &str,
        table: TableHandle,
    ) -> Result<(SourceHandle, String), EngineError>;

    /// Slice a derived source. The caller supplies the physical table the
    /// source was derived from; sources never copy row data.
    fn slice_source(
        &self,
        source: SourceHandle,
        table: TableHandle,
        offset: usize,
        len: usize,
    ) -> Result<Rows, EngineError>;
}
