//! Queryable entities: ingested tables and sources derived from them.
//!
//! A [`Table`] owns a native table handle; a [`DerivedSource`] owns a native
//! source handle plus the identifier of the entity it was derived from.
//! Derived sources never copy row data: slicing one supplies the resolved
//! physical table handle of its transitive ancestor to the engine.

use std::collections::HashMap;

use once_cell::sync::OnceCell;

use crate::engine::{Engine, EngineError, Rows, SourceHandle, TableHandle};
use crate::registry::Identified;

/// Identifier of a live queryable entity, unique within one registry.
pub type EntityId = u64;

/// A directly ingested table.
pub struct Table {
    id: EntityId,
    name: String,
    handle: TableHandle,
    /// Column-name → column-index map, built once from the header.
    column_order: OnceCell<HashMap<String, usize>>,
}

impl Table {
    pub fn new(id: EntityId, name: impl Into<String>, handle: TableHandle) -> Self {
        Self {
            id,
            name: name.into(),
            handle,
            column_order: OnceCell::new(),
        }
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn handle(&self) -> TableHandle {
        self.handle
    }

    /// Append one chunk of raw bytes. Progress is read back separately via
    /// [`Table::progress`].
    pub fn ingest_chunk<E: Engine>(
        &self,
        engine: &mut E,
        bytes: &[u8],
        is_header: bool,
    ) -> Result<(), EngineError> {
        engine.ingest_chunk(self.handle, bytes, is_header)
    }

    /// Flush the buffered partial row after the stream ends.
    pub fn ingest_tail<E: Engine>(&self, engine: &mut E) -> Result<(), EngineError> {
        engine.ingest_tail(self.handle)
    }

    pub fn progress<E: Engine>(&self, engine: &E) -> Result<u64, EngineError> {
        engine.chunk_count(self.handle)
    }

    /// Build the column-order map from the header. Idempotent: the header is
    /// read from the engine at most once.
    pub fn init_column_order<E: Engine>(
        &self,
        engine: &E,
    ) -> Result<&HashMap<String, usize>, EngineError> {
        self.column_order.get_or_try_init(|| {
            let header = engine.header(self.handle)?;
            Ok(header
                .into_iter()
                .enumerate()
                .map(|(index, name)| (name, index))
                .collect())
        })
    }

    /// Position of a named column, initializing the column order on demand.
    pub fn column_index<E: Engine>(
        &self,
        engine: &E,
        column: &str,
    ) -> Result<usize, EngineError> {
        self.init_column_order(engine)?
            .get(column)
            .copied()
            .ok_or_else(|| EngineError::UnknownColumn(column.to_string()))
    }

    pub fn header<E: Engine>(&self, engine: &E) -> Result<Vec<String>, EngineError> {
        engine.header(self.handle)
    }

    pub fn slice<E: Engine>(
        &self,
        engine: &E,
        offset: usize,
        len: usize,
    ) -> Result<Rows, EngineError> {
        engine.slice(self.handle, offset, len)
    }

    pub fn sum<E: Engine>(&self, engine: &E, column_index: usize) -> Result<String, EngineError> {
        engine.sum(self.handle, column_index)
    }

    pub fn distinct<E: Engine>(
        &self,
        engine: &E,
        column: &str,
    ) -> Result<Vec<String>, EngineError> {
        engine.distinct(self.handle, column)
    }
}

/// The result of applying a filter or ad-hoc command to a table.
pub struct DerivedSource {
    id: EntityId,
    name: String,
    handle: SourceHandle,
    /// Identifier of the entity this source was derived from. Immutable.
    parent_id: EntityId,
}

impl DerivedSource {
    pub fn new(
        id: EntityId,
        name: impl Into<String>,
        handle: SourceHandle,
        parent_id: EntityId,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            handle,
            parent_id,
        }
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parent_id(&self) -> EntityId {
        self.parent_id
    }

    /// Slice through the engine, supplying the resolved physical table of the
    /// ancestor chain.
    pub fn slice<E: Engine>(
        &self,
        engine: &E,
        table: TableHandle,
        offset: usize,
        len: usize,
    ) -> Result<Rows, EngineError> {
        engine.slice_source(self.handle, table, offset, len)
    }
}

/// Closed union over everything that can answer a row-slice request.
pub enum Queryable {
    Table(Table),
    Derived(DerivedSource),
}

impl Queryable {
    pub fn name(&self) -> &str {
        match self {
            Queryable::Table(table) => table.name(),
            Queryable::Derived(source) => source.name(),
        }
    }
}

impl Identified for Queryable {
    fn id(&self) -> EntityId {
        match self {
            Queryable::Table(table) => table.id(),
            Queryable::Derived(source) => source.id(),
        }
    }
}
