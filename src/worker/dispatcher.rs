//! The protocol dispatcher: the background side of the message channel.
//!
//! Owns the handle registry, the native engine, and the phase machine for the
//! active ingestion. `handle` is synchronous and non-reentrant; the task that
//! drives it processes one message to completion before the next, so entities
//! are never observed mid-mutation.

use thiserror::Error;

use crate::engine::{Engine, EngineError};
use crate::entity::{DerivedSource, EntityId, Queryable, Table};
use crate::phase::{IngestionPhase, PhaseMachine};
use crate::registry::HandleRegistry;

use super::protocol::{codes, Request, Response};

/// Ancestor chains are one hop in practice; the cap only exists to turn a
/// cyclic parent reference into an error instead of a hang.
const MAX_PARENT_HOPS: usize = 64;

/// Dispatch failures. All recoverable: they travel back to the caller as
/// typed error responses and never take down the background task.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("no queryable entity with id {0}")]
    NotFound(EntityId),

    #[error("entity {0} is a derived source, not a table")]
    NotATable(EntityId),

    #[error("request requires phase {required:?} but the active ingestion is {actual:?}")]
    PhaseViolation {
        required: IngestionPhase,
        actual: IngestionPhase,
    },

    #[error("derived source {0} does not resolve to a physical table")]
    UnresolvedParent(EntityId),

    #[error(transparent)]
    Engine(#[from] EngineError),
}

impl DispatchError {
    /// Stable wire code for the error envelope.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => codes::NOT_FOUND,
            Self::NotATable(_) => codes::NOT_A_TABLE,
            Self::PhaseViolation { .. } => codes::PHASE_VIOLATION,
            Self::UnresolvedParent(_) => codes::NOT_FOUND,
            Self::Engine(EngineError::UnknownColumn(_)) => codes::UNKNOWN_COLUMN,
            Self::Engine(_) => codes::ENGINE_FAILURE,
        }
    }
}

/// State machine over message tags: resolves identifiers against the
/// registry, delegates to the engine, and advances the phase machine.
pub struct Dispatcher<E: Engine> {
    engine: E,
    registry: HandleRegistry<Queryable>,
    phase: PhaseMachine,
    /// Display names in insertion order, grown alongside the registry.
    names: Vec<String>,
}

impl<E: Engine> Dispatcher<E> {
    pub fn new(engine: E) -> Self {
        Self {
            engine,
            registry: HandleRegistry::new(),
            phase: PhaseMachine::new(),
            names: Vec::new(),
        }
    }

    /// Phase of the active ingestion.
    pub fn phase(&self) -> IngestionPhase {
        self.phase.phase()
    }

    /// Number of registered queryable entities.
    pub fn entity_count(&self) -> usize {
        self.registry.len()
    }

    /// Handle one request to completion.
    pub fn handle(&mut self, request: Request) -> Result<Response, DispatchError> {
        match request {
            Request::IngestChunk {
                id,
                name,
                chunk,
                header,
            } => self.ingest_chunk(id, name, &chunk, header),
            Request::FetchChunk { id, offset, len } => self.fetch_chunk(id, offset, len),
            Request::FetchHeader { id } => self.fetch_header(id),
            Request::FlushTail { id } => self.flush_tail(id),
            Request::ApplyFilter { id, column, bytes } => self.apply_filter(id, &column, &bytes),
            Request::ApplyCommand { id, command } => self.apply_command(id, &command),
            Request::ListNames => Ok(Response::Names {
                names: self.names.clone(),
            }),
            Request::Distinct { id, column } => self.distinct(id, &column),
            Request::SumColumn { id, column_name } => self.sum_column(id, &column_name),
        }
    }

    fn require_phase(&self, required: IngestionPhase) -> Result<(), DispatchError> {
        if self.phase.at_least(required) {
            Ok(())
        } else {
            Err(DispatchError::PhaseViolation {
                required,
                actual: self.phase.phase(),
            })
        }
    }

    /// The first message about an id creates its table: unknown identifiers
    /// on the ingest path are intentional leniency, not an error.
    fn ingest_chunk(
        &mut self,
        id: EntityId,
        name: String,
        chunk: &[u8],
        header: bool,
    ) -> Result<Response, DispatchError> {
        self.phase.note_chunk();

        if self.registry.find(id).is_none() {
            let table = Table::new(id, name.clone(), self.engine.new_table());
            self.register(Queryable::Table(table));
        }
        let handle = self.expect_table(id)?.handle();
        self.engine.ingest_chunk(handle, chunk, header)?;
        let progress = self.engine.chunk_count(handle)?;
        self.phase.note_progress(progress);

        Ok(Response::Progress { progress })
    }

    fn fetch_chunk(
        &mut self,
        id: EntityId,
        offset: usize,
        len: usize,
    ) -> Result<Response, DispatchError> {
        self.require_phase(IngestionPhase::Usable)?;
        let entity = self
            .registry
            .find(id)
            .ok_or(DispatchError::NotFound(id))?;

        let rows = match entity {
            Queryable::Table(table) => table.slice(&self.engine, offset, len)?,
            Queryable::Derived(source) => {
                let table = self.resolve_table(source.parent_id())?;
                source.slice(&self.engine, table.handle(), offset, len)?
            }
        };
        Ok(Response::Chunk { rows })
    }

    fn fetch_header(&mut self, id: EntityId) -> Result<Response, DispatchError> {
        self.require_phase(IngestionPhase::HeaderPhase)?;
        let table = self.expect_table(id)?;
        table.init_column_order(&self.engine)?;
        let names = table.header(&self.engine)?;
        self.phase.note_header_indexed();
        Ok(Response::Header { names })
    }

    fn flush_tail(&mut self, id: EntityId) -> Result<Response, DispatchError> {
        self.require_phase(IngestionPhase::Waiting)?;
        let handle = self.expect_table(id)?.handle();
        self.engine.ingest_tail(handle)?;
        Ok(Response::Flushed)
    }

    fn apply_filter(
        &mut self,
        id: EntityId,
        column: &str,
        bytes: &[u8],
    ) -> Result<Response, DispatchError> {
        let table = self.resolve_table(id)?;
        let (parent_id, parent_name, parent_handle) =
            (table.id(), table.name().to_string(), table.handle());

        let source = self.engine.new_source();
        self.engine
            .apply_equal_to_filter(source, parent_handle, bytes, column)?;

        let new_id = self.registry.allocate_id();
        let name = format!("{parent_name}_{column}");
        self.register(Queryable::Derived(DerivedSource::new(
            new_id, name, source, parent_id,
        )));

        Ok(Response::AddSource {
            index: new_id,
            names: self.names.clone(),
        })
    }

    fn apply_command(&mut self, id: EntityId, command: &str) -> Result<Response, DispatchError> {
        let table = self.resolve_table(id)?;
        let (parent_id, parent_name, parent_handle) =
            (table.id(), table.name().to_string(), table.handle());

        let (source, discriminator) = self.engine.run_command(command, parent_handle)?;

        let new_id = self.registry.allocate_id();
        let name = format!("{parent_name}_{discriminator}");
        self.register(Queryable::Derived(DerivedSource::new(
            new_id, name, source, parent_id,
        )));

        Ok(Response::AddSource {
            index: new_id,
            names: self.names.clone(),
        })
    }

    fn distinct(&mut self, id: EntityId, column: &str) -> Result<Response, DispatchError> {
        let table = self.expect_table(id)?;
        let values = table.distinct(&self.engine, column)?;
        Ok(Response::Distinct { values })
    }

    fn sum_column(&mut self, id: EntityId, column_name: &str) -> Result<Response, DispatchError> {
        let table = self.expect_table(id)?;
        let index = table.column_index(&self.engine, column_name)?;
        let value = table.sum(&self.engine, index)?;
        Ok(Response::Sum { value })
    }

    fn register(&mut self, entity: Queryable) {
        self.names.push(entity.name().to_string());
        self.registry.push(entity);
    }

    fn expect_table(&self, id: EntityId) -> Result<&Table, DispatchError> {
        match self.registry.find(id) {
            None => Err(DispatchError::NotFound(id)),
            Some(Queryable::Table(table)) => Ok(table),
            Some(Queryable::Derived(_)) => Err(DispatchError::NotATable(id)),
        }
    }

    /// Follow `parent_id` links until a physical table is reached. Tolerates
    /// chains deeper than the single hop the protocol produces today.
    fn resolve_table(&self, id: EntityId) -> Result<&Table, DispatchError> {
        let mut current = id;
        for _ in 0..MAX_PARENT_HOPS {
            match self.registry.find(current) {
                None => return Err(DispatchError::NotFound(current)),
                Some(Queryable::Table(table)) => return Ok(table),
                Some(Queryable::Derived(source)) => current = source.parent_id(),
            }
        }
        Err(DispatchError::UnresolvedParent(id))
    }
}
