//! In-memory reference engine.
//!
//! A deliberately small stand-in for the production columnar engine: rows are
//! newline-separated, fields comma-separated, and everything is stored as
//! strings. It exists so the orchestration layer is executable end to end;
//! real file-format semantics live in the native engine, not here.
//!
//! Slicing contract: a slice is truncated at the end of the row set, never
//! padded. An offset at or past the end yields an empty slice.

use std::collections::HashSet;

use super::{Engine, EngineError, Rows, SourceHandle, TableHandle};

#[derive(Default)]
struct TableState {
    header: Vec<String>,
    rows: Vec<Vec<String>>,
    /// Bytes of the trailing partial row, carried across chunk boundaries.
    carry: Vec<u8>,
    chunks: u64,
    expects_header: bool,
}

impl TableState {
    fn accept_row(&mut self, fields: Vec<String>) {
        if self.expects_header && self.header.is_empty() {
            self.header = fields;
        } else {
            self.rows.push(fields);
        }
    }

    fn column_index(&self, column: &str) -> Result<usize, EngineError> {
        self.header
            .iter()
            .position(|name| name == column)
            .ok_or_else(|| EngineError::UnknownColumn(column.to_string()))
    }
}

struct SourceState {
    /// Equal-to predicate: (column name, raw value). `None` passes all rows.
    predicate: Option<(String, String)>,
}

/// String-backed engine implementing the full capability interface.
#[derive(Default)]
pub struct MemoryEngine {
    tables: Vec<TableState>,
    sources: Vec<SourceState>,
}

impl MemoryEngine {
    pub fn new() -> Self {
        Self::default()
    }

    fn table(&self, handle: TableHandle) -> Result<&TableState, EngineError> {
        self.tables
            .get(handle.0 as usize)
            .ok_or(EngineError::UnknownTable(handle.0))
    }

    fn table_mut(&mut self, handle: TableHandle) -> Result<&mut TableState, EngineError> {
        self.tables
            .get_mut(handle.0 as usize)
            .ok_or(EngineError::UnknownTable(handle.0))
    }

    fn source(&self, handle: SourceHandle) -> Result<&SourceState, EngineError> {
        self.sources
            .get(handle.0 as usize)
            .ok_or(EngineError::UnknownSource(handle.0))
    }
}

fn split_fields(line: &str) -> Vec<String> {
    let line = line.strip_suffix('\r').unwrap_or(line);
    line.split(',').map(str::to_string).collect()
}

impl Engine for MemoryEngine {
    fn new_table(&mut self) -> TableHandle {
        self.tables.push(TableState::default());
        TableHandle(self.tables.len() as u64 - 1)
    }

    fn ingest_chunk(
        &mut self,
        table: TableHandle,
        bytes: &[u8],
        is_header: bool,
    ) -> Result<(), EngineError> {
        let state = self.table_mut(table)?;
        state.expects_header |= is_header;
        state.carry.extend_from_slice(bytes);

        // Only rows terminated by a newline are complete; the rest stays in
        // the carry buffer until the next chunk or the tail flush.
        if let Some(last_newline) = state.carry.iter().rposition(|&b| b == b'\n') {
            let complete: Vec<u8> = state.carry.drain(..=last_newline).collect();
            let text = std::str::from_utf8(&complete).map_err(|_| EngineError::InvalidUtf8)?;
            for line in text.split('\n') {
                if !line.is_empty() {
                    let fields = split_fields(line);
                    state.accept_row(fields);
                }
            }
        }

        state.chunks += 1;
        Ok(())
    }

    fn ingest_tail(&mut self, table: TableHandle) -> Result<(), EngineError> {
        let state = self.table_mut(table)?;
        if state.carry.is_empty() {
            return Ok(());
        }
        let tail = std::mem::take(&mut state.carry);
        let line = std::str::from_utf8(&tail).map_err(|_| EngineError::InvalidUtf8)?;
        let fields = split_fields(line);
        state.accept_row(fields);
        Ok(())
    }

    fn chunk_count(&self, table: TableHandle) -> Result<u64, EngineError> {
        Ok(self.table(table)?.chunks)
    }

    fn slice(&self, table: TableHandle, offset: usize, len: usize) -> Result<Rows, EngineError> {
        let state = self.table(table)?;
        if offset >= state.rows.len() {
            return Ok(Vec::new());
        }
        let end = offset.saturating_add(len).min(state.rows.len());
        Ok(state.rows[offset..end].to_vec())
    }

    fn header(&self, table: TableHandle) -> Result<Vec<String>, EngineError> {
        let state = self.table(table)?;
        if !state.header.is_empty() {
            return Ok(state.header.clone());
        }
        // Headerless ingestion: synthesize positional names from row width.
        let width = state.rows.first().map_or(0, Vec::len);
        Ok((0..width).map(|i| format!("column_{i}")).collect())
    }

    fn distinct(&self, table: TableHandle, column: &str) -> Result<Vec<String>, EngineError> {
        let state = self.table(table)?;
        let index = state.column_index(column)?;
        let mut seen = HashSet::new();
        let mut values = Vec::new();
        for row in &state.rows {
            if let Some(value) = row.get(index) {
                if seen.insert(value.clone()) {
                    values.push(value.clone());
                }
            }
        }
        Ok(values)
    }

    fn sum(&self, table: TableHandle, column_index: usize) -> Result<String, EngineError> {
        let state = self.table(table)?;
        let width = state.header.len().max(state.rows.first().map_or(0, Vec::len));
        if column_index >= width {
            return Err(EngineError::ColumnIndexOutOfRange(column_index));
        }
        let mut total = 0f64;
        for row in &state.rows {
            if let Some(value) = row.get(column_index) {
                let parsed: f64 = value.trim().parse().map_err(|_| {
                    let name = state
                        .header
                        .get(column_index)
                        .cloned()
                        .unwrap_or_else(|| column_index.to_string());
                    EngineError::NotNumeric(name)
                })?;
                total += parsed;
            }
        }
        Ok(total.to_string())
    }

    fn new_source(&mut self) -> SourceHandle {
        self.sources.push(SourceState { predicate: None });
        SourceHandle(self.sources.len() as u64 - 1)
    }

    fn apply_equal_to_filter(
        &mut self,
        source: SourceHandle,
        table: TableHandle,
        bytes: &[u8],
        column: &str,
    ) -> Result<(), EngineError> {
        self.table(table)?.column_index(column)?;
        let value = String::from_utf8(bytes.to_vec()).map_err(|_| EngineError::InvalidUtf8)?;
        let predicate = Some((column.to_string(), value));
        self.sources
            .get_mut(source.0 as usize)
            .ok_or(EngineError::UnknownSource(source.0))?
            .predicate = predicate;
        Ok(())
    }

    fn run_command(
        &mut self,
        command: &str,
        table: TableHandle,
    ) -> Result<(SourceHandle, String), EngineError> {
        // Grammar of the only supported command: `filter <column> = <value>`.
        let bad = || EngineError::BadCommand(command.to_string());
        let rest = command
            .trim()
            .strip_prefix("filter")
            .or_else(|| command.trim().strip_prefix("Filter"))
            .ok_or_else(bad)?;
        let (column, value) = rest.split_once('=').ok_or_else(bad)?;
        let (column, value) = (column.trim(), value.trim());
        if column.is_empty() || value.is_empty() {
            return Err(bad());
        }

        let source = self.new_source();
        self.apply_equal_to_filter(source, table, value.as_bytes(), column)?;
        Ok((source, "filter".to_string()))
    }

    fn slice_source(
        &self,
        source: SourceHandle,
        table: TableHandle,
        offset: usize,
        len: usize,
    ) -> Result<Rows, EngineError> {
        let state = self.table(table)?;
        match &self.source(source)?.predicate {
            None => self.slice(table, offset, len),
            Some((column, value)) => {
                let index = state.column_index(column)?;
                Ok(state
                    .rows
                    .iter()
                    .filter(|row| row.get(index).is_some_and(|v| v == value))
                    .skip(offset)
                    .take(len)
                    .cloned()
                    .collect())
            }
        }
    }
}
