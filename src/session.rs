//! UI-side ingestion driver.
//!
//! [`IngestSession`] plays the role the file reader and its phase-driven
//! effects play in the UI: it streams a byte source chunk by chunk into the
//! worker, flushes the tail at end of stream, and consumes the phase-machine
//! edges: entering `HeaderPhase` triggers the header fetch, and entering
//! `Usable` triggers the first row fetch at offset 0.

use tokio::io::{AsyncRead, AsyncReadExt};

use crate::config::Settings;
use crate::entity::EntityId;
use crate::phase::{IngestionPhase, PhaseMachine};
use crate::worker::{WorkerClient, WorkerResult};

/// What an ingestion run leaves behind for the UI to render.
#[derive(Debug)]
pub struct IngestOutcome {
    pub table_id: EntityId,
    /// Header names, empty if the stream carried no bytes.
    pub header: Vec<String>,
    /// The first page of rows (offset 0).
    pub first_page: Vec<Vec<String>>,
    /// Final chunk-progress counter.
    pub progress: u64,
    /// Phase reached by the end of the run.
    pub phase: IngestionPhase,
}

/// Drives one upload through the full ingestion lifecycle.
pub struct IngestSession<'a> {
    client: &'a WorkerClient,
    table_id: EntityId,
    name: String,
    /// Whether the first chunk carries a header row.
    header_row: bool,
    chunk_size: usize,
    page_len: usize,
    phase: PhaseMachine,
}

impl<'a> IngestSession<'a> {
    pub fn new(
        client: &'a WorkerClient,
        table_id: EntityId,
        name: impl Into<String>,
        settings: &Settings,
    ) -> Self {
        Self {
            client,
            table_id,
            name: name.into(),
            header_row: true,
            chunk_size: settings.ingest.chunk_size,
            page_len: settings.protocol.page_len,
            phase: PhaseMachine::new(),
        }
    }

    /// Treat the stream as headerless; the engine will synthesize names.
    pub fn without_header_row(mut self) -> Self {
        self.header_row = false;
        self
    }

    /// Stream `reader` to completion and walk the phase machine to `Usable`.
    pub async fn run<R: AsyncRead + Unpin>(mut self, mut reader: R) -> WorkerResult<IngestOutcome> {
        let mut buf = vec![0u8; self.chunk_size];
        let mut progress = 0;

        loop {
            let n = reader.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            // The header flag rides only on the first chunk, before any
            // progress has been reported.
            let is_header = self.header_row && self.phase.progress() == 0;
            self.phase.note_chunk();
            progress = self
                .client
                .ingest_chunk(self.table_id, &self.name, &buf[..n], is_header)
                .await?;
            self.phase.note_progress(progress);
        }

        // An empty stream never leaves Empty; there is nothing to flush or
        // fetch.
        if self.phase.phase() == IngestionPhase::Empty {
            return Ok(IngestOutcome {
                table_id: self.table_id,
                header: Vec::new(),
                first_page: Vec::new(),
                progress,
                phase: IngestionPhase::Empty,
            });
        }

        self.client.flush_tail(self.table_id).await?;

        // Edge: HeaderPhase reached, so fetch and index the header.
        let header = if self.phase.at_least(IngestionPhase::HeaderPhase) {
            let names = self.client.fetch_header(self.table_id).await?;
            self.phase.note_header_indexed();
            names
        } else {
            Vec::new()
        };

        // Edge: Usable reached, so fetch the first page at offset 0.
        let first_page = if self.phase.at_least(IngestionPhase::Usable) {
            self.client
                .fetch_chunk(self.table_id, 0, self.page_len)
                .await?
        } else {
            Vec::new()
        };

        Ok(IngestOutcome {
            table_id: self.table_id,
            header,
            first_page,
            progress,
            phase: self.phase.phase(),
        })
    }
}
