//! Ingestion phase machine.
//!
//! Tracks the lifecycle of the active upload:
//!
//! ```text
//! Empty ──first chunk──▶ Waiting ──progress reaches 1──▶ HeaderPhase
//!                                      ──header indexed──▶ Usable
//! ```
//!
//! Transitions are edge-triggered and strictly forward; a stale notification
//! arriving after the phase has already advanced is ignored rather than
//! rewinding. Both ends of the protocol consult the machine: the dispatcher
//! rejects requests whose phase precondition does not hold, and the ingest
//! session uses the advance edges to decide which request to issue next.
//!
//! One machine tracks one in-flight ingestion. The dispatcher holds a single
//! shared machine for the active upload; per-table phases would require one
//! machine per table identifier.

use serde::{Deserialize, Serialize};

/// Lifecycle stage of the active ingestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum IngestionPhase {
    /// No bytes received yet.
    Empty,
    /// Chunks are streaming in.
    Waiting,
    /// The header-defining chunk is fully processed; the header row can be
    /// fetched and indexed.
    HeaderPhase,
    /// Header indexed; row slices may be requested.
    Usable,
}

/// Phase plus the monotone chunk-progress counter.
#[derive(Debug, Clone)]
pub struct PhaseMachine {
    phase: IngestionPhase,
    progress: u64,
}

impl PhaseMachine {
    pub fn new() -> Self {
        Self {
            phase: IngestionPhase::Empty,
            progress: 0,
        }
    }

    pub fn phase(&self) -> IngestionPhase {
        self.phase
    }

    pub fn progress(&self) -> u64 {
        self.progress
    }

    /// True when `phase` (or a later one) has been reached.
    pub fn at_least(&self, phase: IngestionPhase) -> bool {
        self.phase >= phase
    }

    /// A byte chunk was received. Returns true on the `Empty → Waiting` edge.
    pub fn note_chunk(&mut self) -> bool {
        self.advance_if(IngestionPhase::Empty, IngestionPhase::Waiting)
    }

    /// The engine reported chunk progress. Returns true on the
    /// `Waiting → HeaderPhase` edge, taken once progress reaches its first
    /// terminal unit.
    pub fn note_progress(&mut self, progress: u64) -> bool {
        self.progress = self.progress.max(progress);
        if self.progress >= 1 {
            self.advance_if(IngestionPhase::Waiting, IngestionPhase::HeaderPhase)
        } else {
            false
        }
    }

    /// The header row was fetched and indexed. Returns true on the
    /// `HeaderPhase → Usable` edge.
    pub fn note_header_indexed(&mut self) -> bool {
        self.advance_if(IngestionPhase::HeaderPhase, IngestionPhase::Usable)
    }

    fn advance_if(&mut self, from: IngestionPhase, to: IngestionPhase) -> bool {
        if self.phase == from {
            self.phase = to;
            true
        } else {
            false
        }
    }
}

impl Default for PhaseMachine {
    fn default() -> Self {
        Self::new()
    }
}
