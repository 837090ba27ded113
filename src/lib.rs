//! # Tablestream
//!
//! The orchestration core between a UI thread and a background worker that
//! hosts a native columnar data engine.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                    UI collaborators                      │
//! │  (file reader, table selector, query input, grid view)   │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [WorkerClient / IngestSession]
//! ┌─────────────────────────────────────────────────────────┐
//! │        Request / Response envelopes (correlated)         │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [background task]
//! ┌─────────────────────────────────────────────────────────┐
//! │                      Dispatcher                          │
//! │  handle registry ── queryable entities ── phase machine  │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [capability trait]
//! ┌─────────────────────────────────────────────────────────┐
//! │            Native columnar engine (opaque)               │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! Raw file bytes stream into the engine chunk by chunk; the dispatcher tracks
//! the ingestion lifecycle (`Empty → Waiting → HeaderPhase → Usable`), keeps a
//! registry of queryable entities (ingested tables and sources derived from
//! them by filters or ad-hoc commands), and answers every read through the
//! same typed message protocol.

pub mod config;
pub mod engine;
pub mod entity;
pub mod phase;
pub mod registry;
pub mod session;
pub mod worker;

pub use entity::{DerivedSource, EntityId, Queryable, Table};
pub use phase::{IngestionPhase, PhaseMachine};
pub use registry::{HandleRegistry, Identified};
pub use session::{IngestOutcome, IngestSession};
pub use worker::WorkerClient;
