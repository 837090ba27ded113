//! Worker communication module.
//!
//! The UI context and the background computation context are two independent
//! single-threaded executors that talk exclusively through an asynchronous
//! message channel. This module carries the whole protocol:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        UI context                               │
//! │  ┌───────────────────────────────────────────────────────────┐  │
//! │  │                  WorkerClient (async)                     │  │
//! │  │  - owns the request channel into the background task      │  │
//! │  │  - request IDs for concurrent request correlation         │  │
//! │  │  - timeout + typed error classification                   │  │
//! │  └───────────────────────────────────────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────┘
//!                    │ RequestEnvelope  ▲ ResponseEnvelope
//!                    ▼                  │
//! ┌─────────────────────────────────────────────────────────────────┐
//! │            Background task: Dispatcher over the registry        │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The dispatcher handles one message to completion before the next, so
//! entities are never observed mid-mutation. Every request envelope is
//! answered by exactly one response envelope carrying the same id; dispatch
//! failures travel back as typed error responses and never kill the task.

mod client;
mod dispatcher;
mod error;
pub mod protocol;

pub use client::WorkerClient;
pub use dispatcher::{DispatchError, Dispatcher};
pub use error::{WorkerError, WorkerResult};
