//! Async client for the background worker task.
//!
//! The client is the UI end of the channel: an explicit context object
//! constructed once and handed to whoever needs to talk to the worker. There
//! is no ambient global channel.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, Mutex};

use crate::config::Settings;
use crate::engine::Engine;
use crate::entity::EntityId;

use super::dispatcher::Dispatcher;
use super::error::{WorkerError, WorkerResult};
use super::protocol::{codes, Request, RequestEnvelope, Response, ResponseEnvelope};

type Pending = Arc<Mutex<HashMap<String, oneshot::Sender<ResponseEnvelope>>>>;

/// Async client for the dispatcher running in the background task.
///
/// Each request carries a unique ID for correlation with its response, so
/// multiple requests of the same kind can be in flight concurrently without
/// a fast answer to an earlier request being misattributed to a later one.
///
/// # Example
///
/// ```ignore
/// use tablestream::config::Settings;
/// use tablestream::engine::MemoryEngine;
/// use tablestream::WorkerClient;
///
/// let client = WorkerClient::spawn(MemoryEngine::new(), &Settings::default());
/// let progress = client.ingest_chunk(0, "cities.csv", b"a,b\n1,2\n", true).await?;
/// ```
pub struct WorkerClient {
    /// Sender into the background dispatcher task.
    tx: mpsc::UnboundedSender<RequestEnvelope>,

    /// Map of pending request IDs to response channels.
    pending: Pending,

    /// Handle to the background dispatcher task.
    _worker_task: tokio::task::JoinHandle<()>,

    /// Handle to the task routing responses back to pending requests.
    _router_task: tokio::task::JoinHandle<()>,

    /// Request timeout duration.
    timeout: Duration,
}

impl WorkerClient {
    /// Spawn the background dispatcher task over the given engine.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn<E: Engine>(engine: E, settings: &Settings) -> Self {
        let (req_tx, mut req_rx) = mpsc::unbounded_channel::<RequestEnvelope>();
        let (resp_tx, mut resp_rx) = mpsc::unbounded_channel::<ResponseEnvelope>();

        // Background computation context: one message handled to completion
        // before the next. Dispatch errors become error envelopes; nothing
        // here can take the task down.
        let worker_task = tokio::spawn(async move {
            let mut dispatcher = Dispatcher::new(engine);
            while let Some(envelope) = req_rx.recv().await {
                let RequestEnvelope { id, request } = envelope;
                let response = match dispatcher.handle(request) {
                    Ok(result) => ResponseEnvelope::ok(id, result),
                    Err(err) => ResponseEnvelope::error(id, err.code(), err.to_string()),
                };
                if resp_tx.send(response).is_err() {
                    break;
                }
            }
        });

        let pending: Pending = Arc::new(Mutex::new(HashMap::new()));

        // Router: deliver each response to the caller waiting on its ID.
        let router_pending = pending.clone();
        let router_task = tokio::spawn(async move {
            while let Some(response) = resp_rx.recv().await {
                let mut pending = router_pending.lock().await;
                if let Some(tx) = pending.remove(&response.id) {
                    let _ = tx.send(response);
                }
            }

            // Worker exited: answer everything still pending with an error
            // so no caller waits out its full timeout.
            let mut pending = router_pending.lock().await;
            for (id, tx) in pending.drain() {
                let response = ResponseEnvelope::error(
                    id,
                    codes::WORKER_EXITED,
                    "worker task exited unexpectedly",
                );
                let _ = tx.send(response);
            }
        });

        Self {
            tx: req_tx,
            pending,
            _worker_task: worker_task,
            _router_task: router_task,
            timeout: Duration::from_secs(settings.protocol.timeout_secs),
        }
    }

    /// Send one request and wait for its correlated response.
    ///
    /// # Errors
    ///
    /// Returns an error if the worker task is gone, the request times out,
    /// or the dispatcher answered with a typed error response.
    pub async fn request(&self, request: Request) -> WorkerResult<Response> {
        let id = uuid::Uuid::new_v4().to_string();

        // Register the response channel before sending.
        let (tx, rx) = oneshot::channel();
        {
            let mut pending = self.pending.lock().await;
            pending.insert(id.clone(), tx);
        }

        let envelope = RequestEnvelope {
            id: id.clone(),
            request,
        };
        if self.tx.send(envelope).is_err() {
            let mut pending = self.pending.lock().await;
            pending.remove(&id);
            return Err(WorkerError::ChannelClosed);
        }

        // Wait for the response with timeout.
        let response = match tokio::time::timeout(self.timeout, rx).await {
            Ok(Ok(response)) => response,
            Ok(Err(_)) => return Err(WorkerError::ChannelClosed),
            Err(_) => {
                // Timeout: clean up the pending entry to prevent a leak.
                let mut pending = self.pending.lock().await;
                pending.remove(&id);
                return Err(WorkerError::Timeout(self.timeout.as_secs()));
            }
        };

        if response.success {
            response
                .result
                .ok_or_else(|| WorkerError::remote("EMPTY_RESPONSE", "success without result"))
        } else {
            let error = response
                .error
                .unwrap_or_else(|| super::protocol::ErrorInfo {
                    code: "UNKNOWN".to_string(),
                    message: "unknown error".to_string(),
                });
            Err(Self::classify_error(&error.code, &error.message))
        }
    }

    /// Classify a wire error code into a typed error.
    fn classify_error(code: &str, message: &str) -> WorkerError {
        match code {
            codes::NOT_FOUND => WorkerError::NotFound(message.to_string()),
            codes::NOT_A_TABLE => WorkerError::NotATable(message.to_string()),
            codes::PHASE_VIOLATION => WorkerError::PhaseViolation(message.to_string()),
            codes::UNKNOWN_COLUMN => WorkerError::UnknownColumn(message.to_string()),
            codes::ENGINE_FAILURE => WorkerError::EngineFailure(message.to_string()),
            codes::WORKER_EXITED => WorkerError::ChannelClosed,
            _ => WorkerError::remote(code, message),
        }
    }

    /// Check if the background task is still running.
    pub fn is_alive(&self) -> bool {
        !self._worker_task.is_finished()
    }

    /// Get the current request timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Set the request timeout.
    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }
}

// Convenience methods, one per protocol operation.
impl WorkerClient {
    /// Stream one chunk of raw bytes into the table `id`, creating it on
    /// first sight. Returns the chunk-progress counter.
    pub async fn ingest_chunk(
        &self,
        id: EntityId,
        name: &str,
        chunk: &[u8],
        header: bool,
    ) -> WorkerResult<u64> {
        match self
            .request(Request::IngestChunk {
                id,
                name: name.to_string(),
                chunk: chunk.to_vec(),
                header,
            })
            .await?
        {
            Response::Progress { progress } => Ok(progress),
            _ => Err(WorkerError::UnexpectedResponse("ingest-chunk")),
        }
    }

    /// Fetch a slice of rows from any queryable entity.
    pub async fn fetch_chunk(
        &self,
        id: EntityId,
        offset: usize,
        len: usize,
    ) -> WorkerResult<Vec<Vec<String>>> {
        match self.request(Request::FetchChunk { id, offset, len }).await? {
            Response::Chunk { rows } => Ok(rows),
            _ => Err(WorkerError::UnexpectedResponse("fetch-chunk")),
        }
    }

    /// Index and return the header row of table `id`.
    pub async fn fetch_header(&self, id: EntityId) -> WorkerResult<Vec<String>> {
        match self.request(Request::FetchHeader { id }).await? {
            Response::Header { names } => Ok(names),
            _ => Err(WorkerError::UnexpectedResponse("fetch-header")),
        }
    }

    /// Flush the buffered partial row of table `id`.
    pub async fn flush_tail(&self, id: EntityId) -> WorkerResult<()> {
        match self.request(Request::FlushTail { id }).await? {
            Response::Flushed => Ok(()),
            _ => Err(WorkerError::UnexpectedResponse("flush-tail")),
        }
    }

    /// Derive a filtered source from entity `id`. Returns the new identifier
    /// and the updated name list.
    pub async fn apply_filter(
        &self,
        id: EntityId,
        column: &str,
        value: &[u8],
    ) -> WorkerResult<(EntityId, Vec<String>)> {
        match self
            .request(Request::ApplyFilter {
                id,
                column: column.to_string(),
                bytes: value.to_vec(),
            })
            .await?
        {
            Response::AddSource { index, names } => Ok((index, names)),
            _ => Err(WorkerError::UnexpectedResponse("apply-filter")),
        }
    }

    /// Derive a source by running an ad-hoc command against entity `id`.
    pub async fn apply_command(
        &self,
        id: EntityId,
        command: &str,
    ) -> WorkerResult<(EntityId, Vec<String>)> {
        match self
            .request(Request::ApplyCommand {
                id,
                command: command.to_string(),
            })
            .await?
        {
            Response::AddSource { index, names } => Ok((index, names)),
            _ => Err(WorkerError::UnexpectedResponse("apply-command")),
        }
    }

    /// Display names of every queryable entity, in insertion order.
    pub async fn list_names(&self) -> WorkerResult<Vec<String>> {
        match self.request(Request::ListNames).await? {
            Response::Names { names } => Ok(names),
            _ => Err(WorkerError::UnexpectedResponse("list-names")),
        }
    }

    /// Distinct values of a column of table `id`.
    pub async fn distinct(&self, id: EntityId, column: &str) -> WorkerResult<Vec<String>> {
        match self
            .request(Request::Distinct {
                id,
                column: column.to_string(),
            })
            .await?
        {
            Response::Distinct { values } => Ok(values),
            _ => Err(WorkerError::UnexpectedResponse("distinct")),
        }
    }

    /// Numeric sum of a named column of table `id`.
    pub async fn sum_column(&self, id: EntityId, column_name: &str) -> WorkerResult<String> {
        match self
            .request(Request::SumColumn {
                id,
                column_name: column_name.to_string(),
            })
            .await?
        {
            Response::Sum { value } => Ok(value),
            _ => Err(WorkerError::UnexpectedResponse("sum-column")),
        }
    }
}
