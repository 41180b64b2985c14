//! Chunked upload coordinator.
//!
//! Pulls fixed-size chunks out of the source stream, stages each one, sends
//! it through a [`ChunkTransport`] and feeds the answer into the
//! [`SessionState`]. Strictly sequential: one chunk in flight at a time.

use bytes::Bytes;
use filerelay_protocol::ContentRange;
use filerelay_transfer::{ChunkStore, DEFAULT_CHUNK_SIZE, Rechunker, TransferError};
use futures_util::Stream;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::client::{ChunkRequest, ChunkTransport};
use crate::error::RelayError;
use crate::session::{Phase, SessionState, Step};
use crate::types::{ProgressFn, TransferDescriptor};

/// Drives one chunked transfer per [`upload`](Self::upload) call.
pub struct ChunkedUploader<T> {
    transport: T,
    store: ChunkStore,
    chunk_size: usize,
    cancel: Option<CancellationToken>,
}

impl<T: ChunkTransport> ChunkedUploader<T> {
    /// Creates a coordinator. A `chunk_size` of 0 selects the default.
    pub fn new(transport: T, store: ChunkStore, chunk_size: usize) -> Self {
        let chunk_size = if chunk_size == 0 {
            DEFAULT_CHUNK_SIZE
        } else {
            chunk_size
        };
        Self {
            transport,
            store,
            chunk_size,
            cancel: None,
        }
    }

    /// Aborts the transfer between chunks once `cancel` fires.
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Streams `source` to the destination and returns the result files.
    ///
    /// `on_progress` is called once per acknowledged chunk with the bytes
    /// acknowledged so far and the best known total (0 while unknown).
    pub async fn upload<S, E>(
        &self,
        descriptor: &TransferDescriptor,
        source: S,
        on_progress: &ProgressFn<'_>,
    ) -> Result<Vec<Value>, RelayError>
    where
        S: Stream<Item = Result<Bytes, E>> + Unpin + Send,
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        descriptor.validate()?;

        let mut state = SessionState::new();
        let result = self.run(descriptor, source, on_progress, &mut state).await;

        match &result {
            Ok(files) => info!(
                filename = %descriptor.filename,
                bytes = state.bytes_sent(),
                files = files.len(),
                "chunked upload complete"
            ),
            Err(e) => {
                if !state.is_terminal() {
                    state.fail(Phase::TransferError);
                }
                warn!(
                    filename = %descriptor.filename,
                    bytes_sent = state.bytes_sent(),
                    phase = ?state.phase(),
                    error = %e,
                    "chunked upload failed"
                );
            }
        }
        result
    }

    async fn run<S, E>(
        &self,
        descriptor: &TransferDescriptor,
        source: S,
        on_progress: &ProgressFn<'_>,
        state: &mut SessionState,
    ) -> Result<Vec<Value>, RelayError>
    where
        S: Stream<Item = Result<Bytes, E>> + Unpin + Send,
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        let declared = descriptor.declared_length();
        let mut chunks = Rechunker::new(source, self.chunk_size);

        loop {
            self.check_cancelled()?;
            state.begin_download();

            let chunk = match chunks.next_chunk().await {
                Ok(Some(chunk)) => chunk,
                Ok(None) => {
                    return Err(RelayError::ChunkSession {
                        offset: state.bytes_sent(),
                        reason: "server did not complete the upload".into(),
                    });
                }
                Err(TransferError::Source(e)) => {
                    return Err(RelayError::Download {
                        url: descriptor.source_url.clone(),
                        status: None,
                        message: e.to_string(),
                    });
                }
                Err(e) => return Err(e.into()),
            };
            state.begin_chunking();

            let offset = state.bytes_sent();
            let len = chunk.len();
            let is_last = chunk.is_last;
            let total = effective_length(declared, offset, len, is_last);
            if is_last && declared.is_some_and(|d| d != total) {
                debug!(
                    declared = declared.unwrap_or(0),
                    actual = offset + len,
                    "correcting declared length"
                );
            }

            let staged = self.store.stage(&chunk).await?;
            drop(chunk);

            state.begin_chunk();
            let sent = {
                let request = ChunkRequest {
                    descriptor,
                    session_id: state.session_id(),
                    range: ContentRange::new(offset, len, Some(total)),
                    is_last,
                };
                self.transport.send_chunk(&request, &staged).await
            };
            staged.release().await;

            let outcome = match sent {
                Ok(outcome) => outcome,
                Err(e) => {
                    state.fail(Phase::TransferError);
                    return Err(e);
                }
            };

            let step = state.apply_outcome(offset, len, outcome)?;
            let progress_total = if declared.is_some() || is_last { total } else { 0 };
            on_progress(state.bytes_sent(), progress_total);

            if let Step::Finish(files) = step {
                if !is_last {
                    warn!(
                        offset,
                        bytes_sent = state.bytes_sent(),
                        "destination completed the upload before the last chunk"
                    );
                }
                return Ok(files);
            }
        }
    }

    fn check_cancelled(&self) -> Result<(), RelayError> {
        match &self.cancel {
            Some(token) if token.is_cancelled() => Err(RelayError::Cancelled),
            _ => Ok(()),
        }
    }
}

/// Total length to declare for the chunk `[offset, offset + len)`.
///
/// The last chunk always carries the exact number of bytes transmitted.
/// Before that the declared length is used, raised to the bytes seen so far
/// when it is unknown or already contradicted.
fn effective_length(declared: Option<u64>, offset: u64, len: u64, is_last: bool) -> u64 {
    let seen = offset + len;
    if is_last {
        seen
    } else {
        declared.map_or(seen, |d| d.max(seen))
    }
}
