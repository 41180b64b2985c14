//! Per-transfer session state and its transitions.

use filerelay_protocol::ChunkOutcome;
use serde_json::Value;
use tracing::trace;

use crate::error::RelayError;

/// Where a chunked transfer currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Downloading,
    Chunking,
    SendingChunk,
    Completed,
    PartialFailure,
    TransferError,
}

impl Phase {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Completed | Self::PartialFailure | Self::TransferError
        )
    }
}

/// What the coordinator does after a chunk has been answered.
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    /// Keep sending chunks.
    Next,
    /// The destination stored the file; stop and return its result.
    Finish(Vec<Value>),
}

/// Mutable state of one chunked transfer.
///
/// Owned by a single coordinator; never shared between transfers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionState {
    session_id: Option<String>,
    bytes_sent: u64,
    phase: Phase,
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionState {
    pub fn new() -> Self {
        Self {
            session_id: None,
            bytes_sent: 0,
            phase: Phase::Downloading,
        }
    }

    /// Session identifier assigned by the destination, once known.
    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    /// Bytes acknowledged by the destination so far.
    pub fn bytes_sent(&self) -> u64 {
        self.bytes_sent
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_terminal(&self) -> bool {
        self.phase.is_terminal()
    }

    pub fn begin_download(&mut self) {
        self.set_phase(Phase::Downloading);
    }

    pub fn begin_chunking(&mut self) {
        self.set_phase(Phase::Chunking);
    }

    pub fn begin_chunk(&mut self) {
        self.set_phase(Phase::SendingChunk);
    }

    /// Marks the transfer as failed in `phase`.
    pub fn fail(&mut self, phase: Phase) {
        debug_assert!(matches!(
            phase,
            Phase::PartialFailure | Phase::TransferError
        ));
        self.set_phase(phase);
    }

    /// Applies the destination's answer to the chunk at `offset`.
    ///
    /// The byte counter only moves once a chunk is acknowledged. A refusal,
    /// or an identifier that differs from the one already recorded, ends the
    /// session with [`RelayError::ChunkSession`].
    pub fn apply_outcome(
        &mut self,
        offset: u64,
        chunk_len: u64,
        outcome: ChunkOutcome,
    ) -> Result<Step, RelayError> {
        match outcome {
            ChunkOutcome::Completed(files) => {
                self.bytes_sent += chunk_len;
                self.set_phase(Phase::Completed);
                Ok(Step::Finish(files))
            }
            ChunkOutcome::SessionAssigned(id) => {
                if let Some(current) = &self.session_id
                    && *current != id
                {
                    let reason = format!("session identifier changed from {current} to {id}");
                    self.set_phase(Phase::PartialFailure);
                    return Err(RelayError::ChunkSession { offset, reason });
                }
                self.session_id = Some(id);
                self.bytes_sent += chunk_len;
                Ok(Step::Next)
            }
            ChunkOutcome::Continued => {
                self.bytes_sent += chunk_len;
                Ok(Step::Next)
            }
            ChunkOutcome::Accepted => {
                self.set_phase(Phase::PartialFailure);
                Err(RelayError::ChunkSession {
                    offset,
                    reason: "destination answered partialSuccess: false".into(),
                })
            }
        }
    }

    fn set_phase(&mut self, phase: Phase) {
        if self.phase != phase {
            trace!(from = ?self.phase, to = ?phase, bytes_sent = self.bytes_sent, "session phase");
            self.phase = phase;
        }
    }
}
