//! Error types for relay transfers.

use filerelay_transfer::TransferError;

/// Errors produced while relaying a file.
///
/// Every variant aborts the whole transfer: the destination either ends up
/// with the complete file or with nothing usable.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("download of {url} failed{}: {message}", status_suffix(.status))]
    Download {
        url: String,
        status: Option<u16>,
        message: String,
    },

    #[error("chunk upload at byte {offset} failed{}: {body}", status_suffix(.status))]
    ChunkTransfer {
        offset: u64,
        status: Option<u16>,
        body: String,
    },

    #[error("upload session aborted at byte {offset}: {reason}")]
    ChunkSession { offset: u64, reason: String },

    #[error("staging error: {0}")]
    Staging(#[from] TransferError),

    #[error("upload failed{}: {body}", status_suffix(.status))]
    SingleShot { status: Option<u16>, body: String },

    #[error("invalid transfer: {0}")]
    InvalidDescriptor(String),

    #[error("cancelled")]
    Cancelled,
}

impl RelayError {
    /// HTTP status code involved in the failure, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Download { status, .. }
            | Self::ChunkTransfer { status, .. }
            | Self::SingleShot { status, .. } => *status,
            _ => None,
        }
    }

    /// Byte offset of the chunk that failed, for chunked transfers.
    pub fn offset(&self) -> Option<u64> {
        match self {
            Self::ChunkTransfer { offset, .. } | Self::ChunkSession { offset, .. } => Some(*offset),
            _ => None,
        }
    }
}

fn status_suffix(status: &Option<u16>) -> String {
    match status {
        Some(code) => format!(" with status {code}"),
        None => String::new(),
    }
}
