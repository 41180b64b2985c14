//! Re-chunking of streamed bytes and transient staging of upload chunks.
//!
//! The pieces here are transport-agnostic: [`Rechunker`] turns any byte
//! stream into fixed-size [`Chunk`]s, and [`ChunkStore`] stages each chunk
//! on local disk for exactly as long as its upload attempt lasts.

mod chunked;
mod progress;
mod store;
mod types;
mod validation;

pub use chunked::Rechunker;
pub use progress::{ProgressThrottle, SpeedCalculator};
pub use store::{ChunkStore, StagedChunk};
pub use types::Chunk;
pub use validation::validate_filename;

/// Default chunk size: 90 MiB.
///
/// Kept below the destination's per-request body limit, with room for the
/// multipart framing.
pub const DEFAULT_CHUNK_SIZE: usize = 90 * 1024 * 1024;

/// Errors produced by the transfer crate.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("source stream failed: {0}")]
    Source(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("invalid file name: {0}")]
    InvalidName(String),
}
