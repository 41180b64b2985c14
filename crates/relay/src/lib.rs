//! Relays remote files into the destination file host.
//!
//! Small files go up in one multipart request ([`SingleShotUploader`]).
//! Large ones are streamed through the chunk-upload protocol
//! ([`ChunkedUploader`]): the download is re-chunked to a fixed size, each
//! chunk is staged on disk for the duration of its request, and the
//! destination's session identifier is carried from one chunk to the next.
//! [`Relay`] ties both paths to the source download.

pub mod client;
pub mod dispatch;
pub mod error;
pub mod relay;
pub mod session;
pub mod single;
pub mod types;
pub mod uploader;

#[cfg(test)]
mod testutil;

pub use client::{ChunkRequest, ChunkTransport, HttpChunkClient};
pub use dispatch::{DEFAULT_CHUNK_THRESHOLD, Route, dispatch, dispatch_length};
pub use error::RelayError;
pub use relay::{Relay, RelayResult, SourceResponse, filename_from_url};
pub use session::{Phase, SessionState, Step};
pub use single::SingleShotUploader;
pub use types::{ProgressFn, TransferDescriptor};
pub use uploader::ChunkedUploader;

pub use filerelay_protocol::UploadSettings;
pub use filerelay_transfer::{ChunkStore, DEFAULT_CHUNK_SIZE};
