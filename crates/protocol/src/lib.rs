//! Wire types for the destination's single-shot and chunked upload endpoints.

pub mod constants;
pub mod messages;
pub mod types;

// Re-export primary types for convenience.
pub use constants::{DEFAULT_CONTENT_TYPE, endpoint_url};
pub use messages::{ChunkOutcome, UploadResponse};
pub use types::{ContentRange, UploadSettings};
