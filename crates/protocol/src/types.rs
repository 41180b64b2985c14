use std::fmt;

use serde::{Deserialize, Serialize};

/// Per-user upload options forwarded to the destination as request metadata.
///
/// Both values are opaque: they are copied into headers verbatim and never
/// interpreted by the relay.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadSettings {
    /// Deletion deadline understood by the destination (e.g. `"7d"`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry: Option<String>,
    /// Compression level label understood by the destination.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compression: Option<String>,
}

impl UploadSettings {
    /// Returns `true` if no option is set.
    pub fn is_empty(&self) -> bool {
        self.expiry.is_none() && self.compression.is_none()
    }
}

/// Value of the `Content-Range` header for one chunk.
///
/// `total` is `None` while the length of the file is still unknown; it is
/// rendered as `*`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContentRange {
    pub start: u64,
    pub len: u64,
    pub total: Option<u64>,
}

impl ContentRange {
    pub fn new(start: u64, len: u64, total: Option<u64>) -> Self {
        Self { start, len, total }
    }

    /// Inclusive index of the last byte, or `None` for an empty range.
    pub fn end(&self) -> Option<u64> {
        (self.len > 0).then(|| self.start + self.len - 1)
    }
}

impl fmt::Display for ContentRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.end() {
            Some(end) => write!(f, "bytes {}-{}/", self.start, end)?,
            None => f.write_str("bytes */")?,
        }
        match self.total {
            Some(total) => write!(f, "{total}"),
            None => f.write_str("*"),
        }
    }
}
