//! Wire constants for the destination's upload endpoints.

/// Path of the one-shot upload endpoint, relative to the destination base URL.
pub const SINGLE_UPLOAD_PATH: &str = "/upload";

/// Path of the chunked upload endpoint, relative to the destination base URL.
pub const CHUNK_UPLOAD_PATH: &str = "/upload/chunk";

/// Name of the multipart field carrying file bytes.
pub const FILE_FIELD: &str = "file";

/// Content type reported when the source did not advertise one.
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Target filename of the upload.
pub const HEADER_FILENAME: &str = "x-upload-filename";

/// MIME type of the whole file.
pub const HEADER_CONTENT_TYPE: &str = "x-upload-content-type";

/// Effective total length of the file, in bytes.
pub const HEADER_CONTENT_LENGTH: &str = "x-upload-content-length";

/// `true` on the final chunk of a session, `false` otherwise.
pub const HEADER_LAST_CHUNK: &str = "x-upload-lastchunk";

/// Server-assigned session identifier, echoed from the second chunk on.
pub const HEADER_IDENTIFIER: &str = "x-upload-identifier";

/// Optional deletion deadline, passed through untouched.
pub const HEADER_DELETES_AT: &str = "x-upload-deletes-at";

/// Optional compression level label, passed through untouched.
pub const HEADER_COMPRESSION: &str = "x-upload-compression";

/// Joins a destination base URL and an endpoint path.
///
/// Trailing slashes on `base` are ignored so `https://host/` and
/// `https://host` resolve to the same endpoint.
pub fn endpoint_url(base: &str, path: &str) -> String {
    format!("{}{}", base.trim_end_matches('/'), path)
}
