//! End-to-end relay: download from the source, pick a path, upload.

use filerelay_transfer::{ChunkStore, DEFAULT_CHUNK_SIZE};
use percent_encoding::percent_decode_str;
use reqwest::header::CONTENT_TYPE;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::client::HttpChunkClient;
use crate::dispatch::{DEFAULT_CHUNK_THRESHOLD, Route, dispatch_length};
use crate::error::RelayError;
use crate::single::SingleShotUploader;
use crate::types::{ProgressFn, TransferDescriptor};
use crate::uploader::ChunkedUploader;

/// Result of [`Relay::relay`].
#[derive(Debug, Clone, PartialEq)]
pub struct RelayResult {
    pub route: Route,
    pub files: Vec<Value>,
}

/// An opened source download.
#[derive(Debug)]
pub struct SourceResponse {
    pub response: reqwest::Response,
    /// `Content-Length` advertised by the source.
    pub length: Option<u64>,
    pub content_type: Option<String>,
}

impl SourceResponse {
    /// Resolves the descriptor against what the source reported.
    ///
    /// A measured length replaces the declared one, matching the routing
    /// rule of [`dispatch_length`].
    fn complete(&self, descriptor: &TransferDescriptor) -> TransferDescriptor {
        let mut resolved = descriptor.clone();
        if let Some(len) = self.length.filter(|&len| len > 0) {
            resolved.declared_length = len;
        }
        if resolved.content_type.is_none() {
            resolved.content_type = self.content_type.clone();
        }
        resolved
    }
}

/// Relays files from HTTP sources to the destination.
///
/// Cheap to clone; one instance can serve any number of concurrent
/// transfers.
#[derive(Debug, Clone)]
pub struct Relay {
    http: reqwest::Client,
    store: ChunkStore,
    chunk_size: usize,
    threshold: u64,
    cancel: Option<CancellationToken>,
}

impl Relay {
    pub fn new(http: reqwest::Client) -> Self {
        Self {
            http,
            store: ChunkStore::in_temp_dir(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            threshold: DEFAULT_CHUNK_THRESHOLD,
            cancel: None,
        }
    }

    pub fn with_store(mut self, store: ChunkStore) -> Self {
        self.store = store;
        self
    }

    /// Sets the chunk size. 0 selects the default.
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = if chunk_size == 0 {
            DEFAULT_CHUNK_SIZE
        } else {
            chunk_size
        };
        self
    }

    pub fn with_threshold(mut self, threshold: u64) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn threshold(&self) -> u64 {
        self.threshold
    }

    /// Starts downloading the source.
    pub async fn open_source(&self, source_url: &str) -> Result<SourceResponse, RelayError> {
        let download = |status: Option<u16>, message: String| RelayError::Download {
            url: source_url.to_string(),
            status,
            message,
        };

        let response = self
            .http
            .get(source_url)
            .send()
            .await
            .map_err(|e| download(None, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let reason = status.canonical_reason().unwrap_or("error").to_string();
            return Err(download(Some(status.as_u16()), reason));
        }

        let length = response.content_length();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        debug!(url = %source_url, ?length, ?content_type, "source opened");
        Ok(SourceResponse {
            response,
            length,
            content_type,
        })
    }

    /// Relays the file through the chunked path regardless of its size.
    pub async fn upload(
        &self,
        descriptor: &TransferDescriptor,
        on_progress: &ProgressFn<'_>,
    ) -> Result<Vec<Value>, RelayError> {
        descriptor.validate()?;
        let source = self.open_source(&descriptor.source_url).await?;
        let resolved = source.complete(descriptor);
        self.upload_chunked(&resolved, source.response, on_progress)
            .await
    }

    /// Relays the file, choosing the path from its size.
    pub async fn relay(
        &self,
        descriptor: &TransferDescriptor,
        on_progress: &ProgressFn<'_>,
    ) -> Result<RelayResult, RelayError> {
        descriptor.validate()?;
        let source = self.open_source(&descriptor.source_url).await?;
        let route = dispatch_length(source.length, descriptor.declared_length, self.threshold);
        let resolved = source.complete(descriptor);

        info!(
            filename = %resolved.filename,
            length = resolved.declared_length,
            ?route,
            "relaying file"
        );

        let files = match route {
            Route::Chunked => {
                self.upload_chunked(&resolved, source.response, on_progress)
                    .await?
            }
            Route::SingleShot => {
                let length = source.length;
                let files = SingleShotUploader::new(self.http.clone())
                    .upload(&resolved, reqwest::Body::from(source.response), length)
                    .await?;
                if let Some(len) = length {
                    on_progress(len, len);
                }
                files
            }
        };

        Ok(RelayResult { route, files })
    }

    async fn upload_chunked(
        &self,
        descriptor: &TransferDescriptor,
        response: reqwest::Response,
        on_progress: &ProgressFn<'_>,
    ) -> Result<Vec<Value>, RelayError> {
        let mut uploader = ChunkedUploader::new(
            HttpChunkClient::new(self.http.clone()),
            self.store.clone(),
            self.chunk_size,
        );
        if let Some(cancel) = &self.cancel {
            uploader = uploader.with_cancel(cancel.clone());
        }
        uploader
            .upload(descriptor, Box::pin(response.bytes_stream()), on_progress)
            .await
    }
}

/// Derives a filename from the last path segment of `url`.
///
/// Returns `None` if the URL has no usable segment.
pub fn filename_from_url(url: &str) -> Option<String> {
    let parsed = reqwest::Url::parse(url).ok()?;
    let segment = parsed.path_segments()?.rev().find(|s| !s.is_empty())?;
    let decoded = percent_decode_str(segment).decode_utf8().ok()?;
    let name = decoded.trim();
    (!name.is_empty()).then(|| name.to_string())
}
