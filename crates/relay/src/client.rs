//! Chunk transfer client: one HTTP exchange per staged chunk.
//!
//! [`ChunkTransport`] is the seam between the session coordinator and the
//! network, so the coordinator can be driven by a recording mock in tests.
//! [`HttpChunkClient`] is the `reqwest` implementation.

use std::future::Future;
use std::pin::Pin;

use filerelay_protocol::constants::{
    CHUNK_UPLOAD_PATH, FILE_FIELD, HEADER_COMPRESSION, HEADER_CONTENT_LENGTH, HEADER_CONTENT_TYPE,
    HEADER_DELETES_AT, HEADER_FILENAME, HEADER_IDENTIFIER, HEADER_LAST_CHUNK,
};
use filerelay_protocol::{ChunkOutcome, ContentRange, UploadResponse, UploadSettings, endpoint_url};
use filerelay_transfer::StagedChunk;
use reqwest::header::{AUTHORIZATION, CONTENT_RANGE, HeaderMap, HeaderName, HeaderValue};
use reqwest::multipart::{Form, Part};
use tokio_util::io::ReaderStream;
use tracing::debug;

use crate::error::RelayError;
use crate::types::TransferDescriptor;

/// Everything the transport needs to describe one chunk on the wire.
#[derive(Debug, Clone)]
pub struct ChunkRequest<'a> {
    pub descriptor: &'a TransferDescriptor,
    /// Session identifier; `None` on the first chunk.
    pub session_id: Option<&'a str>,
    pub range: ContentRange,
    pub is_last: bool,
}

impl ChunkRequest<'_> {
    /// Offset of the chunk within the file.
    pub fn offset(&self) -> u64 {
        self.range.start
    }

    /// Effective total length declared with this chunk.
    ///
    /// Falls back to the end of the chunk when the range carries no total.
    pub fn total_length(&self) -> u64 {
        self.range
            .total
            .unwrap_or(self.range.start + self.range.len)
    }

    /// Builds the protocol headers for this chunk.
    pub fn headers(&self) -> Result<HeaderMap, RelayError> {
        let d = self.descriptor;
        let mut headers = HeaderMap::new();

        headers.insert(AUTHORIZATION, credential_value(&d.credential)?);
        let total = self.total_length();
        let range = ContentRange::new(self.range.start, self.range.len, Some(total));
        headers.insert(CONTENT_RANGE, ascii_value(&range.to_string())?);
        headers.insert(
            HeaderName::from_static(HEADER_FILENAME),
            HeaderValue::from_bytes(d.filename.as_bytes()).map_err(|_| {
                RelayError::InvalidDescriptor(format!("filename {:?} cannot be sent", d.filename))
            })?,
        );
        headers.insert(
            HeaderName::from_static(HEADER_CONTENT_TYPE),
            ascii_value(d.content_type())?,
        );
        headers.insert(
            HeaderName::from_static(HEADER_CONTENT_LENGTH),
            HeaderValue::from(total),
        );
        headers.insert(
            HeaderName::from_static(HEADER_LAST_CHUNK),
            HeaderValue::from_static(if self.is_last { "true" } else { "false" }),
        );
        if let Some(id) = self.session_id {
            headers.insert(HeaderName::from_static(HEADER_IDENTIFIER), ascii_value(id)?);
        }
        insert_settings(&mut headers, &d.settings)?;

        Ok(headers)
    }
}

/// Builds the `Authorization` header value, marked sensitive.
pub(crate) fn credential_value(credential: &str) -> Result<HeaderValue, RelayError> {
    let mut value = HeaderValue::from_str(credential).map_err(|_| {
        RelayError::InvalidDescriptor("credential is not a valid header value".into())
    })?;
    value.set_sensitive(true);
    Ok(value)
}

/// Adds the optional `x-upload-deletes-at` and `x-upload-compression` headers.
pub(crate) fn insert_settings(
    headers: &mut HeaderMap,
    settings: &UploadSettings,
) -> Result<(), RelayError> {
    if let Some(expiry) = &settings.expiry {
        headers.insert(HeaderName::from_static(HEADER_DELETES_AT), ascii_value(expiry)?);
    }
    if let Some(compression) = &settings.compression {
        headers.insert(
            HeaderName::from_static(HEADER_COMPRESSION),
            ascii_value(compression)?,
        );
    }
    Ok(())
}

fn ascii_value(value: &str) -> Result<HeaderValue, RelayError> {
    HeaderValue::from_str(value)
        .map_err(|_| RelayError::InvalidDescriptor(format!("{value:?} is not a valid header value")))
}

/// Sends one staged chunk and classifies the destination's answer.
///
/// Implementations must not retry: a failed exchange is reported to the
/// coordinator, which aborts the transfer.
pub trait ChunkTransport: Send + Sync {
    fn send_chunk<'a>(
        &'a self,
        request: &'a ChunkRequest<'a>,
        staged: &'a StagedChunk,
    ) -> Pin<Box<dyn Future<Output = Result<ChunkOutcome, RelayError>> + Send + 'a>>;
}

/// `reqwest`-backed chunk transport.
#[derive(Debug, Clone)]
pub struct HttpChunkClient {
    http: reqwest::Client,
}

impl HttpChunkClient {
    /// Creates a client sharing the given HTTP connection pool.
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }

    async fn post_chunk(
        &self,
        request: &ChunkRequest<'_>,
        staged: &StagedChunk,
    ) -> Result<ChunkOutcome, RelayError> {
        let offset = request.offset();
        let url = endpoint_url(&request.descriptor.destination_base_url, CHUNK_UPLOAD_PATH);
        let headers = request.headers()?;

        let file = staged.open().await?;
        let body = reqwest::Body::wrap_stream(ReaderStream::new(file));
        let part = Part::stream_with_length(body, staged.len())
            .file_name(request.descriptor.filename.clone())
            .mime_str(request.descriptor.content_type())
            .map_err(|e| RelayError::InvalidDescriptor(format!("content type: {e}")))?;
        let form = Form::new().part(FILE_FIELD, part);

        debug!(
            offset,
            len = staged.len(),
            is_last = request.is_last,
            has_session = request.session_id.is_some(),
            "sending chunk"
        );

        let network = |e: reqwest::Error| RelayError::ChunkTransfer {
            offset,
            status: None,
            body: e.to_string(),
        };

        let resp = self
            .http
            .post(&url)
            .headers(headers)
            .multipart(form)
            .send()
            .await
            .map_err(network)?;
        let status = resp.status();
        let body = resp.text().await.map_err(network)?;

        if !status.is_success() {
            return Err(RelayError::ChunkTransfer {
                offset,
                status: Some(status.as_u16()),
                body,
            });
        }

        let parsed: UploadResponse = match serde_json::from_str(&body) {
            Ok(parsed) => parsed,
            Err(_) => {
                return Err(RelayError::ChunkTransfer {
                    offset,
                    status: Some(status.as_u16()),
                    body,
                });
            }
        };

        parsed.classify().ok_or_else(|| RelayError::ChunkSession {
            offset,
            reason: format!("unrecognised response: {body}"),
        })
    }
}

impl ChunkTransport for HttpChunkClient {
    fn send_chunk<'a>(
        &'a self,
        request: &'a ChunkRequest<'a>,
        staged: &'a StagedChunk,
    ) -> Pin<Box<dyn Future<Output = Result<ChunkOutcome, RelayError>> + Send + 'a>> {
        Box::pin(self.post_chunk(request, staged))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{Canned, MockServer};
    use bytes::Bytes;
    use filerelay_transfer::{Chunk, ChunkStore};
    use tempfile::TempDir;

    fn descriptor(base: &str) -> TransferDescriptor {
        TransferDescriptor::new("https://cdn.example/clip.mp4", "clip.mp4", base, "Bearer tok")
            .with_declared_length(95)
            .with_content_type("video/mp4")
    }

    async fn stage(store: &ChunkStore, offset: u64, data: &'static [u8]) -> StagedChunk {
        let chunk = Chunk {
            offset,
            data: Bytes::from_static(data),
            is_last: false,
        };
        store.stage(&chunk).await.unwrap()
    }

    #[test]
    fn headers_for_first_chunk() {
        let d = descriptor("http://unused");
        let req = ChunkRequest {
            descriptor: &d,
            session_id: None,
            range: ContentRange::new(0, 50, Some(95)),
            is_last: false,
        };
        let headers = req.headers().unwrap();

        assert_eq!(headers[AUTHORIZATION], "Bearer tok");
        assert!(headers[AUTHORIZATION].is_sensitive());
        assert_eq!(headers[CONTENT_RANGE], "bytes 0-49/95");
        assert_eq!(headers[HEADER_FILENAME], "clip.mp4");
        assert_eq!(headers[HEADER_CONTENT_TYPE], "video/mp4");
        assert_eq!(headers[HEADER_CONTENT_LENGTH], "95");
        assert_eq!(headers[HEADER_LAST_CHUNK], "false");
        assert!(!headers.contains_key(HEADER_IDENTIFIER));
        assert!(!headers.contains_key(HEADER_DELETES_AT));
        assert!(!headers.contains_key(HEADER_COMPRESSION));
    }

    #[test]
    fn headers_echo_session_and_settings() {
        let d = descriptor("http://unused").with_settings(UploadSettings {
            expiry: Some("7d".into()),
            compression: Some("max".into()),
        });
        let req = ChunkRequest {
            descriptor: &d,
            session_id: Some("sess-42"),
            range: ContentRange::new(50, 45, Some(95)),
            is_last: true,
        };
        let headers = req.headers().unwrap();

        assert_eq!(headers[HEADER_IDENTIFIER], "sess-42");
        assert_eq!(headers[HEADER_LAST_CHUNK], "true");
        assert_eq!(headers[CONTENT_RANGE], "bytes 50-94/95");
        assert_eq!(headers[HEADER_DELETES_AT], "7d");
        assert_eq!(headers[HEADER_COMPRESSION], "max");
    }

    #[test]
    fn headers_always_carry_numeric_total() {
        let d = descriptor("http://unused").with_declared_length(0);
        let req = ChunkRequest {
            descriptor: &d,
            session_id: None,
            range: ContentRange::new(0, 50, None),
            is_last: false,
        };
        let headers = req.headers().unwrap();
        assert_eq!(headers[CONTENT_RANGE], "bytes 0-49/50");
        assert_eq!(headers[HEADER_CONTENT_LENGTH], "50");
    }

    #[test]
    fn headers_reject_invalid_credential() {
        let mut d = descriptor("http://unused");
        d.credential = "tok\r\nx-evil: 1".into();
        let req = ChunkRequest {
            descriptor: &d,
            session_id: None,
            range: ContentRange::new(0, 1, Some(1)),
            is_last: true,
        };
        assert!(matches!(req.headers(), Err(RelayError::InvalidDescriptor(_))));
    }

    #[tokio::test]
    async fn post_chunk_sends_headers_and_body() {
        let server = MockServer::start(vec![Canned::json(
            200,
            r#"{"partialIdentifier":"sess-1","partialSuccess":true}"#,
        )])
        .await;
        let tmp = TempDir::new().unwrap();
        let store = ChunkStore::new(tmp.path());
        let staged = stage(&store, 0, b"first-chunk-bytes").await;

        let d = descriptor(&server.url);
        let req = ChunkRequest {
            descriptor: &d,
            session_id: None,
            range: ContentRange::new(0, staged.len(), Some(95)),
            is_last: false,
        };
        let client = HttpChunkClient::new(reqwest::Client::new());
        let outcome = client.send_chunk(&req, &staged).await.unwrap();
        assert_eq!(outcome, ChunkOutcome::SessionAssigned("sess-1".into()));

        let requests = server.requests();
        assert_eq!(requests.len(), 1);
        let r = &requests[0];
        assert_eq!(r.method, "POST");
        assert_eq!(r.path, "/upload/chunk");
        assert_eq!(r.header("authorization"), Some("Bearer tok"));
        assert_eq!(r.header("content-range"), Some("bytes 0-16/95"));
        assert_eq!(r.header("x-upload-filename"), Some("clip.mp4"));
        assert_eq!(r.header("x-upload-lastchunk"), Some("false"));
        assert_eq!(r.header("x-upload-identifier"), None);
        assert!(r.header("content-type").unwrap().starts_with("multipart/form-data"));
        assert!(r.body_contains(b"first-chunk-bytes"));
        assert!(r.body_contains(b"name=\"file\""));

        staged.release().await;
    }

    #[tokio::test]
    async fn post_chunk_completed() {
        let server = MockServer::start(vec![Canned::json(
            200,
            r#"{"files":[{"url":"https://files.example/clip.mp4"}]}"#,
        )])
        .await;
        let tmp = TempDir::new().unwrap();
        let store = ChunkStore::new(tmp.path());
        let staged = stage(&store, 50, b"tail").await;

        let d = descriptor(&server.url);
        let req = ChunkRequest {
            descriptor: &d,
            session_id: Some("sess-1"),
            range: ContentRange::new(50, staged.len(), Some(54)),
            is_last: true,
        };
        let client = HttpChunkClient::new(reqwest::Client::new());
        match client.send_chunk(&req, &staged).await.unwrap() {
            ChunkOutcome::Completed(files) => {
                assert_eq!(files[0]["url"], "https://files.example/clip.mp4");
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert_eq!(server.requests()[0].header("x-upload-identifier"), Some("sess-1"));
        staged.release().await;
    }

    #[tokio::test]
    async fn post_chunk_error_status_carries_body() {
        let server = MockServer::start(vec![Canned::json(500, r#"{"error":"disk full"}"#)]).await;
        let tmp = TempDir::new().unwrap();
        let store = ChunkStore::new(tmp.path());
        let staged = stage(&store, 100, b"data").await;

        let d = descriptor(&server.url);
        let req = ChunkRequest {
            descriptor: &d,
            session_id: Some("sess-1"),
            range: ContentRange::new(100, 4, Some(200)),
            is_last: false,
        };
        let client = HttpChunkClient::new(reqwest::Client::new());
        match client.send_chunk(&req, &staged).await {
            Err(RelayError::ChunkTransfer {
                offset,
                status,
                body,
            }) => {
                assert_eq!(offset, 100);
                assert_eq!(status, Some(500));
                assert_eq!(body, r#"{"error":"disk full"}"#);
            }
            other => panic!("unexpected result: {other:?}"),
        }
        staged.release().await;
    }

    #[tokio::test]
    async fn post_chunk_error_status_wins_over_body_shape() {
        // A completion-shaped body on a non-2xx status is still a failure.
        let server = MockServer::start(vec![Canned::json(403, r#"{"files":[{"url":"x"}]}"#)]).await;
        let tmp = TempDir::new().unwrap();
        let store = ChunkStore::new(tmp.path());
        let staged = stage(&store, 0, b"data").await;

        let d = descriptor(&server.url);
        let req = ChunkRequest {
            descriptor: &d,
            session_id: None,
            range: ContentRange::new(0, 4, Some(4)),
            is_last: true,
        };
        let client = HttpChunkClient::new(reqwest::Client::new());
        let err = client.send_chunk(&req, &staged).await.unwrap_err();
        assert_eq!(err.status(), Some(403));
        staged.release().await;
    }

    #[tokio::test]
    async fn post_chunk_unparseable_body() {
        let server = MockServer::start(vec![Canned::json(200, "<html>oops</html>")]).await;
        let tmp = TempDir::new().unwrap();
        let store = ChunkStore::new(tmp.path());
        let staged = stage(&store, 0, b"data").await;

        let d = descriptor(&server.url);
        let req = ChunkRequest {
            descriptor: &d,
            session_id: None,
            range: ContentRange::new(0, 4, Some(8)),
            is_last: false,
        };
        let client = HttpChunkClient::new(reqwest::Client::new());
        match client.send_chunk(&req, &staged).await {
            Err(RelayError::ChunkTransfer { status, body, .. }) => {
                assert_eq!(status, Some(200));
                assert_eq!(body, "<html>oops</html>");
            }
            other => panic!("unexpected result: {other:?}"),
        }
        staged.release().await;
    }

    #[tokio::test]
    async fn post_chunk_unrecognised_shape_is_session_error() {
        let server = MockServer::start(vec![Canned::json(200, "{}")]).await;
        let tmp = TempDir::new().unwrap();
        let store = ChunkStore::new(tmp.path());
        let staged = stage(&store, 0, b"data").await;

        let d = descriptor(&server.url);
        let req = ChunkRequest {
            descriptor: &d,
            session_id: None,
            range: ContentRange::new(0, 4, Some(8)),
            is_last: false,
        };
        let client = HttpChunkClient::new(reqwest::Client::new());
        let err = client.send_chunk(&req, &staged).await.unwrap_err();
        assert!(matches!(err, RelayError::ChunkSession { offset: 0, .. }));
        staged.release().await;
    }

    #[tokio::test]
    async fn post_chunk_connection_refused() {
        // Bind and drop to get a port nobody listens on.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let tmp = TempDir::new().unwrap();
        let store = ChunkStore::new(tmp.path());
        let staged = stage(&store, 0, b"data").await;

        let d = descriptor(&format!("http://127.0.0.1:{port}"));
        let req = ChunkRequest {
            descriptor: &d,
            session_id: None,
            range: ContentRange::new(0, 4, Some(4)),
            is_last: true,
        };
        let client = HttpChunkClient::new(reqwest::Client::new());
        let err = client.send_chunk(&req, &staged).await.unwrap_err();
        assert!(matches!(err, RelayError::ChunkTransfer { status: None, .. }));
        staged.release().await;
    }
}
