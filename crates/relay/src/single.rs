//! One-request upload for files below the chunking threshold.

use filerelay_protocol::constants::{FILE_FIELD, SINGLE_UPLOAD_PATH};
use filerelay_protocol::{UploadResponse, endpoint_url};
use reqwest::header::{AUTHORIZATION, HeaderMap};
use reqwest::multipart::{Form, Part};
use serde_json::Value;
use tracing::{debug, info};

use crate::client::{credential_value, insert_settings};
use crate::error::RelayError;
use crate::types::TransferDescriptor;

/// Uploads a whole file in one multipart POST. Holds no session state.
#[derive(Debug, Clone)]
pub struct SingleShotUploader {
    http: reqwest::Client,
}

impl SingleShotUploader {
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }

    /// Streams `body` to `{base}/upload` and returns the result files.
    ///
    /// `length` is the exact body length when known; otherwise the part is
    /// sent with chunked transfer encoding.
    pub async fn upload(
        &self,
        descriptor: &TransferDescriptor,
        body: reqwest::Body,
        length: Option<u64>,
    ) -> Result<Vec<Value>, RelayError> {
        descriptor.validate()?;

        let url = endpoint_url(&descriptor.destination_base_url, SINGLE_UPLOAD_PATH);
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, credential_value(&descriptor.credential)?);
        insert_settings(&mut headers, &descriptor.settings)?;

        let part = match length {
            Some(len) => Part::stream_with_length(body, len),
            None => Part::stream(body),
        }
        .file_name(descriptor.filename.clone())
        .mime_str(descriptor.content_type())
        .map_err(|e| RelayError::InvalidDescriptor(format!("content type: {e}")))?;
        let form = Form::new().part(FILE_FIELD, part);

        debug!(filename = %descriptor.filename, ?length, "single-shot upload");

        let network = |e: reqwest::Error| RelayError::SingleShot {
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
        let text = resp.text().await.map_err(network)?;

        let files = status
            .is_success()
            .then(|| serde_json::from_str::<UploadResponse>(&text).ok())
            .flatten()
            .and_then(UploadResponse::into_files);

        match files {
            Some(files) => {
                info!(filename = %descriptor.filename, files = files.len(), "single-shot upload complete");
                Ok(files)
            }
            None => Err(RelayError::SingleShot {
                status: Some(status.as_u16()),
                body: text,
            }),
        }
    }
}
