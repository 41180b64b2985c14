//! Data types shared by the relay paths.

use std::fmt;

use filerelay_protocol::{DEFAULT_CONTENT_TYPE, UploadSettings};
use filerelay_transfer::validate_filename;

use crate::error::RelayError;

/// Progress sink: `(bytes acknowledged so far, total bytes)`.
///
/// `total` is 0 while the length of the file is unknown.
/// The sink may borrow caller state for `'a`.
pub type ProgressFn<'a> = dyn Fn(u64, u64) + Send + Sync + 'a;

/// Everything needed to relay one file. Not modified once a transfer starts.
#[derive(Clone, PartialEq, Eq)]
pub struct TransferDescriptor {
    pub source_url: String,
    pub filename: String,
    /// Length advertised by the source; 0 means unknown. May be wrong.
    pub declared_length: u64,
    pub content_type: Option<String>,
    pub destination_base_url: String,
    /// Opaque value of the `Authorization` header.
    pub credential: String,
    pub settings: UploadSettings,
}

impl TransferDescriptor {
    pub fn new(
        source_url: impl Into<String>,
        filename: impl Into<String>,
        destination_base_url: impl Into<String>,
        credential: impl Into<String>,
    ) -> Self {
        Self {
            source_url: source_url.into(),
            filename: filename.into(),
            declared_length: 0,
            content_type: None,
            destination_base_url: destination_base_url.into(),
            credential: credential.into(),
            settings: UploadSettings::default(),
        }
    }

    pub fn with_declared_length(mut self, length: u64) -> Self {
        self.declared_length = length;
        self
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn with_settings(mut self, settings: UploadSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Declared length, or `None` if the source did not advertise one.
    pub fn declared_length(&self) -> Option<u64> {
        (self.declared_length > 0).then_some(self.declared_length)
    }

    /// MIME type to report, falling back to `application/octet-stream`.
    pub fn content_type(&self) -> &str {
        self.content_type
            .as_deref()
            .filter(|ct| !ct.is_empty())
            .unwrap_or(DEFAULT_CONTENT_TYPE)
    }

    /// Checks the fields that end up in request headers.
    pub fn validate(&self) -> Result<(), RelayError> {
        validate_filename(&self.filename)
            .map_err(|e| RelayError::InvalidDescriptor(e.to_string()))?;
        if self.destination_base_url.is_empty() {
            return Err(RelayError::InvalidDescriptor(
                "destination URL is empty".into(),
            ));
        }
        Ok(())
    }
}

// The credential never shows up in logs.
impl fmt::Debug for TransferDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransferDescriptor")
            .field("source_url", &self.source_url)
            .field("filename", &self.filename)
            .field("declared_length", &self.declared_length)
            .field("content_type", &self.content_type)
            .field("destination_base_url", &self.destination_base_url)
            .field("credential", &"<redacted>")
            .field("settings", &self.settings)
            .finish()
    }
}
