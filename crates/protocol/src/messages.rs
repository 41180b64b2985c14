use serde::{Deserialize, Serialize};

/// JSON body returned by both upload endpoints.
///
/// Exactly one of the fields is expected to be meaningful per response;
/// [`UploadResponse::classify`] decides which.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    /// Result files; present and non-empty once the whole upload is stored.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub files: Option<Vec<serde_json::Value>>,
    /// Session identifier to echo on the following chunks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partial_identifier: Option<String>,
    /// `false` when the destination refused the chunk.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partial_success: Option<bool>,
}

/// What a single chunk exchange told us about the session.
#[derive(Debug, Clone, PartialEq)]
pub enum ChunkOutcome {
    /// The destination stored the whole file; carries the result files.
    Completed(Vec<serde_json::Value>),
    /// The destination (re)assigned the session identifier.
    SessionAssigned(String),
    /// The destination answered `partialSuccess: false`. Callers must treat
    /// this as a partial failure and abort the session.
    Accepted,
    /// The destination acknowledged the chunk without a new identifier.
    Continued,
}

impl UploadResponse {
    /// Classifies the response, or returns `None` if the body matches none
    /// of the known shapes.
    ///
    /// Precedence: non-empty `files`, then `partialIdentifier`, then
    /// `partialSuccess`.
    pub fn classify(self) -> Option<ChunkOutcome> {
        if let Some(files) = self.files
            && !files.is_empty()
        {
            return Some(ChunkOutcome::Completed(files));
        }
        if let Some(id) = self.partial_identifier
            && !id.is_empty()
        {
            return Some(ChunkOutcome::SessionAssigned(id));
        }
        match self.partial_success {
            Some(false) => Some(ChunkOutcome::Accepted),
            Some(true) => Some(ChunkOutcome::Continued),
            None => None,
        }
    }

    /// Returns the result files if the upload is complete.
    pub fn into_files(self) -> Option<Vec<serde_json::Value>> {
        self.files.filter(|f| !f.is_empty())
    }
}
