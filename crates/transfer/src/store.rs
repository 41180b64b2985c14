use std::path::{Path, PathBuf};

use tokio::io::AsyncWriteExt;
use tracing::{trace, warn};

use crate::TransferError;
use crate::types::Chunk;

/// Staging area for chunks between slicing and upload.
///
/// Every staged chunk gets its own file named after the current time in
/// milliseconds plus a random UUID, so any number of concurrent transfers
/// can share one directory.
#[derive(Debug, Clone)]
pub struct ChunkStore {
    dir: PathBuf,
}

impl ChunkStore {
    /// Creates a store rooted at `dir`. The directory is created on first use.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Creates a store under the system temporary directory.
    pub fn in_temp_dir() -> Self {
        Self::new(std::env::temp_dir().join("filerelay"))
    }

    /// Returns the staging directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Writes `chunk` to a fresh staging file and syncs it to disk.
    ///
    /// If writing fails, the partially written file is removed before the
    /// error is returned.
    pub async fn stage(&self, chunk: &Chunk) -> Result<StagedChunk, TransferError> {
        tokio::fs::create_dir_all(&self.dir).await?;

        let path = self.dir.join(staging_name());
        let mut file = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await?;

        // From here on the handle owns the file and removes it when dropped.
        let staged = StagedChunk {
            path,
            offset: chunk.offset,
            len: chunk.len(),
            released: false,
        };

        file.write_all(&chunk.data).await?;
        file.sync_all().await?;

        trace!(path = %staged.path.display(), offset = staged.offset, len = staged.len, "chunk staged");
        Ok(staged)
    }
}

fn staging_name() -> String {
    format!(
        "{}-{}.part",
        chrono::Utc::now().timestamp_millis(),
        uuid::Uuid::new_v4().simple()
    )
}

/// A chunk staged on disk.
///
/// Call [`release`](Self::release) once the upload attempt is over. If the
/// handle is dropped instead (early return, panic, or a cancelled future),
/// the file is removed synchronously in `Drop`.
#[derive(Debug)]
pub struct StagedChunk {
    path: PathBuf,
    offset: u64,
    len: u64,
    released: bool,
}

impl StagedChunk {
    /// Path of the staging file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Offset of the staged chunk within the relayed file.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Size of the staged chunk in bytes.
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Opens the staging file for reading.
    pub async fn open(&self) -> Result<tokio::fs::File, TransferError> {
        Ok(tokio::fs::File::open(&self.path).await?)
    }

    /// Deletes the staging file. Failures are logged, never returned.
    pub async fn release(mut self) {
        self.released = true;
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => trace!(path = %self.path.display(), "chunk released"),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "failed to remove staged chunk");
            }
        }
    }
}

impl Drop for StagedChunk {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        if let Err(e) = std::fs::remove_file(&self.path)
            && e.kind() != std::io::ErrorKind::NotFound
        {
            warn!(path = %self.path.display(), error = %e, "failed to remove staged chunk");
        }
    }
}
