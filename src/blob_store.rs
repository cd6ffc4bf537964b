//! Blob ingestion, retrieval, and deletion
//!
//! Blobs are opaque byte payloads persisted as uniquely named files under
//! a time-derived directory shard:
//!
//! ```text
//! <root>/
//! ├── 2024-01-02/
//! │   ├── 03/
//! │   │   ├── 9f8e7d6c-5b4a-4f3e-8d2c-1b0a9f8e7d6c.png
//! │   │   └── 1a2b3c4d-0e9f-4a8b-b7c6-d5e4f3a2b1c0
//! │   └── 04/
//! └── .stage-Xw3kQz.png      # in-flight upload, gone on completion
//! ```
//!
//! Uploads stream into a staging file created in the store root (same
//! filesystem as every destination) and are published with one atomic
//! no-clobber rename, so a concurrent reader either sees nothing or the
//! complete blob, and an existing blob is never overwritten.

use crate::error::StoreError;
use crate::paths::PathResolver;
use crate::shard;
use crate::sniff;
use bytes::Bytes;
use chrono::Utc;
use futures_util::{Stream, StreamExt};
use std::io::{ErrorKind, SeekFrom};
use std::path::{Path, PathBuf};
use tempfile::TempPath;
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Result of storing a blob
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PutOutcome {
    /// The staging file was renamed into place; the normal path.
    Created { location: String },
    /// The freshly generated destination was already occupied. The upload
    /// is discarded rather than overwriting; callers report plain OK.
    AlreadyExists { location: String },
}

impl PutOutcome {
    /// Root-relative address of the blob, leading slash included.
    pub fn location(&self) -> &str {
        match self {
            PutOutcome::Created { location } => location,
            PutOutcome::AlreadyExists { location } => location,
        }
    }
}

/// An opened blob, ready to stream out once.
#[derive(Debug)]
pub struct Blob {
    /// Handle positioned at the start of the file.
    pub file: fs::File,
    pub len: u64,
    pub content_type: &'static str,
}

/// Blob store rooted at a single writable directory.
pub struct BlobStore {
    resolver: PathResolver,
}

impl BlobStore {
    /// Create a store over `root`. The directory must already exist and
    /// be writable; bootstrap validates that before any request is served.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            resolver: PathResolver::new(root),
        }
    }

    pub fn root(&self) -> &Path {
        self.resolver.root()
    }

    /// Store one upload.
    ///
    /// The request path contributes only its extension, carried verbatim
    /// onto the stored filename. The body streams chunk-by-chunk into a
    /// staging file, then moves to `<YYYY-MM-DD>/<HH>/<uuid><ext>` under
    /// the shard for the current UTC hour. A zero-byte body is rejected
    /// and leaves nothing behind.
    pub async fn put<S, E>(&self, request_path: &str, body: S) -> Result<PutOutcome, StoreError>
    where
        S: Stream<Item = Result<Bytes, E>> + Unpin,
        E: std::error::Error + Send + Sync + 'static,
    {
        let ext = request_extension(request_path);
        let (mut file, staging) = self.open_staging(&ext)?;

        let written = write_body(&mut file, body).await?;
        file.flush().await?;
        drop(file);

        if written == 0 {
            debug!(path = %request_path, "rejecting empty upload");
            return Err(StoreError::EmptyBody);
        }

        let (date, hour) = shard::segments(Utc::now());
        let shard_dir = shard::ensure_dir(self.root(), &date, &hour).await?;

        let filename = format!("{}{}", Uuid::new_v4(), ext);
        let destination = shard_dir.join(&filename);
        let location = format!("/{date}/{hour}/{filename}");

        let outcome = publish(staging, &destination, location)?;
        match &outcome {
            PutOutcome::Created { location } => {
                info!(location = %location, bytes = written, "stored blob");
            }
            PutOutcome::AlreadyExists { location } => {
                warn!(location = %location, "destination already occupied, upload discarded");
            }
        }
        Ok(outcome)
    }

    /// Open a blob for retrieval.
    ///
    /// The content type comes from sniffing the stored bytes, not from
    /// anything the uploader sent. The returned stream is single-pass; a
    /// repeated retrieval re-opens the file.
    pub async fn get(&self, request_path: &str) -> Result<Blob, StoreError> {
        let path = self.resolver.resolve(request_path)?;
        let meta = stat_file(&path, request_path).await?;

        let mut file = fs::File::open(&path).await?;
        let content_type = sniff_head(&mut file).await?;
        file.seek(SeekFrom::Start(0)).await?;

        debug!(path = %request_path, bytes = meta.len(), content_type, "serving blob");

        Ok(Blob {
            file,
            len: meta.len(),
            content_type,
        })
    }

    /// Remove a blob.
    ///
    /// Deleting a missing path reports `NotFound`; so does losing the
    /// unlink race to a concurrent delete. Neither is fatal.
    pub async fn delete(&self, request_path: &str) -> Result<(), StoreError> {
        let path = self.resolver.resolve(request_path)?;
        stat_file(&path, request_path).await?;

        match fs::remove_file(&path).await {
            Ok(()) => {
                info!(path = %request_path, "deleted blob");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(StoreError::NotFound(request_path.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Open a staging file in the store root. Same filesystem as the
    /// final destination, so the publish rename cannot cross devices.
    fn open_staging(&self, ext: &str) -> Result<(fs::File, TempPath), StoreError> {
        let staging = tempfile::Builder::new()
            .prefix(".stage-")
            .suffix(ext)
            .tempfile_in(self.root())?;
        let (std_file, path) = staging.into_parts();
        Ok((fs::File::from_std(std_file), path))
    }
}

/// Move a fully written staging file to its destination in one rename,
/// refusing to replace an existing file. The staging file is gone either
/// way: renamed on success, unlinked on the collision branch and on error.
fn publish(
    staging: TempPath,
    destination: &Path,
    location: String,
) -> Result<PutOutcome, StoreError> {
    match staging.persist_noclobber(destination) {
        Ok(()) => Ok(PutOutcome::Created { location }),
        Err(e) if e.error.kind() == ErrorKind::AlreadyExists => {
            Ok(PutOutcome::AlreadyExists { location })
        }
        Err(e) => Err(StoreError::Io(e.error)),
    }
}

/// Drain the body stream into the staging file in bounded chunks,
/// returning the byte count. Nothing is ever buffered whole.
async fn write_body<S, E>(file: &mut fs::File, mut body: S) -> Result<u64, StoreError>
where
    S: Stream<Item = Result<Bytes, E>> + Unpin,
    E: std::error::Error + Send + Sync + 'static,
{
    let mut written = 0u64;
    while let Some(chunk) = body.next().await {
        let chunk = chunk.map_err(|e| StoreError::Body(e.to_string()))?;
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }
    Ok(written)
}

/// Stat `path` and require a regular file; anything else is `NotFound`.
async fn stat_file(path: &Path, request_path: &str) -> Result<std::fs::Metadata, StoreError> {
    match fs::metadata(path).await {
        Ok(meta) if meta.is_file() => Ok(meta),
        Ok(_) => Err(StoreError::NotFound(request_path.to_string())),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            Err(StoreError::NotFound(request_path.to_string()))
        }
        Err(e) => Err(e.into()),
    }
}

/// Read the head of `file` and classify it.
async fn sniff_head(file: &mut fs::File) -> Result<&'static str, StoreError> {
    let mut head = vec![0u8; sniff::SNIFF_LEN];
    let mut filled = 0;
    while filled < head.len() {
        let n = file.read(&mut head[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(sniff::detect(&head[..filled]))
}

/// Extension of the request path, dot included, taken verbatim.
/// `/photo.png` yields `.png`; a path without one yields the empty string.
fn request_extension(request_path: &str) -> String {
    Path::new(request_path)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{e}"))
        .unwrap_or_default()
}
