//! Filesystem-backed body store.
//!
//! # Responsibilities
//! - Map a [`CacheKey`] to `<root>/<host>_<port>/<path>`
//! - Persist bodies verbatim, never exposing a partial write
//! - Report modification times, used as the freshness proxy
//!
//! # Design Decisions
//! - No sidecar metadata: the body file's mtime is the only freshness input
//! - Writes stream into a temporary sibling and are renamed into place
//! - Removal of a missing entry is not an error

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tokio::io::AsyncRead;

use crate::cache::key::CacheKey;
use crate::error::{ProxyError, ProxyResult};
use crate::http::framing::{copy_exact, DEFAULT_CHUNK_SIZE};

/// Body store rooted at a cache directory.
#[derive(Debug, Clone)]
pub struct CacheStore {
    root: PathBuf,
    chunk_size: usize,
}

impl CacheStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    /// Use `chunk_size` bytes per read/write when streaming bodies.
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Absolute location of the body for `key`.
    pub fn path_for(&self, key: &CacheKey) -> PathBuf {
        self.root.join(key.relative_path())
    }

    /// Whether a body is stored for `key`.
    ///
    /// Creates any missing intermediate directories on the way.
    pub async fn exists(&self, key: &CacheKey) -> ProxyResult<bool> {
        let path = self.path_for(key);
        ensure_parent(&path).await?;
        match tokio::fs::metadata(&path).await {
            Ok(meta) => Ok(meta.is_file()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Last modification time of the stored body.
    pub async fn mtime(&self, key: &CacheKey) -> ProxyResult<SystemTime> {
        let meta = tokio::fs::metadata(self.path_for(key)).await?;
        Ok(meta.modified()?)
    }

    /// Modification time if an entry exists.
    pub async fn lookup(&self, key: &CacheKey) -> ProxyResult<Option<SystemTime>> {
        if !self.exists(key).await? {
            return Ok(None);
        }
        match self.mtime(key).await {
            Ok(modified) => Ok(Some(modified)),
            Err(ProxyError::Io(e)) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Open the stored body for streaming.
    ///
    /// The handle stays valid if the entry is later replaced or removed, so
    /// callers may release the key before reading from it.
    pub async fn open(&self, key: &CacheKey) -> ProxyResult<StoredBody> {
        let file = tokio::fs::File::open(self.path_for(key)).await?;
        let meta = file.metadata().await?;
        Ok(StoredBody {
            len: meta.len(),
            modified: meta.modified()?,
            file,
        })
    }

    /// Persist `body`, replacing any previous content.
    pub async fn write(&self, key: &CacheKey, body: &[u8]) -> ProxyResult<()> {
        let mut src = body;
        self.write_from(key, &mut src, body.len() as u64).await?;
        Ok(())
    }

    /// Stream exactly `len` bytes from `reader` into the entry for `key`.
    ///
    /// The body only becomes visible once all bytes were written; on error
    /// the previous content (if any) is left untouched.
    pub async fn write_from<R>(&self, key: &CacheKey, reader: &mut R, len: u64) -> ProxyResult<u64>
    where
        R: AsyncRead + Unpin,
    {
        let path = self.path_for(key);
        ensure_parent(&path).await?;
        let temp = temp_sibling(&path);

        let result = async {
            let mut file = tokio::fs::File::create(&temp).await?;
            let written = copy_exact(reader, &mut file, len, self.chunk_size).await?;
            file.sync_all().await?;
            drop(file);
            tokio::fs::rename(&temp, &path).await?;
            Ok::<u64, ProxyError>(written)
        }
        .await;

        if result.is_err() {
            let _ = tokio::fs::remove_file(&temp).await;
        } else {
            tracing::debug!(key = %key, bytes = len, path = %path.display(), "Cache entry stored");
        }
        result
    }

    /// Delete the entry for `key`. Succeeds if nothing was stored.
    pub async fn remove(&self, key: &CacheKey) -> ProxyResult<()> {
        match tokio::fs::remove_file(self.path_for(key)).await {
            Ok(()) => {
                tracing::debug!(key = %key, "Cache entry removed");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// An open cache entry.
#[derive(Debug)]
pub struct StoredBody {
    pub file: tokio::fs::File,
    pub len: u64,
    pub modified: SystemTime,
}

async fn ensure_parent(path: &Path) -> ProxyResult<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    Ok(())
}

fn temp_sibling(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{}.{}.tmp", name, uuid::Uuid::new_v4().simple()))
}
