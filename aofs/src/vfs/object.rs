//! Files over a whole-object store.
//!
//! An open file is a local cache file holding the object's content at open
//! time followed by everything written since. The store has no append or
//! partial-write primitive, so every flush uploads the whole cache; between
//! flushes the cursor always sits at the end of the cache, so writes append.

use crate::cadapter::client::{ObjectBackend, ObjectClient, StoreError};
use crate::config::FsOptions;
use crate::error::{Error, Errors, Result};
use crate::vfs::cache::{CacheFile, ScratchDir};
use crate::vfs::fs::{File, FileSystem};
use async_trait::async_trait;
use std::io::{self, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Opens [`ObjectFile`]s in one bucket. The store client is shared by every
/// file it opens.
pub struct ObjectFileSystem<B: ObjectBackend> {
    bucket: Arc<str>,
    client: ObjectClient<B>,
    scratch: ScratchDir,
}

impl<B: ObjectBackend> ObjectFileSystem<B> {
    pub fn new(client: ObjectClient<B>, options: FsOptions) -> Self {
        let scratch = ScratchDir::from(&options);
        Self {
            bucket: Arc::from(options.bucket),
            client,
            scratch,
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn client(&self) -> &ObjectClient<B> {
        &self.client
    }

    pub fn scratch(&self) -> &ScratchDir {
        &self.scratch
    }

    /// Drop a cache file that will never back an open file, keeping any
    /// removal failure next to `err`.
    async fn discard(&self, cache: CacheFile, err: Error) -> Error {
        let path = cache.path().to_path_buf();
        drop(cache);
        match ScratchDir::remove(&path).await {
            Ok(()) => err,
            Err(source) => {
                tracing::warn!("failed to remove cache file {}: {source}", path.display());
                err.append(Error::RemoveCache { path, source })
            }
        }
    }
}

#[async_trait]
impl<B: ObjectBackend + 'static> FileSystem for ObjectFileSystem<B> {
    type File = ObjectFile<B>;

    async fn open(&self, name: &str) -> Result<ObjectFile<B>> {
        let mut cache = self.scratch.create().await.map_err(Error::Scratch)?;

        let n = match self
            .client
            .get_object(&self.bucket, name, cache.file_mut())
            .await
        {
            Ok(n) => n,
            Err(e) if e.is_not_found() => {
                tracing::debug!("{}/{name} does not exist yet, opening empty", self.bucket);
                0
            }
            Err(source) => {
                let err = Error::Download {
                    bucket: self.bucket.to_string(),
                    key: name.to_string(),
                    source,
                };
                return Err(self.discard(cache, err).await);
            }
        };

        if let Err(e) = cache.seek(SeekFrom::Start(n)).await {
            return Err(self.discard(cache, Error::Seek(e)).await);
        }

        tracing::debug!(
            "opened {}/{name} with {n} bytes cached at {}",
            self.bucket,
            cache.path().display()
        );
        Ok(ObjectFile {
            bucket: Arc::clone(&self.bucket),
            key: name.to_string(),
            cache: Some(cache),
            client: self.client.clone(),
            dirty: 0,
        })
    }
}

/// An open object. `None` in `cache` means the file has been closed.
pub struct ObjectFile<B: ObjectBackend> {
    bucket: Arc<str>,
    key: String,
    cache: Option<CacheFile>,
    client: ObjectClient<B>,
    dirty: u64,
}

impl<B: ObjectBackend> ObjectFile<B> {
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Bytes written since the last successful flush.
    pub fn dirty_bytes(&self) -> u64 {
        self.dirty
    }

    pub fn is_closed(&self) -> bool {
        self.cache.is_none()
    }

    pub fn cache_path(&self) -> Option<&Path> {
        self.cache.as_ref().map(CacheFile::path)
    }

    fn upload_error(&self, source: StoreError) -> Error {
        Error::Upload {
            bucket: self.bucket.to_string(),
            key: self.key.clone(),
            source,
        }
    }

    /// Combine the two outcomes of a flush. A failed reposition is reported
    /// first since it breaks every later write, with the upload failure after
    /// it when both went wrong.
    fn settle_flush(
        &self,
        repositioned: io::Result<u64>,
        uploaded: std::result::Result<(), StoreError>,
    ) -> Result<u64> {
        match (repositioned, uploaded) {
            (Ok(size), Ok(())) => Ok(size),
            (Ok(_), Err(source)) => Err(self.upload_error(source)),
            (Err(e), Ok(())) => Err(Error::Seek(e)),
            (Err(e), Err(source)) => Err(Error::Seek(e).append(self.upload_error(source))),
        }
    }
}

#[async_trait]
impl<B: ObjectBackend + 'static> File for ObjectFile<B> {
    async fn write(&mut self, buf: &[u8]) -> Result<usize> {
        let cache = self.cache.as_mut().ok_or(Error::Closed)?;
        let n = cache.write(buf).await.map_err(Error::Write)?;
        self.dirty += n as u64;
        Ok(n)
    }

    async fn flush(&mut self) -> Result<()> {
        let cache = self.cache.as_mut().ok_or(Error::Closed)?;
        if self.dirty == 0 {
            return Ok(());
        }

        cache.rewind().await.map_err(Error::Seek)?;
        let uploaded = self
            .client
            .put_object(&self.bucket, &self.key, cache.file_mut())
            .await;
        // Back to the end whatever the upload did, so the next write appends.
        let repositioned = cache.seek_end().await;

        let size = self.settle_flush(repositioned, uploaded)?;
        tracing::debug!(
            "flushed {}/{}: {size} bytes ({} new)",
            self.bucket,
            self.key,
            self.dirty
        );
        self.dirty = 0;
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        if self.cache.is_none() {
            return Err(Error::Closed);
        }

        let mut errors = Errors::new();
        if let Err(e) = self.flush().await {
            errors.push(e);
        }
        if let Some(cache) = self.cache.take() {
            let path: PathBuf = cache.path().to_path_buf();
            if let Err(source) = cache.close().await {
                errors.push(Error::CloseCache {
                    path: path.clone(),
                    source,
                });
            }
            if let Err(source) = ScratchDir::remove(&path).await {
                errors.push(Error::RemoveCache { path, source });
            }
        }

        tracing::debug!(
            "closed {}/{} with {} error(s)",
            self.bucket,
            self.key,
            errors.len()
        );
        errors.into_result()
    }
}

impl<B: ObjectBackend> Drop for ObjectFile<B> {
    fn drop(&mut self) {
        let Some(cache) = self.cache.take() else {
            return;
        };
        if self.dirty > 0 {
            tracing::warn!(
                "{}/{} dropped without close, {} unflushed bytes discarded",
                self.bucket,
                self.key,
                self.dirty
            );
        }
        let path = cache.path().to_path_buf();
        drop(cache);
        if let Err(e) = std::fs::remove_file(&path) {
            tracing::warn!("failed to remove cache file {}: {e}", path.display());
        }
    }
}
