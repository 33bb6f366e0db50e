//! Local scratch files that hold the full content of an open file.

use crate::config::FsOptions;
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use tokio::{
    fs,
    io::{self, AsyncSeekExt, AsyncWriteExt},
};

/// Allocates uniquely named scratch files in one directory.
#[derive(Debug, Clone)]
pub struct ScratchDir {
    dir: PathBuf,
    prefix: String,
}

impl ScratchDir {
    pub fn new<P: Into<PathBuf>>(dir: P, prefix: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            prefix: prefix.into(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Create a new, empty, read-write file. The file is not removed
    /// automatically; whoever owns it must call [`ScratchDir::remove`].
    pub async fn create(&self) -> io::Result<CacheFile> {
        let dir = self.dir.clone();
        let prefix = self.prefix.clone();
        let (file, path) = tokio::task::spawn_blocking(move || {
            tempfile::Builder::new()
                .prefix(&prefix)
                .tempfile_in(&dir)?
                .keep()
                .map_err(|e| e.error)
        })
        .await
        .map_err(io::Error::other)??;
        Ok(CacheFile::from_parts(fs::File::from_std(file), path))
    }

    pub async fn remove(path: &Path) -> io::Result<()> {
        fs::remove_file(path).await
    }
}

impl From<&FsOptions> for ScratchDir {
    fn from(options: &FsOptions) -> Self {
        let dir = options
            .scratch_dir
            .clone()
            .unwrap_or_else(std::env::temp_dir);
        ScratchDir::new(dir, options.scratch_prefix.clone())
    }
}

/// A scratch file with a cursor.
///
/// `pos` is the offset every byte before which has been acknowledged to a
/// caller. A failed write is rolled back to it, so the file never holds bytes
/// the caller was told did not make it.
pub struct CacheFile {
    file: fs::File,
    path: PathBuf,
    pos: u64,
}

impl CacheFile {
    pub(crate) fn from_parts(file: fs::File, path: PathBuf) -> Self {
        Self { file, path, pos: 0 }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The underlying handle, used as the download sink and the upload body.
    /// Callers must `seek` afterwards to re-establish the cursor.
    pub fn file_mut(&mut self) -> &mut fs::File {
        &mut self.file
    }

    /// Write `buf` at the cursor and wait until the bytes have reached the
    /// file, so a local failure is reported by this call and not a later one.
    pub async fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let written = async {
            let n = self.file.write(buf).await?;
            self.file.flush().await?;
            Ok::<_, io::Error>(n)
        }
        .await;
        match written {
            Ok(n) => {
                self.pos += n as u64;
                Ok(n)
            }
            Err(e) => {
                self.roll_back().await;
                Err(e)
            }
        }
    }

    async fn roll_back(&mut self) {
        let pos = self.pos;
        if let Err(e) = self.file.set_len(pos).await {
            tracing::warn!(
                "failed to truncate cache file {} to {pos}: {e}",
                self.path.display()
            );
        }
        if let Err(e) = self.file.seek(SeekFrom::Start(pos)).await {
            tracing::warn!(
                "failed to reposition cache file {} to {pos}: {e}",
                self.path.display()
            );
        }
    }

    pub async fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let pos = self.file.seek(pos).await?;
        self.pos = pos;
        Ok(pos)
    }

    /// Wait for pending writes, then move the cursor to offset 0.
    pub async fn rewind(&mut self) -> io::Result<()> {
        self.file.flush().await?;
        self.seek(SeekFrom::Start(0)).await?;
        Ok(())
    }

    pub async fn seek_end(&mut self) -> io::Result<u64> {
        self.seek(SeekFrom::End(0)).await
    }

    /// Push the content to disk and release the descriptor. The file itself
    /// stays on disk. Errors from close(2) itself are not observable; a failed
    /// `sync_all` is what this reports.
    pub async fn close(mut self) -> io::Result<()> {
        self.file.flush().await?;
        self.file.sync_all().await
    }
}
