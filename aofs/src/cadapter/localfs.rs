//! Local directory backend: objects live at `<root>/<bucket>/<key>`.
//!
//! Used for development, the CLI and tests. Uploads go to a temporary sibling
//! first and are renamed over the object, so readers never observe a partial
//! object.

use crate::cadapter::client::{ObjectBackend, StoreError};
use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};
use tokio::{
    fs,
    io::{self, AsyncRead, AsyncWrite, AsyncWriteExt},
};

pub struct LocalFsBackend {
    root: PathBuf,
}

impl LocalFsBackend {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map `bucket/key` below the root. Only plain path segments are
    /// accepted, so no name can resolve outside `root`.
    fn path_for(&self, bucket: &str, key: &str) -> Result<PathBuf, StoreError> {
        let plain = |name: &str| {
            !name.is_empty()
                && Path::new(name)
                    .components()
                    .all(|c| matches!(c, Component::Normal(_)))
        };
        if !plain(bucket) || !plain(key) || Path::new(bucket).components().count() != 1 {
            return Err(StoreError::invalid_name(bucket, key));
        }
        Ok(self.root.join(bucket).join(key))
    }

    fn staging_path_for(path: &Path) -> PathBuf {
        let mut name = path.file_name().unwrap_or_default().to_os_string();
        name.push(".aofs-upload");
        path.with_file_name(name)
    }
}

#[async_trait]
impl ObjectBackend for LocalFsBackend {
    async fn get_object(
        &self,
        bucket: &str,
        key: &str,
        sink: &mut (dyn AsyncWrite + Send + Unpin),
    ) -> Result<u64, StoreError> {
        let path = self.path_for(bucket, key)?;
        let mut f = match fs::File::open(&path).await {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(StoreError::not_found(bucket, key));
            }
            Err(e) => return Err(e.into()),
        };
        let n = io::copy(&mut f, sink).await?;
        sink.flush().await?;
        Ok(n)
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: &mut (dyn AsyncRead + Send + Unpin),
    ) -> Result<(), StoreError> {
        let path = self.path_for(bucket, key)?;
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).await?;
        }
        let staging = Self::staging_path_for(&path);
        let written = async {
            let mut f = fs::File::create(&staging).await?;
            io::copy(&mut *body, &mut f).await?;
            f.flush().await?;
            f.sync_all().await?;
            fs::rename(&staging, &path).await
        }
        .await;
        if let Err(e) = written {
            if let Err(rerr) = fs::remove_file(&staging).await {
                if rerr.kind() != io::ErrorKind::NotFound {
                    tracing::warn!(
                        "failed to remove staging file {}: {rerr}",
                        staging.display()
                    );
                }
            }
            return Err(e.into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_localfs_put_get() {
        let tmp = tempfile::tempdir().unwrap();
        let backend = LocalFsBackend::new(tmp.path());

        let mut body: &[u8] = b"hello";
        backend.put_object("main", "a/b/obj", &mut body).await.unwrap();
        assert!(tmp.path().join("main/a/b/obj").exists());
        assert!(!tmp.path().join("main/a/b/obj.aofs-upload").exists());

        let mut out = Vec::new();
        let n = backend.get_object("main", "a/b/obj", &mut out).await.unwrap();
        assert_eq!(n, 5);
        assert_eq!(out, b"hello");
    }

    #[tokio::test]
    async fn test_localfs_put_replaces_whole_object() {
        let tmp = tempfile::tempdir().unwrap();
        let backend = LocalFsBackend::new(tmp.path());

        let mut long: &[u8] = b"a much longer first version";
        backend.put_object("main", "obj", &mut long).await.unwrap();
        let mut short: &[u8] = b"short";
        backend.put_object("main", "obj", &mut short).await.unwrap();

        let mut out = Vec::new();
        backend.get_object("main", "obj", &mut out).await.unwrap();
        assert_eq!(out, b"short");
    }

    #[tokio::test]
    async fn test_localfs_missing_object_is_not_found() {
        let tmp = tempfile::tempdir().unwrap();
        let backend = LocalFsBackend::new(tmp.path());

        let mut out = Vec::new();
        let err = backend
            .get_object("main", "missing", &mut out)
            .await
            .unwrap_err();
        assert!(err.is_not_found());
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn test_localfs_unreadable_object_is_not_not_found() {
        let tmp = tempfile::tempdir().unwrap();
        let backend = LocalFsBackend::new(tmp.path());
        // A directory where the object should be is an I/O failure, not absence.
        std::fs::create_dir_all(tmp.path().join("main/dir")).unwrap();

        let mut out = Vec::new();
        let err = backend.get_object("main", "dir", &mut out).await.unwrap_err();
        assert!(!err.is_not_found());
    }

    #[tokio::test]
    async fn test_localfs_rejects_names_outside_root() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("root");
        std::fs::create_dir(&root).unwrap();
        let backend = LocalFsBackend::new(&root);
        let outside = tmp.path().join("escaped");

        let cases = [
            ("main", outside.to_str().unwrap()),
            ("main", "../../escaped"),
            ("main", "a/../../../escaped"),
            ("..", "escaped"),
            ("main/..", "escaped"),
            ("", "obj"),
            ("main", ""),
        ];
        for (bucket, key) in cases {
            let mut body: &[u8] = b"x";
            let err = backend.put_object(bucket, key, &mut body).await.unwrap_err();
            assert!(
                matches!(err, StoreError::InvalidName { .. }),
                "{bucket}/{key}: {err}"
            );

            let mut out = Vec::new();
            let err = backend.get_object(bucket, key, &mut out).await.unwrap_err();
            assert!(!err.is_not_found(), "{bucket}/{key}");
        }
        assert!(!outside.exists());
        assert_eq!(std::fs::read_dir(tmp.path()).unwrap().count(), 1);
    }
}
