//! Convenience constructors for the bundled backends.

use crate::cadapter::client::ObjectClient;
use crate::cadapter::localfs::LocalFsBackend;
use crate::cadapter::s3::{S3Backend, S3Config};
use crate::config::FsOptions;
use crate::vfs::object::ObjectFileSystem;
use std::path::Path;

/// Files stored under a local directory, one subdirectory per bucket.
pub type LocalFileSystem = ObjectFileSystem<LocalFsBackend>;
/// Files stored in an S3-compatible service.
pub type S3FileSystem = ObjectFileSystem<S3Backend>;

impl LocalFileSystem {
    pub fn new_local<P: AsRef<Path>>(root: P, options: FsOptions) -> Self {
        ObjectFileSystem::new(ObjectClient::new(LocalFsBackend::new(root)), options)
    }
}

impl S3FileSystem {
    pub async fn new_s3(config: S3Config, options: FsOptions) -> Self {
        ObjectFileSystem::new(ObjectClient::new(S3Backend::new(config).await), options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vfs::fs::{File, FileSystem};
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_sdk_local_basic() {
        let store = tempdir().unwrap();
        let scratch = tempdir().unwrap();
        let fs = LocalFileSystem::new_local(
            store.path(),
            FsOptions::new("main").with_scratch_dir(scratch.path()),
        );

        let mut f = fs.open("a/b/hello.txt").await.unwrap();
        f.write_all(b"hello").await.unwrap();
        f.close().await.unwrap();

        let mut f = fs.open("a/b/hello.txt").await.unwrap();
        f.write_all(b", world").await.unwrap();
        f.close().await.unwrap();

        let on_disk = std::fs::read(store.path().join("main/a/b/hello.txt")).unwrap();
        assert_eq!(on_disk, b"hello, world");
        assert_eq!(std::fs::read_dir(scratch.path()).unwrap().count(), 0);
    }
}
