use std::fmt::Write as _;

use aofs::cadapter::localfs::LocalFsBackend;
use aofs::cadapter::memory::InMemoryBackend;
use aofs::vfs::sdk::LocalFileSystem;
use aofs::{File, FileSystem, FsOptions, ObjectBackend, ObjectClient, ObjectFileSystem};
use tempfile::tempdir;

async fn write_lines<F: File>(file: &mut F, local: &mut String, range: std::ops::Range<u32>) {
    for i in range {
        let line = format!("{i}\n");
        file.write_all(line.as_bytes()).await.unwrap();
        local.write_str(&line).unwrap();
    }
}

#[tokio::test]
async fn test_append_flush_close_matches_local_copy() {
    let store = tempdir().unwrap();
    let scratch = tempdir().unwrap();
    let fs = LocalFileSystem::new_local(
        store.path(),
        FsOptions::new("main").with_scratch_dir(scratch.path()),
    );

    let mut local = String::new();
    let mut file = fs.open("test").await.unwrap();
    write_lines(&mut file, &mut local, 0..10).await;
    file.flush().await.unwrap();

    // After the first flush the object holds exactly the first ten lines.
    let remote = std::fs::read_to_string(store.path().join("main/test")).unwrap();
    assert_eq!(remote, local);

    write_lines(&mut file, &mut local, 10..20).await;
    file.close().await.unwrap();

    let mut remote = Vec::new();
    fs.client()
        .get_object("main", "test", &mut remote)
        .await
        .unwrap();
    assert_eq!(String::from_utf8(remote).unwrap(), local);
    assert_eq!(local.lines().count(), 20);
    assert_eq!(std::fs::read_dir(scratch.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_open_after_remote_delete_starts_empty() {
    let store = tempdir().unwrap();
    let scratch = tempdir().unwrap();
    let fs = LocalFileSystem::new_local(
        store.path(),
        FsOptions::new("main").with_scratch_dir(scratch.path()),
    );

    let mut file = fs.open("missing-key").await.unwrap();
    file.write_all(b"old").await.unwrap();
    file.close().await.unwrap();
    std::fs::remove_file(store.path().join("main/missing-key")).unwrap();

    let mut file = fs.open("missing-key").await.unwrap();
    assert_eq!(file.dirty_bytes(), 0);
    let cache = file.cache_path().unwrap().to_path_buf();
    assert_eq!(std::fs::metadata(&cache).unwrap().len(), 0);
    file.write_all(b"new").await.unwrap();
    file.close().await.unwrap();

    let remote = std::fs::read(store.path().join("main/missing-key")).unwrap();
    assert_eq!(remote, b"new");
}

#[tokio::test]
async fn test_reopen_appends_to_existing_object() {
    let scratch = tempdir().unwrap();
    let fs = ObjectFileSystem::new(
        ObjectClient::new(InMemoryBackend::new()),
        FsOptions::new("logs").with_scratch_dir(scratch.path()),
    );

    for chunk in ["a", "b", "c"] {
        let mut file = fs.open("day-1").await.unwrap();
        file.write_all(chunk.as_bytes()).await.unwrap();
        file.close().await.unwrap();
    }

    let backend = fs.client().backend();
    assert_eq!(backend.object("logs", "day-1").await.unwrap(), b"abc");
    assert_eq!(backend.upload_count(), 3);
}

/// Any backend can sit behind the same caller code.
async fn append_greeting<S: FileSystem>(fs: &S, name: &str) {
    let mut file = fs.open(name).await.unwrap();
    file.write_all(b"hello").await.unwrap();
    file.close().await.unwrap();
}

#[tokio::test]
async fn test_callers_are_generic_over_backends() {
    let store = tempdir().unwrap();
    let scratch = tempdir().unwrap();
    let options = FsOptions::new("main").with_scratch_dir(scratch.path());

    let local = ObjectFileSystem::new(
        ObjectClient::new(LocalFsBackend::new(store.path())),
        options.clone(),
    );
    let memory = ObjectFileSystem::new(ObjectClient::new(InMemoryBackend::new()), options);

    append_greeting(&local, "greeting").await;
    append_greeting(&memory, "greeting").await;

    let mut from_local = Vec::new();
    local
        .client()
        .backend()
        .get_object("main", "greeting", &mut from_local)
        .await
        .unwrap();
    assert_eq!(from_local, b"hello");
    assert_eq!(
        memory.client().backend().object("main", "greeting").await.unwrap(),
        b"hello"
    );
}
