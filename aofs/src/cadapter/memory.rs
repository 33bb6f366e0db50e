//! In-memory object store. Keeps every object in a map and counts uploads so
//! tests can check when the file layer actually hits the network.

use crate::cadapter::client::{ObjectBackend, StoreError};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt},
    sync::RwLock,
};

type ObjectKey = (String /*bucket*/, String /*key*/);

#[derive(Default)]
pub struct InMemoryBackend {
    objects: RwLock<HashMap<ObjectKey, Vec<u8>>>,
    uploads: AtomicUsize,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, bucket: &str, key: &str, data: impl Into<Vec<u8>>) {
        self.objects
            .write()
            .await
            .insert((bucket.to_string(), key.to_string()), data.into());
    }

    pub async fn remove(&self, bucket: &str, key: &str) -> Option<Vec<u8>> {
        self.objects
            .write()
            .await
            .remove(&(bucket.to_string(), key.to_string()))
    }

    pub async fn object(&self, bucket: &str, key: &str) -> Option<Vec<u8>> {
        self.objects
            .read()
            .await
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
    }

    /// Number of successful `put_object` calls so far.
    pub fn upload_count(&self) -> usize {
        self.uploads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ObjectBackend for InMemoryBackend {
    async fn get_object(
        &self,
        bucket: &str,
        key: &str,
        sink: &mut (dyn AsyncWrite + Send + Unpin),
    ) -> Result<u64, StoreError> {
        let data = self
            .object(bucket, key)
            .await
            .ok_or_else(|| StoreError::not_found(bucket, key))?;
        sink.write_all(&data).await?;
        sink.flush().await?;
        Ok(data.len() as u64)
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: &mut (dyn AsyncRead + Send + Unpin),
    ) -> Result<(), StoreError> {
        let mut data = Vec::new();
        body.read_to_end(&mut data).await?;
        self.insert(bucket, key, data).await;
        self.uploads.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
