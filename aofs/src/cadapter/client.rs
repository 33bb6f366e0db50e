//! High-level client API for the object store
//!
//! `ObjectBackend` is the whole-object contract every store implements:
//! download an object into a local sink, or replace an object with the content
//! of a reader. `ObjectClient` is the cheap, clonable handle the file layer
//! shares between all open files.

use std::io;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};

#[derive(Debug, Error)]
pub enum StoreError {
    /// The object does not exist. Only this condition is treated as an empty
    /// object when a file is opened.
    #[error("object {bucket}/{key} does not exist")]
    NotFound { bucket: String, key: String },

    /// The bucket or key cannot be mapped onto this store.
    #[error("invalid object name {bucket}/{key}")]
    InvalidName { bucket: String, key: String },

    #[error(transparent)]
    Io(#[from] io::Error),

    #[error(transparent)]
    Backend(Box<dyn std::error::Error + Send + Sync>),
}

impl StoreError {
    pub fn not_found(bucket: &str, key: &str) -> Self {
        StoreError::NotFound {
            bucket: bucket.to_string(),
            key: key.to_string(),
        }
    }

    pub fn invalid_name(bucket: &str, key: &str) -> Self {
        StoreError::InvalidName {
            bucket: bucket.to_string(),
            key: key.to_string(),
        }
    }

    pub fn backend<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        StoreError::Backend(Box::new(err))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }
}

/// Whole-object store. Implementations are shared by every open file and may
/// be called concurrently.
#[async_trait]
pub trait ObjectBackend: Send + Sync {
    /// Write the full content of `bucket/key` into `sink`, starting at the
    /// sink's current position, and return the number of bytes written.
    async fn get_object(
        &self,
        bucket: &str,
        key: &str,
        sink: &mut (dyn AsyncWrite + Send + Unpin),
    ) -> Result<u64, StoreError>;

    /// Replace `bucket/key` with everything read from `body` until EOF.
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: &mut (dyn AsyncRead + Send + Unpin),
    ) -> Result<(), StoreError>;
}

/// Shared handle over a backend. Cloning only bumps a reference count.
pub struct ObjectClient<B: ObjectBackend> {
    backend: Arc<B>,
}

impl<B: ObjectBackend> Clone for ObjectClient<B> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
        }
    }
}

impl<B: ObjectBackend> ObjectClient<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend: Arc::new(backend),
        }
    }

    pub fn from_arc(backend: Arc<B>) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub async fn get_object(
        &self,
        bucket: &str,
        key: &str,
        sink: &mut (dyn AsyncWrite + Send + Unpin),
    ) -> Result<u64, StoreError> {
        self.backend.get_object(bucket, key, sink).await
    }

    pub async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: &mut (dyn AsyncRead + Send + Unpin),
    ) -> Result<(), StoreError> {
        self.backend.put_object(bucket, key, body).await
    }
}
