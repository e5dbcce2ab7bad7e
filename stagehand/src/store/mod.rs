//! Object store seam.
//!
//! The store is the only durable, shared state of the pipeline. Handlers
//! write each derived name once, read many times and never mutate in place,
//! so no transactions or compare-and-swap are needed.

mod local;
mod memory;
mod notifying;

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use crate::Result;

pub use local::LocalStore;
pub use memory::MemoryStore;
pub use notifying::NotifyingStore;

/// A durable blob store keyed by `(bucket, path)`.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store name for logging.
    fn name(&self) -> &'static str;

    /// Write `data` under `path`, replacing any previous object.
    async fn put(&self, bucket: &str, path: &str, data: Bytes) -> Result<()>;

    /// Read the object at `path`.
    ///
    /// Returns [`crate::Error::ObjectNotFound`] when it does not exist.
    async fn get(&self, bucket: &str, path: &str) -> Result<Bytes>;

    /// Check whether an object exists at `path`.
    async fn exists(&self, bucket: &str, path: &str) -> Result<bool>;

    /// List object paths starting with `prefix`, sorted.
    async fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<String>>;
}

#[async_trait]
impl<T: ObjectStore + ?Sized> ObjectStore for Arc<T> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    async fn put(&self, bucket: &str, path: &str, data: Bytes) -> Result<()> {
        (**self).put(bucket, path, data).await
    }

    async fn get(&self, bucket: &str, path: &str) -> Result<Bytes> {
        (**self).get(bucket, path).await
    }

    async fn exists(&self, bucket: &str, path: &str) -> Result<bool> {
        (**self).exists(bucket, path).await
    }

    async fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<String>> {
        (**self).list(bucket, prefix).await
    }
}
