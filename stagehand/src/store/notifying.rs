//! Store decorator that emits a notification for every successful write.

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::ObjectStore;
use crate::Result;
use crate::notification::ObjectNotification;

/// Wraps a store and publishes an [`ObjectNotification`] after each `put`.
///
/// This stands in for the platform's object-finalize notifications when the
/// pipeline runs locally.
pub struct NotifyingStore<S> {
    inner: S,
    tx: mpsc::UnboundedSender<ObjectNotification>,
}

impl<S: ObjectStore> NotifyingStore<S> {
    /// Wrap `inner`, returning the store and the receiving end of its notifications.
    pub fn new(inner: S) -> (Self, mpsc::UnboundedReceiver<ObjectNotification>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { inner, tx }, rx)
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }
}

#[async_trait]
impl<S: ObjectStore> ObjectStore for NotifyingStore<S> {
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    async fn put(&self, bucket: &str, path: &str, data: Bytes) -> Result<()> {
        self.inner.put(bucket, path, data).await?;

        match ObjectNotification::new(bucket, path) {
            Ok(notification) => {
                if self.tx.send(notification).is_err() {
                    debug!(bucket = %bucket, path = %path, "No notification receiver, dropping");
                }
            }
            Err(e) => warn!(bucket = %bucket, path = %path, error = %e, "Not notifying write"),
        }
        Ok(())
    }

    async fn get(&self, bucket: &str, path: &str) -> Result<Bytes> {
        self.inner.get(bucket, path).await
    }

    async fn exists(&self, bucket: &str, path: &str) -> Result<bool> {
        self.inner.exists(bucket, path).await
    }

    async fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<String>> {
        self.inner.list(bucket, prefix).await
    }
}
