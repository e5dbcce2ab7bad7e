//! In-memory object store.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;

use super::ObjectStore;
use crate::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ObjectKey {
    bucket: String,
    path: String,
}

impl ObjectKey {
    fn new(bucket: &str, path: &str) -> Self {
        Self {
            bucket: bucket.to_string(),
            path: path.to_string(),
        }
    }
}

/// Object store backed by a concurrent map.
///
/// Used for local runs and tests. Counts every successful `put` so tests can
/// assert on write amplification.
#[derive(Debug, Default)]
pub struct MemoryStore {
    objects: DashMap<ObjectKey, Bytes>,
    writes: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of successful writes.
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }

    /// A sorted copy of every object in `bucket`.
    pub fn snapshot(&self, bucket: &str) -> BTreeMap<String, Bytes> {
        self.objects
            .iter()
            .filter(|entry| entry.key().bucket == bucket)
            .map(|entry| (entry.key().path.clone(), entry.value().clone()))
            .collect()
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn put(&self, bucket: &str, path: &str, data: Bytes) -> Result<()> {
        self.objects.insert(ObjectKey::new(bucket, path), data);
        self.writes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn get(&self, bucket: &str, path: &str) -> Result<Bytes> {
        self.objects
            .get(&ObjectKey::new(bucket, path))
            .map(|entry| entry.value().clone())
            .ok_or_else(|| Error::not_found(bucket, path))
    }

    async fn exists(&self, bucket: &str, path: &str) -> Result<bool> {
        Ok(self.objects.contains_key(&ObjectKey::new(bucket, path)))
    }

    async fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<String>> {
        let mut paths: Vec<String> = self
            .objects
            .iter()
            .filter(|entry| entry.key().bucket == bucket && entry.key().path.starts_with(prefix))
            .map(|entry| entry.key().path.clone())
            .collect();
        paths.sort();
        Ok(paths)
    }
}
