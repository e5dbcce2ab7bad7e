//! Filesystem-backed object store.
//!
//! Each bucket is a directory under the store root and each object path maps
//! to a file below it. Writes go to a hidden temp file first and are renamed
//! into place, so readers never observe a partially written object.
//!
//! Because object paths are file paths, `x` and `x/y` cannot both exist in
//! one bucket: writing either fails with an I/O error once the other is
//! there. Reading or checking `x/y` while `x` is a file reports it missing.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use tracing::debug;

use super::ObjectStore;
use crate::{Error, Result};

/// Object store rooted at a local directory.
#[derive(Debug, Clone)]
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn bucket_dir(&self, bucket: &str) -> Result<PathBuf> {
        if !is_valid_segment(bucket) {
            return Err(Error::malformed(format!("invalid bucket name '{bucket}'")));
        }
        Ok(self.root.join(bucket))
    }

    fn resolve(&self, bucket: &str, path: &str) -> Result<PathBuf> {
        let mut resolved = self.bucket_dir(bucket)?;
        for segment in path.split('/') {
            if !is_valid_segment(segment) {
                return Err(Error::malformed(format!("invalid object path '{path}'")));
            }
            resolved.push(segment);
        }
        Ok(resolved)
    }
}

/// A path component that is a file, or a target that is a directory, means
/// there is no object at that path.
fn is_absent(kind: ErrorKind) -> bool {
    matches!(
        kind,
        ErrorKind::NotFound | ErrorKind::NotADirectory | ErrorKind::IsADirectory
    )
}

fn is_valid_segment(segment: &str) -> bool {
    !segment.is_empty() && segment != "." && segment != ".." && !segment.contains('\\')
}

#[async_trait]
impl ObjectStore for LocalStore {
    fn name(&self) -> &'static str {
        "local"
    }

    async fn put(&self, bucket: &str, path: &str, data: Bytes) -> Result<()> {
        let target = self.resolve(bucket, path)?;
        let parent = target
            .parent()
            .ok_or_else(|| Error::malformed(format!("invalid object path '{path}'")))?;

        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| Error::store_io("creating directory for", path, e))?;

        let file_name = target
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("object");
        let temp = parent.join(format!(
            ".{}.{}.partial",
            file_name,
            uuid::Uuid::new_v4().simple()
        ));

        tokio::fs::write(&temp, &data)
            .await
            .map_err(|e| Error::store_io("writing", path, e))?;

        if let Err(e) = tokio::fs::rename(&temp, &target).await {
            let _ = tokio::fs::remove_file(&temp).await;
            return Err(Error::store_io("committing", path, e));
        }

        debug!(bucket = %bucket, path = %path, size = data.len(), "Object written");
        Ok(())
    }

    async fn get(&self, bucket: &str, path: &str) -> Result<Bytes> {
        let target = self.resolve(bucket, path)?;
        match tokio::fs::read(&target).await {
            Ok(data) => Ok(Bytes::from(data)),
            Err(e) if is_absent(e.kind()) => Err(Error::not_found(bucket, path)),
            Err(e) => Err(Error::store_io("reading", path, e)),
        }
    }

    async fn exists(&self, bucket: &str, path: &str) -> Result<bool> {
        let target = self.resolve(bucket, path)?;
        match tokio::fs::metadata(&target).await {
            Ok(meta) => Ok(meta.is_file()),
            Err(e) if is_absent(e.kind()) => Ok(false),
            Err(e) => Err(Error::store_io("checking", path, e)),
        }
    }

    async fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<String>> {
        let bucket_dir = self.bucket_dir(bucket)?;
        let mut paths = Vec::new();
        let mut pending = vec![(bucket_dir, String::new())];

        while let Some((dir, rel)) = pending.pop() {
            let mut entries = match tokio::fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => return Err(Error::store_io("listing", rel, e)),
            };

            while let Some(entry) = entries
                .next_entry()
                .await
                .map_err(|e| Error::store_io("listing", rel.clone(), e))?
            {
                let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                    continue;
                };
                // temp files and dot-files are never objects
                if name.starts_with('.') {
                    continue;
                }

                let object_path = format!("{rel}{name}");
                let file_type = entry
                    .file_type()
                    .await
                    .map_err(|e| Error::store_io("listing", object_path.clone(), e))?;

                if file_type.is_dir() {
                    pending.push((entry.path(), format!("{object_path}/")));
                } else if object_path.starts_with(prefix) {
                    paths.push(object_path);
                }
            }
        }

        paths.sort();
        Ok(paths)
    }
}
