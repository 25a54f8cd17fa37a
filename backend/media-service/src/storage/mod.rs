//! Object storage behind the media service
//!
//! Blob storage is a black box: put bytes under a key, get back a public
//! URL, delete by key. Deleting a missing key succeeds so cleanup can be
//! re-run after a partial failure.

use crate::error::{AppError, Result};
use async_trait::async_trait;
use bytes::Bytes;
use std::path::{Path, PathBuf};
use tracing::debug;

#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Store `data` under `key` and return its public URL
    async fn put(&self, key: &str, data: Bytes, content_type: &str) -> Result<String>;

    async fn delete(&self, key: &str) -> Result<()>;
}

/// Keys are `/`-separated segments of `[A-Za-z0-9._-]`
pub fn sanitize_segment(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        "file".to_string()
    } else {
        cleaned.to_string()
    }
}

/// Objects as files under a root directory
pub struct FilesystemStorage {
    root: PathBuf,
    public_base_url: String,
}

impl FilesystemStorage {
    pub fn new(root: impl Into<PathBuf>, public_base_url: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            public_base_url: public_base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        if key.split('/').any(|segment| segment.is_empty() || segment == "..") {
            return Err(AppError::ValidationError(format!("invalid storage key: {}", key)));
        }
        Ok(self.root.join(Path::new(key)))
    }
}

#[async_trait]
impl ObjectStorage for FilesystemStorage {
    async fn put(&self, key: &str, data: Bytes, _content_type: &str) -> Result<String> {
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, &data).await?;
        debug!(key = %key, bytes = data.len(), "Object stored");
        Ok(format!("{}/{}", self.public_base_url, key))
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let path = self.path_for(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
mod memory {
    use super::*;
    use parking_lot::Mutex;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    /// Process-local object storage with failure injection
    #[derive(Default)]
    pub struct InMemoryObjectStorage {
        objects: Mutex<HashMap<String, Bytes>>,
        fail_puts: AtomicBool,
        /// Deletes that succeed before every further delete fails; `usize::MAX` means never fail
        deletes_before_failure: AtomicUsize,
    }

    impl InMemoryObjectStorage {
        pub fn new() -> Self {
            Self {
                deletes_before_failure: AtomicUsize::new(usize::MAX),
                ..Default::default()
            }
        }

        pub fn fail_puts(&self, fail: bool) {
            self.fail_puts.store(fail, Ordering::SeqCst);
        }

        /// Let `count` deletes through, then fail the rest
        pub fn fail_deletes_after(&self, count: usize) {
            self.deletes_before_failure.store(count, Ordering::SeqCst);
        }

        pub fn heal(&self) {
            self.fail_puts(false);
            self.deletes_before_failure.store(usize::MAX, Ordering::SeqCst);
        }

        pub fn contains(&self, key: &str) -> bool {
            self.objects.lock().contains_key(key)
        }

        pub fn len(&self) -> usize {
            self.objects.lock().len()
        }

        pub fn is_empty(&self) -> bool {
            self.objects.lock().is_empty()
        }
    }

    #[async_trait]
    impl ObjectStorage for InMemoryObjectStorage {
        async fn put(&self, key: &str, data: Bytes, _content_type: &str) -> Result<String> {
            if self.fail_puts.load(Ordering::SeqCst) {
                return Err(AppError::StorageError("bucket unavailable".into()));
            }
            self.objects.lock().insert(key.to_string(), data);
            Ok(format!("memory://{}", key))
        }

        async fn delete(&self, key: &str) -> Result<()> {
            let allowed = self
                .deletes_before_failure
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| match n {
                    usize::MAX => Some(usize::MAX),
                    0 => None,
                    n => Some(n - 1),
                })
                .is_ok();
            if !allowed {
                return Err(AppError::StorageError(format!("delete of {} failed", key)));
            }
            self.objects.lock().remove(key);
            Ok(())
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use memory::InMemoryObjectStorage;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_segment() {
        assert_eq!(sanitize_segment("cat photo.png"), "cat_photo.png");
        assert_eq!(sanitize_segment("../../etc/passwd"), "_.._etc_passwd");
        assert_eq!(sanitize_segment(""), "file");
        assert_eq!(sanitize_segment(".hidden"), "hidden");
    }

    #[tokio::test]
    async fn test_filesystem_put_and_idempotent_delete() {
        let root = std::env::temp_dir().join(format!("nova-media-{}", uuid::Uuid::new_v4()));
        let storage = FilesystemStorage::new(&root, "http://cdn.test/files/");

        let url = storage
            .put("posts/p1/a.png", Bytes::from_static(b"png"), "image/png")
            .await
            .unwrap();
        assert_eq!(url, "http://cdn.test/files/posts/p1/a.png");
        assert!(root.join("posts/p1/a.png").exists());

        storage.delete("posts/p1/a.png").await.unwrap();
        storage.delete("posts/p1/a.png").await.unwrap();
        assert!(!root.join("posts/p1/a.png").exists());

        assert!(storage.delete("posts/../secret").await.is_err());
        let _ = std::fs::remove_dir_all(root);
    }
}
