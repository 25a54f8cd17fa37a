/// Media ingestion and per-post cleanup
use crate::db::MediaRepository;
use crate::error::{AppError, Result};
use crate::metrics::{MEDIA_INGESTED_BYTES, MEDIA_PURGE_TOTAL};
use crate::models::{IncomingFile, MediaItem};
use crate::storage::{sanitize_segment, ObjectStorage};
use chrono::Utc;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

pub const MAX_FILE_BYTES: usize = 20 * 1024 * 1024;
pub const MAX_FILES: usize = 10;

pub struct MediaService {
    repo: Arc<dyn MediaRepository>,
    storage: Arc<dyn ObjectStorage>,
}

impl MediaService {
    pub fn new(repo: Arc<dyn MediaRepository>, storage: Arc<dyn ObjectStorage>) -> Self {
        Self { repo, storage }
    }

    fn storage_key(post_id: Uuid, item_id: Uuid, filename: &str) -> String {
        format!("posts/{}/{}-{}", post_id, item_id, sanitize_segment(filename))
    }

    /// Store every file for `post_id` and return their URLs in input order.
    ///
    /// All or nothing: on any failure the objects already written are
    /// removed again.
    pub async fn ingest(&self, post_id: Uuid, files: Vec<IncomingFile>) -> Result<Vec<String>> {
        if files.is_empty() {
            return Err(AppError::ValidationError("at least one file is required".into()));
        }
        if files.len() > MAX_FILES {
            return Err(AppError::ValidationError(format!(
                "at most {} files per post",
                MAX_FILES
            )));
        }

        let mut items = Vec::with_capacity(files.len());
        for file in files {
            let id = Uuid::new_v4();
            let storage_key = Self::storage_key(post_id, id, &file.filename);
            let size = file.data.len();

            match self.storage.put(&storage_key, file.data, &file.content_type).await {
                Ok(url) => items.push(MediaItem {
                    id,
                    post_id,
                    filename: file.filename,
                    content_type: file.content_type,
                    size_bytes: size as i64,
                    storage_key,
                    url,
                    created_at: Utc::now(),
                }),
                Err(e) => {
                    warn!(post_id = %post_id, key = %storage_key, error = %e, "Object upload failed");
                    self.discard(&items).await;
                    return Err(e);
                }
            }
        }

        if let Err(e) = self.repo.insert_many(&items).await {
            error!(post_id = %post_id, error = %e, "Failed to record media items");
            self.discard(&items).await;
            return Err(e);
        }

        let bytes: i64 = items.iter().map(|item| item.size_bytes).sum();
        MEDIA_INGESTED_BYTES.inc_by(bytes as u64);
        info!(post_id = %post_id, files = items.len(), bytes, "Media ingested");

        Ok(items.into_iter().map(|item| item.url).collect())
    }

    async fn discard(&self, items: &[MediaItem]) {
        for item in items {
            if let Err(e) = self.storage.delete(&item.storage_key).await {
                warn!(key = %item.storage_key, error = %e, "Failed to discard uploaded object");
            }
        }
    }

    pub async fn list_for_post(&self, post_id: Uuid) -> Result<Vec<MediaItem>> {
        self.repo.list_by_post(post_id).await
    }

    /// Delete every object and row of a deleted post.
    ///
    /// Objects go first; a failure stops before the rows are removed, so a
    /// later run finds the remaining items again.
    pub async fn purge_post(&self, post_id: Uuid) -> Result<usize> {
        let items = self.repo.list_by_post(post_id).await?;
        if items.is_empty() {
            return Ok(0);
        }

        for item in &items {
            if let Err(e) = self.storage.delete(&item.storage_key).await {
                MEDIA_PURGE_TOTAL.with_label_values(&["error"]).inc();
                return Err(e);
            }
        }
        self.repo.delete_by_post(post_id).await?;

        MEDIA_PURGE_TOTAL.with_label_values(&["success"]).inc();
        info!(post_id = %post_id, items = items.len(), "Post media purged");
        Ok(items.len())
    }
}
