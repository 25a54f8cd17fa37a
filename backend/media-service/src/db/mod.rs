/// Media item persistence
use crate::error::Result;
use crate::models::MediaItem;
use async_trait::async_trait;
use sqlx::migrate::Migrator;
use sqlx::PgPool;
use uuid::Uuid;

pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

#[async_trait]
pub trait MediaRepository: Send + Sync {
    /// Insert all items in one transaction
    async fn insert_many(&self, items: &[MediaItem]) -> Result<()>;

    async fn list_by_post(&self, post_id: Uuid) -> Result<Vec<MediaItem>>;

    /// Remove the rows of a post; returns how many were removed
    async fn delete_by_post(&self, post_id: Uuid) -> Result<u64>;
}

pub struct PgMediaRepository {
    pool: PgPool,
}

impl PgMediaRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MediaRepository for PgMediaRepository {
    async fn insert_many(&self, items: &[MediaItem]) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        for item in items {
            sqlx::query(
                r#"
                INSERT INTO media_items
                    (id, post_id, filename, content_type, size_bytes, storage_key, url, created_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                "#,
            )
            .bind(item.id)
            .bind(item.post_id)
            .bind(&item.filename)
            .bind(&item.content_type)
            .bind(item.size_bytes)
            .bind(&item.storage_key)
            .bind(&item.url)
            .bind(item.created_at)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn list_by_post(&self, post_id: Uuid) -> Result<Vec<MediaItem>> {
        let items = sqlx::query_as::<_, MediaItem>(
            r#"
            SELECT id, post_id, filename, content_type, size_bytes, storage_key, url, created_at
            FROM media_items
            WHERE post_id = $1
            ORDER BY created_at, id
            "#,
        )
        .bind(post_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(items)
    }

    async fn delete_by_post(&self, post_id: Uuid) -> Result<u64> {
        let result = sqlx::query("DELETE FROM media_items WHERE post_id = $1")
            .bind(post_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

/// Process-local repository for tests
#[cfg(any(test, feature = "test-support"))]
#[derive(Default)]
pub struct InMemoryMediaRepository {
    items: parking_lot::Mutex<Vec<MediaItem>>,
}

#[cfg(any(test, feature = "test-support"))]
impl InMemoryMediaRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }
}

#[cfg(any(test, feature = "test-support"))]
#[async_trait]
impl MediaRepository for InMemoryMediaRepository {
    async fn insert_many(&self, items: &[MediaItem]) -> Result<()> {
        self.items.lock().extend_from_slice(items);
        Ok(())
    }

    async fn list_by_post(&self, post_id: Uuid) -> Result<Vec<MediaItem>> {
        Ok(self
            .items
            .lock()
            .iter()
            .filter(|item| item.post_id == post_id)
            .cloned()
            .collect())
    }

    async fn delete_by_post(&self, post_id: Uuid) -> Result<u64> {
        let mut items = self.items.lock();
        let before = items.len();
        items.retain(|item| item.post_id != post_id);
        Ok((before - items.len()) as u64)
    }
}
