use crate::error::{AppError, Result};
use crate::events;
use crate::models::{LikeToggle, Post, PostStatus};
use async_trait::async_trait;
use resilience::{run_in_transaction, RetryConfig, SerializablePool};
use sqlx::{PgPool, Postgres, Row, Transaction};
use transactional_outbox::SqlxOutboxRepository;
use uuid::Uuid;

const POST_COLUMNS: &str =
    "id, user_id, content, media_urls, status, likes_count, created_at, updated_at";

/// Post storage. Every mutation that other services must hear about writes
/// its outbox row in the same transaction.
#[async_trait]
pub trait PostRepository: Send + Sync {
    /// Insert a `published` post with its `post.created` event.
    async fn insert_published(&self, post: &Post) -> Result<()>;

    /// Insert a `pending_media` post. No event.
    async fn insert_pending(&self, post: &Post) -> Result<()>;

    /// Attach media to a pending post, publish it and write `post.created`.
    /// `None` when no pending post has that id.
    async fn publish_with_media(&self, post_id: Uuid, media_urls: &[String]) -> Result<Option<Post>>;

    /// Hard-delete a pending post and write `post.discarded`, so media the
    /// remote step may have stored gets released. Returns whether a row was
    /// removed.
    async fn delete_pending(&self, post_id: Uuid) -> Result<bool>;

    async fn find_published(&self, post_id: Uuid) -> Result<Option<Post>>;

    /// Published posts, newest first, strictly after the post `after`.
    async fn list_published(&self, after: Option<Uuid>, limit: u32) -> Result<Vec<Post>>;

    /// Owner-only content edit, writes `post.updated`.
    async fn update_content(&self, post_id: Uuid, user_id: Uuid, content: &str) -> Result<Option<Post>>;

    /// Owner-only delete, writes `post.deleted`.
    async fn delete(&self, post_id: Uuid, user_id: Uuid) -> Result<Option<Post>>;

    /// Like when not liked, unlike otherwise; writes `post.liked` / `post.unliked`.
    async fn toggle_like(&self, post_id: Uuid, user_id: Uuid) -> Result<Option<LikeToggle>>;
}

pub struct PgPostRepository {
    pool: PgPool,
    retry: RetryConfig,
}

impl PgPostRepository {
    pub fn new(pool: PgPool, retry: RetryConfig) -> Self {
        Self { pool, retry }
    }

    async fn insert(tx: &mut Transaction<'_, Postgres>, post: &Post) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO posts (id, user_id, content, media_urls, status, likes_count, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(post.id)
        .bind(post.user_id)
        .bind(&post.content)
        .bind(&post.media_urls)
        .bind(post.status)
        .bind(post.likes_count)
        .bind(post.created_at)
        .bind(post.updated_at)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl PostRepository for PgPostRepository {
    async fn insert_published(&self, post: &Post) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        Self::insert(&mut tx, post).await?;
        SqlxOutboxRepository::insert(&mut tx, &events::outbox_row(&events::post_created(post))?)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn insert_pending(&self, post: &Post) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        Self::insert(&mut tx, post).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn publish_with_media(&self, post_id: Uuid, media_urls: &[String]) -> Result<Option<Post>> {
        let mut tx = self.pool.begin().await?;

        let post = sqlx::query_as::<_, Post>(&format!(
            r#"
            UPDATE posts
            SET media_urls = $2, status = 'published', updated_at = NOW()
            WHERE id = $1 AND status = 'pending_media'
            RETURNING {POST_COLUMNS}
            "#
        ))
        .bind(post_id)
        .bind(media_urls)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(post) = post else {
            tx.rollback().await?;
            return Ok(None);
        };

        SqlxOutboxRepository::insert(&mut tx, &events::outbox_row(&events::post_created(&post))?)
            .await?;
        tx.commit().await?;
        Ok(Some(post))
    }

    async fn delete_pending(&self, post_id: Uuid) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        let post = sqlx::query_as::<_, Post>(&format!(
            r#"
            DELETE FROM posts
            WHERE id = $1 AND status = 'pending_media'
            RETURNING {POST_COLUMNS}
            "#
        ))
        .bind(post_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(post) = post else {
            tx.rollback().await?;
            return Ok(false);
        };

        SqlxOutboxRepository::insert(&mut tx, &events::outbox_row(&events::post_discarded(&post))?)
            .await?;
        tx.commit().await?;
        Ok(true)
    }

    async fn find_published(&self, post_id: Uuid) -> Result<Option<Post>> {
        let post = sqlx::query_as::<_, Post>(&format!(
            "SELECT {POST_COLUMNS} FROM posts WHERE id = $1 AND status = 'published'"
        ))
        .bind(post_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(post)
    }

    async fn list_published(&self, after: Option<Uuid>, limit: u32) -> Result<Vec<Post>> {
        // A cursor pointing at a deleted post yields an empty page
        let posts = sqlx::query_as::<_, Post>(&format!(
            r#"
            SELECT {POST_COLUMNS}
            FROM posts
            WHERE status = 'published'
              AND ($1::uuid IS NULL
                   OR (created_at, id) < (SELECT created_at, id FROM posts WHERE id = $1))
            ORDER BY created_at DESC, id DESC
            LIMIT $2
            "#
        ))
        .bind(after)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;
        Ok(posts)
    }

    async fn update_content(&self, post_id: Uuid, user_id: Uuid, content: &str) -> Result<Option<Post>> {
        let mut tx = self.pool.begin().await?;

        let post = sqlx::query_as::<_, Post>(&format!(
            r#"
            UPDATE posts
            SET content = $3, updated_at = NOW()
            WHERE id = $1 AND user_id = $2 AND status = 'published'
            RETURNING {POST_COLUMNS}
            "#
        ))
        .bind(post_id)
        .bind(user_id)
        .bind(content)
        .fetch_optional(&mut *tx)
        .await?;

        if let Some(post) = &post {
            SqlxOutboxRepository::insert(&mut tx, &events::outbox_row(&events::post_updated(post))?)
                .await?;
        }
        tx.commit().await?;
        Ok(post)
    }

    async fn delete(&self, post_id: Uuid, user_id: Uuid) -> Result<Option<Post>> {
        let mut tx = self.pool.begin().await?;

        let post = sqlx::query_as::<_, Post>(&format!(
            r#"
            DELETE FROM posts
            WHERE id = $1 AND user_id = $2 AND status = 'published'
            RETURNING {POST_COLUMNS}
            "#
        ))
        .bind(post_id)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?;

        if let Some(post) = &post {
            SqlxOutboxRepository::insert(&mut tx, &events::outbox_row(&events::post_deleted(post))?)
                .await?;
        }
        tx.commit().await?;
        Ok(post)
    }

    async fn toggle_like(&self, post_id: Uuid, user_id: Uuid) -> Result<Option<LikeToggle>> {
        let source = SerializablePool(self.pool.clone());

        run_in_transaction(&source, &self.retry, |tx| {
            Box::pin(async move {
                let row = sqlx::query(
                    "SELECT user_id FROM posts WHERE id = $1 AND status = 'published'",
                )
                .bind(post_id)
                .fetch_optional(&mut **tx)
                .await?;
                let Some(row) = row else {
                    return Ok(None);
                };
                let post_owner_id: Uuid = row.try_get("user_id")?;

                let unliked = sqlx::query("DELETE FROM post_likes WHERE post_id = $1 AND user_id = $2")
                    .bind(post_id)
                    .bind(user_id)
                    .execute(&mut **tx)
                    .await?
                    .rows_affected()
                    > 0;

                if !unliked {
                    sqlx::query("INSERT INTO post_likes (post_id, user_id) VALUES ($1, $2)")
                        .bind(post_id)
                        .bind(user_id)
                        .execute(&mut **tx)
                        .await?;
                }

                let likes_count: i64 = sqlx::query_scalar(
                    r#"
                    UPDATE posts
                    SET likes_count = GREATEST(likes_count + $2, 0)
                    WHERE id = $1
                    RETURNING likes_count
                    "#,
                )
                .bind(post_id)
                .bind(if unliked { -1_i64 } else { 1_i64 })
                .fetch_one(&mut **tx)
                .await?;

                let toggle = LikeToggle {
                    post_id,
                    liked: !unliked,
                    likes_count,
                };
                let message = events::like_toggled(&toggle, post_owner_id, user_id);
                SqlxOutboxRepository::insert(tx, &events::outbox_row(&message)?).await?;

                Ok::<_, AppError>(Some(toggle))
            })
        })
        .await
    }
}

