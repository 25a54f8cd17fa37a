use super::{like_pattern, PostDocument, SearchIndex, UserDocument};
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use std::time::Duration;
use uuid::Uuid;

/// Index tables in PostgreSQL, queried with ILIKE
pub struct PgSearchIndex {
    pool: PgPool,
}

impl PgSearchIndex {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Serializes writes to one post id until the transaction ends, so a delete
/// cannot interleave with a concurrent upsert of the same post.
async fn lock_post(tx: &mut Transaction<'_, Postgres>, post_id: Uuid) -> Result<()> {
    sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1::text, 0))")
        .bind(post_id)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

async fn is_tombstoned(tx: &mut Transaction<'_, Postgres>, post_id: Uuid) -> Result<bool> {
    let found: Option<(Uuid,)> = sqlx::query_as("SELECT post_id FROM deleted_posts WHERE post_id = $1")
        .bind(post_id)
        .fetch_optional(&mut **tx)
        .await?;
    Ok(found.is_some())
}

#[async_trait]
impl SearchIndex for PgSearchIndex {
    async fn upsert_post(&self, doc: &PostDocument) -> Result<bool> {
        let mut tx = self.pool.begin().await?;
        lock_post(&mut tx, doc.post_id).await?;
        if is_tombstoned(&mut tx, doc.post_id).await? {
            return Ok(false);
        }
        // created_at doubles as the content time of a create
        sqlx::query(
            r#"
            INSERT INTO post_index (post_id, user_id, content, media_count, created_at, content_at, indexed_at)
            VALUES ($1, $2, $3, $4, $5, $5, NOW())
            ON CONFLICT (post_id) DO UPDATE
            SET user_id = EXCLUDED.user_id,
                media_count = EXCLUDED.media_count,
                created_at = EXCLUDED.created_at,
                content = CASE
                    WHEN EXCLUDED.content_at >= post_index.content_at THEN EXCLUDED.content
                    ELSE post_index.content
                END,
                content_at = GREATEST(post_index.content_at, EXCLUDED.content_at),
                indexed_at = NOW()
            "#,
        )
        .bind(doc.post_id)
        .bind(doc.user_id)
        .bind(&doc.content)
        .bind(doc.media_count)
        .bind(doc.created_at)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(true)
    }

    async fn update_post_content(&self, post_id: Uuid, user_id: Uuid, content: &str, at: DateTime<Utc>) -> Result<bool> {
        let mut tx = self.pool.begin().await?;
        lock_post(&mut tx, post_id).await?;
        if is_tombstoned(&mut tx, post_id).await? {
            return Ok(false);
        }
        sqlx::query(
            r#"
            INSERT INTO post_index (post_id, user_id, content, media_count, created_at, content_at, indexed_at)
            VALUES ($1, $2, $3, 0, $4, $4, NOW())
            ON CONFLICT (post_id) DO UPDATE
            SET content = EXCLUDED.content,
                content_at = EXCLUDED.content_at,
                indexed_at = NOW()
            WHERE EXCLUDED.content_at >= post_index.content_at
            "#,
        )
        .bind(post_id)
        .bind(user_id)
        .bind(content)
        .bind(at)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(true)
    }

    async fn remove_post(&self, post_id: Uuid) -> Result<bool> {
        let mut tx = self.pool.begin().await?;
        lock_post(&mut tx, post_id).await?;
        sqlx::query("INSERT INTO deleted_posts (post_id) VALUES ($1) ON CONFLICT (post_id) DO NOTHING")
            .bind(post_id)
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query("DELETE FROM post_index WHERE post_id = $1")
            .bind(post_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }

    async fn purge_tombstones(&self, older_than: Duration) -> Result<u64> {
        let cutoff = Utc::now() - chrono::Duration::from_std(older_than).unwrap_or(chrono::Duration::zero());
        let result = sqlx::query("DELETE FROM deleted_posts WHERE deleted_at < $1")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn upsert_user(&self, doc: &UserDocument) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO user_index (user_id, username, display_name, bio, indexed_at)
            VALUES ($1, $2, $3, $4, NOW())
            ON CONFLICT (user_id) DO UPDATE
            SET username = EXCLUDED.username,
                display_name = EXCLUDED.display_name,
                bio = EXCLUDED.bio,
                indexed_at = NOW()
            "#,
        )
        .bind(doc.user_id)
        .bind(&doc.username)
        .bind(&doc.display_name)
        .bind(&doc.bio)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn remove_user(&self, user_id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM user_index WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn search_posts(&self, query: &str, limit: u32) -> Result<Vec<PostDocument>> {
        let posts = sqlx::query_as::<_, PostDocument>(
            r#"
            SELECT post_id, user_id, content, media_count, created_at
            FROM post_index
            WHERE content ILIKE $1
            ORDER BY created_at DESC
            LIMIT $2
            "#,
        )
        .bind(like_pattern(query))
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;
        Ok(posts)
    }

    async fn search_users(&self, query: &str, limit: u32) -> Result<Vec<UserDocument>> {
        let users = sqlx::query_as::<_, UserDocument>(
            r#"
            SELECT user_id, username, display_name, bio
            FROM user_index
            WHERE username ILIKE $1 OR display_name ILIKE $1
            ORDER BY username
            LIMIT $2
            "#,
        )
        .bind(like_pattern(query))
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;
        Ok(users)
    }
}
