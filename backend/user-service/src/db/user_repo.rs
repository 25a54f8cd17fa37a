use crate::error::{AppError, Result};
use crate::events;
use crate::models::{UpdateUserRequest, User};
use async_trait::async_trait;
use resilience::{run_in_transaction, RetryConfig, SerializablePool};
use sqlx::PgPool;
use transactional_outbox::SqlxOutboxRepository;
use uuid::Uuid;

const USER_COLUMNS: &str =
    "id, username, email, display_name, bio, avatar_url, posts_count, created_at, updated_at";

/// User storage. Profile mutations write their `user.*` outbox row in the
/// same transaction.
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Insert with `user.created`. A taken username or email is `Conflict`.
    async fn create(&self, user: &User) -> Result<()>;

    async fn find(&self, user_id: Uuid) -> Result<Option<User>>;

    /// Apply the present fields, writes `user.updated`
    async fn update(&self, user_id: Uuid, update: &UpdateUserRequest) -> Result<Option<User>>;

    /// Soft delete, writes `user.deleted`
    async fn delete(&self, user_id: Uuid) -> Result<Option<User>>;

    /// Add `delta` to `posts_count`, floored at zero. `None` for unknown users.
    async fn adjust_posts_count(&self, user_id: Uuid, delta: i64) -> Result<Option<i64>>;
}

pub struct PgUserRepository {
    pool: PgPool,
    retry: RetryConfig,
}

impl PgUserRepository {
    pub fn new(pool: PgPool, retry: RetryConfig) -> Self {
        Self { pool, retry }
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn create(&self, user: &User) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(
            r#"
            INSERT INTO users (id, username, email, display_name, bio, avatar_url, posts_count, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(user.id)
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.display_name)
        .bind(&user.bio)
        .bind(&user.avatar_url)
        .bind(user.posts_count)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&mut *tx)
        .await?;

        SqlxOutboxRepository::insert(&mut tx, &events::outbox_row(&events::user_created(user))?)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn find(&self, user_id: Uuid) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1 AND deleted_at IS NULL"
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn update(&self, user_id: Uuid, update: &UpdateUserRequest) -> Result<Option<User>> {
        let mut tx = self.pool.begin().await?;

        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users
            SET display_name = COALESCE($2, display_name),
                bio = COALESCE($3, bio),
                avatar_url = COALESCE($4, avatar_url),
                updated_at = NOW()
            WHERE id = $1 AND deleted_at IS NULL
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(user_id)
        .bind(&update.display_name)
        .bind(&update.bio)
        .bind(&update.avatar_url)
        .fetch_optional(&mut *tx)
        .await?;

        if let Some(user) = &user {
            SqlxOutboxRepository::insert(&mut tx, &events::outbox_row(&events::user_updated(user))?)
                .await?;
        }
        tx.commit().await?;
        Ok(user)
    }

    async fn delete(&self, user_id: Uuid) -> Result<Option<User>> {
        let mut tx = self.pool.begin().await?;

        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users
            SET deleted_at = NOW(), updated_at = NOW()
            WHERE id = $1 AND deleted_at IS NULL
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?;

        if let Some(user) = &user {
            SqlxOutboxRepository::insert(&mut tx, &events::outbox_row(&events::user_deleted(user))?)
                .await?;
        }
        tx.commit().await?;
        Ok(user)
    }

    async fn adjust_posts_count(&self, user_id: Uuid, delta: i64) -> Result<Option<i64>> {
        let source = SerializablePool(self.pool.clone());

        run_in_transaction(&source, &self.retry, |tx| {
            Box::pin(async move {
                let current: Option<i64> = sqlx::query_scalar(
                    "SELECT posts_count FROM users WHERE id = $1 AND deleted_at IS NULL",
                )
                .bind(user_id)
                .fetch_optional(&mut **tx)
                .await?;
                let Some(current) = current else {
                    return Ok(None);
                };

                let next = (current + delta).max(0);
                sqlx::query("UPDATE users SET posts_count = $2 WHERE id = $1")
                    .bind(user_id)
                    .bind(next)
                    .execute(&mut **tx)
                    .await?;

                Ok::<_, AppError>(Some(next))
            })
        })
        .await
    }
}
