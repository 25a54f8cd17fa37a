//! Notification persistence

use crate::error::{AppError, Result};
use crate::models::{Notification, NotificationType};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::migrate::Migrator;
use sqlx::PgPool;
use uuid::Uuid;

#[cfg(any(test, feature = "test-support"))]
mod memory;
#[cfg(any(test, feature = "test-support"))]
pub use memory::InMemoryNotificationRepository;

pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

#[async_trait]
pub trait NotificationRepository: Send + Sync {
    /// Store a notification. Returns false when the id already exists.
    async fn insert(&self, notification: &Notification) -> Result<bool>;

    /// Newest first
    async fn list_for_recipient(&self, recipient_id: Uuid, limit: u32) -> Result<Vec<Notification>>;

    /// Returns false when no such notification belongs to the recipient
    async fn mark_read(&self, id: Uuid, recipient_id: Uuid) -> Result<bool>;
}

#[derive(sqlx::FromRow)]
struct NotificationRow {
    id: Uuid,
    recipient_id: Uuid,
    actor_id: Uuid,
    notification_type: String,
    post_id: Option<Uuid>,
    is_read: bool,
    created_at: DateTime<Utc>,
}

impl TryFrom<NotificationRow> for Notification {
    type Error = AppError;

    fn try_from(row: NotificationRow) -> Result<Self> {
        let notification_type = NotificationType::parse(&row.notification_type).ok_or_else(|| {
            AppError::Internal(format!("unknown notification type {}", row.notification_type))
        })?;
        Ok(Notification {
            id: row.id,
            recipient_id: row.recipient_id,
            actor_id: row.actor_id,
            notification_type,
            post_id: row.post_id,
            is_read: row.is_read,
            created_at: row.created_at,
        })
    }
}

pub struct PgNotificationRepository {
    pool: PgPool,
}

impl PgNotificationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl NotificationRepository for PgNotificationRepository {
    async fn insert(&self, notification: &Notification) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO notifications (id, recipient_id, actor_id, notification_type, post_id, is_read, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(notification.id)
        .bind(notification.recipient_id)
        .bind(notification.actor_id)
        .bind(notification.notification_type.as_str())
        .bind(notification.post_id)
        .bind(notification.is_read)
        .bind(notification.created_at)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_for_recipient(&self, recipient_id: Uuid, limit: u32) -> Result<Vec<Notification>> {
        let rows = sqlx::query_as::<_, NotificationRow>(
            r#"
            SELECT id, recipient_id, actor_id, notification_type, post_id, is_read, created_at
            FROM notifications
            WHERE recipient_id = $1
            ORDER BY created_at DESC, id DESC
            LIMIT $2
            "#,
        )
        .bind(recipient_id)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Notification::try_from).collect()
    }

    async fn mark_read(&self, id: Uuid, recipient_id: Uuid) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE notifications SET is_read = TRUE WHERE id = $1 AND recipient_id = $2",
        )
        .bind(id)
        .bind(recipient_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
