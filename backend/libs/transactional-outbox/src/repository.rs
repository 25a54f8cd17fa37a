use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, Row, Transaction};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{OutboxError, OutboxResult};
use crate::event::{OutboxEvent, MAX_BACKOFF};

/// How long a fetched row stays claimed by one relay before another may
/// pick it up again.
const CLAIM_LEASE_SECS: i64 = 30;

/// Snapshot of the unpublished part of the outbox
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PendingStats {
    pub pending: i64,
    /// Age of the oldest unpublished row, 0 when none
    pub oldest_age_seconds: i64,
    /// Unpublished rows that used up their retry budget
    pub exhausted: i64,
}

/// Relay-side view of the outbox.
#[async_trait]
pub trait OutboxStore: Send + Sync {
    /// Claim up to `limit` unpublished rows whose `next_attempt_at` has
    /// passed and that have failed fewer than `max_retries` times, oldest
    /// first.
    ///
    /// A row is held back while an older unpublished row of the same
    /// aggregate is not due (backing off, claimed, or out of retries), so one
    /// aggregate's events leave in creation order. An older row that is due
    /// is returned ahead of it in the same batch. A row past its retry budget
    /// keeps blocking its aggregate until it is repaired or replayed.
    async fn fetch_due(&self, limit: i64, max_retries: i32) -> OutboxResult<Vec<OutboxEvent>>;

    async fn mark_published(&self, event_id: Uuid) -> OutboxResult<()>;

    /// Record a failed attempt: bump `retry_count`, keep the error and push
    /// `next_attempt_at` out by the exponential backoff.
    async fn mark_failed(&self, event_id: Uuid, error: &str) -> OutboxResult<()>;

    async fn pending_stats(&self, max_retries: i32) -> OutboxResult<PendingStats>;
}

/// PostgreSQL outbox. `insert` runs inside the caller's business
/// transaction; the relay methods use the pool.
#[derive(Clone)]
pub struct SqlxOutboxRepository {
    pool: PgPool,
}

impl SqlxOutboxRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a new event into the outbox within the caller's transaction.
    pub async fn insert(
        tx: &mut Transaction<'_, Postgres>,
        event: &OutboxEvent,
    ) -> OutboxResult<()> {
        sqlx::query(
            r#"
            INSERT INTO outbox_events (
                id,
                aggregate_type,
                aggregate_id,
                event_type,
                payload,
                metadata,
                created_at,
                published_at,
                retry_count,
                last_error,
                next_attempt_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(event.id)
        .bind(&event.aggregate_type)
        .bind(event.aggregate_id)
        .bind(&event.event_type)
        .bind(&event.payload)
        .bind(&event.metadata)
        .bind(event.created_at)
        .bind(event.published_at)
        .bind(event.retry_count)
        .bind(&event.last_error)
        .bind(event.next_attempt_at)
        .execute(&mut **tx)
        .await
        .context("Failed to insert event into outbox")?;

        debug!(
            event_id = %event.id,
            event_type = %event.event_type,
            aggregate_id = %event.aggregate_id,
            "Event inserted into outbox"
        );

        Ok(())
    }

    /// Reset published rows created since `ts` so the relay sends them again.
    pub async fn replay_since(&self, ts: DateTime<Utc>) -> OutboxResult<u64> {
        let res = sqlx::query(
            r#"
            UPDATE outbox_events
            SET published_at = NULL,
                retry_count = 0,
                last_error = NULL,
                next_attempt_at = NOW()
            WHERE created_at >= $1
            "#,
        )
        .bind(ts)
        .execute(&self.pool)
        .await
        .context("Failed to replay events since timestamp")?;

        Ok(res.rows_affected())
    }

    fn map_row(row: PgRow) -> Result<OutboxEvent, sqlx::Error> {
        Ok(OutboxEvent {
            id: row.try_get("id")?,
            aggregate_type: row.try_get("aggregate_type")?,
            aggregate_id: row.try_get("aggregate_id")?,
            event_type: row.try_get("event_type")?,
            payload: row.try_get("payload")?,
            metadata: row.try_get("metadata")?,
            created_at: row.try_get("created_at")?,
            published_at: row.try_get("published_at")?,
            retry_count: row.try_get("retry_count")?,
            last_error: row.try_get("last_error")?,
            next_attempt_at: row.try_get("next_attempt_at")?,
        })
    }
}

#[async_trait]
impl OutboxStore for SqlxOutboxRepository {
    async fn fetch_due(&self, limit: i64, max_retries: i32) -> OutboxResult<Vec<OutboxEvent>> {
        // Claim by pushing next_attempt_at forward; SKIP LOCKED keeps
        // concurrent relays off each other's rows.
        let rows = sqlx::query(
            r#"
            UPDATE outbox_events
            SET next_attempt_at = NOW() + make_interval(secs => $2)
            WHERE id IN (
                SELECT o.id
                FROM outbox_events o
                WHERE o.published_at IS NULL
                  AND o.next_attempt_at <= NOW()
                  AND o.retry_count < $3
                  AND NOT EXISTS (
                      SELECT 1
                      FROM outbox_events prior
                      WHERE prior.aggregate_id = o.aggregate_id
                        AND prior.published_at IS NULL
                        AND prior.created_at < o.created_at
                        AND (prior.next_attempt_at > NOW() OR prior.retry_count >= $3)
                  )
                ORDER BY o.created_at ASC
                LIMIT $1
                FOR UPDATE OF o SKIP LOCKED
            )
            RETURNING
                id,
                aggregate_type,
                aggregate_id,
                event_type,
                payload,
                metadata,
                created_at,
                published_at,
                retry_count,
                last_error,
                next_attempt_at
            "#,
        )
        .bind(limit)
        .bind(CLAIM_LEASE_SECS as f64)
        .bind(max_retries)
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch due events")?;

        let mut events = rows
            .into_iter()
            .map(Self::map_row)
            .collect::<Result<Vec<_>, sqlx::Error>>()
            .context("Failed to parse events")?;

        // RETURNING carries no order
        events.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));

        debug!(count = events.len(), "Fetched due outbox events");
        Ok(events)
    }

    async fn mark_published(&self, event_id: Uuid) -> OutboxResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE outbox_events
            SET published_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(event_id)
        .execute(&self.pool)
        .await
        .context("Failed to mark event as published")?;

        if result.rows_affected() == 0 {
            warn!(event_id = %event_id, "Event not found when marking as published");
            return Err(OutboxError::EventNotFound(event_id));
        }

        debug!(event_id = %event_id, "Event marked as published");
        Ok(())
    }

    async fn mark_failed(&self, event_id: Uuid, error: &str) -> OutboxResult<()> {
        // SET expressions see the pre-update retry_count: 1s, 2s, 4s, ... 300s
        let row = sqlx::query(
            r#"
            UPDATE outbox_events
            SET retry_count = retry_count + 1,
                last_error = $2,
                next_attempt_at = NOW() + make_interval(secs => LEAST(power(2, retry_count), $3))
            WHERE id = $1
            RETURNING retry_count, next_attempt_at
            "#,
        )
        .bind(event_id)
        .bind(error)
        .bind(MAX_BACKOFF.as_secs() as f64)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to mark event as failed")?;

        let Some(row) = row else {
            warn!(event_id = %event_id, "Event not found when marking as failed");
            return Err(OutboxError::EventNotFound(event_id));
        };

        let retry_count: i32 = row.try_get("retry_count")?;
        let next_attempt_at: DateTime<Utc> = row.try_get("next_attempt_at")?;
        warn!(
            event_id = %event_id,
            retry_count,
            next_attempt_at = %next_attempt_at,
            error = %error,
            "Event marked as failed"
        );
        Ok(())
    }

    async fn pending_stats(&self, max_retries: i32) -> OutboxResult<PendingStats> {
        let rec = sqlx::query(
            r#"
            SELECT
                COUNT(*)::BIGINT AS pending,
                COALESCE(EXTRACT(EPOCH FROM (NOW() - MIN(created_at)))::BIGINT, 0) AS age_seconds,
                COUNT(*) FILTER (WHERE retry_count >= $1)::BIGINT AS exhausted
            FROM outbox_events
            WHERE published_at IS NULL
            "#,
        )
        .bind(max_retries)
        .fetch_one(&self.pool)
        .await
        .context("Failed to compute pending stats")?;

        Ok(PendingStats {
            pending: rec.try_get("pending")?,
            oldest_age_seconds: rec.try_get("age_seconds")?,
            exhausted: rec.try_get("exhausted")?,
        })
    }
}
