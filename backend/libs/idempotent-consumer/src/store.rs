use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Row};
use tracing::debug;

use crate::error::IdempotencyResult;

/// Represents a processed event record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessedEvent {
    /// Unique key, `<handler>:<event_id>` for bus handlers
    pub event_id: String,
    pub processed_at: DateTime<Utc>,
    pub metadata: Option<serde_json::Value>,
}

/// Persistent set of processed event keys
#[async_trait]
pub trait ProcessedEventStore: Send + Sync {
    async fn is_processed(&self, event_id: &str) -> IdempotencyResult<bool>;

    /// Record `event_id`. Returns false when it was already present.
    async fn mark_processed(
        &self,
        event_id: &str,
        metadata: Option<serde_json::Value>,
    ) -> IdempotencyResult<bool>;

    /// Forget records older than `cutoff`; returns how many were dropped.
    async fn delete_processed_before(&self, cutoff: DateTime<Utc>) -> IdempotencyResult<u64>;
}

/// `processed_events` table in PostgreSQL
#[derive(Clone)]
pub struct PgProcessedEventStore {
    pool: PgPool,
}

impl PgProcessedEventStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProcessedEventStore for PgProcessedEventStore {
    async fn is_processed(&self, event_id: &str) -> IdempotencyResult<bool> {
        let result = sqlx::query(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM processed_events WHERE event_id = $1
            ) AS exists
            "#,
        )
        .bind(event_id)
        .fetch_one(&self.pool)
        .await
        .context("Failed to check if event is processed")?;

        Ok(result.try_get("exists")?)
    }

    async fn mark_processed(
        &self,
        event_id: &str,
        metadata: Option<serde_json::Value>,
    ) -> IdempotencyResult<bool> {
        // A concurrent insert of the same key is a no-op, not an error
        let result = sqlx::query(
            r#"
            INSERT INTO processed_events (event_id, metadata, processed_at)
            VALUES ($1, $2, NOW())
            ON CONFLICT (event_id) DO NOTHING
            "#,
        )
        .bind(event_id)
        .bind(&metadata)
        .execute(&self.pool)
        .await
        .context("Failed to mark event as processed")?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_processed_before(&self, cutoff: DateTime<Utc>) -> IdempotencyResult<u64> {
        let result = sqlx::query("DELETE FROM processed_events WHERE processed_at < $1")
            .bind(cutoff)
            .execute(&self.pool)
            .await
            .context("Failed to cleanup old events")?;

        Ok(result.rows_affected())
    }
}

/// Process-local store for tests and single-node development
#[derive(Default)]
pub struct InMemoryProcessedEventStore {
    events: DashMap<String, ProcessedEvent>,
}

impl InMemoryProcessedEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn get(&self, event_id: &str) -> Option<ProcessedEvent> {
        self.events.get(event_id).map(|e| e.clone())
    }

    /// Insert a record with an explicit timestamp
    pub fn insert_at(&self, event_id: &str, processed_at: DateTime<Utc>) {
        self.events.insert(
            event_id.to_string(),
            ProcessedEvent {
                event_id: event_id.to_string(),
                processed_at,
                metadata: None,
            },
        );
    }
}

#[async_trait]
impl ProcessedEventStore for InMemoryProcessedEventStore {
    async fn is_processed(&self, event_id: &str) -> IdempotencyResult<bool> {
        Ok(self.events.contains_key(event_id))
    }

    async fn mark_processed(
        &self,
        event_id: &str,
        metadata: Option<serde_json::Value>,
    ) -> IdempotencyResult<bool> {
        let entry = self.events.entry(event_id.to_string());
        match entry {
            dashmap::mapref::entry::Entry::Occupied(_) => {
                debug!(event_id = %event_id, "Event already marked as processed (duplicate)");
                Ok(false)
            }
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(ProcessedEvent {
                    event_id: event_id.to_string(),
                    processed_at: Utc::now(),
                    metadata,
                });
                Ok(true)
            }
        }
    }

    async fn delete_processed_before(&self, cutoff: DateTime<Utc>) -> IdempotencyResult<u64> {
        let before = self.events.len();
        self.events.retain(|_, e| e.processed_at >= cutoff);
        Ok(before.saturating_sub(self.events.len()) as u64)
    }
}
