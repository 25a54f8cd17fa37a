use chrono::Utc;
use sqlx::PgPool;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::{IdempotencyError, IdempotencyResult};
use crate::store::{PgProcessedEventStore, ProcessedEventStore};

/// Longest accepted event id, matching the `processed_events.event_id` column
pub const MAX_EVENT_ID_LEN: usize = 255;

/// Result of processing an event with idempotency check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessingResult {
    /// Event was processed successfully (first time)
    Success,

    /// Event was already processed before (duplicate)
    AlreadyProcessed,

    /// Processing function returned an error; the event is not recorded
    Failed(String),
}

impl ProcessingResult {
    /// Either first-time success or a skipped duplicate
    pub fn is_ok(&self) -> bool {
        matches!(
            self,
            ProcessingResult::Success | ProcessingResult::AlreadyProcessed
        )
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, ProcessingResult::Failed(_))
    }
}

/// Runs a piece of work at most once per event id.
///
/// The id is recorded only after the work succeeds, so a failed attempt can
/// be retried by a later delivery. Two concurrent deliveries of the same id
/// may both run; the store records one of them.
#[derive(Clone)]
pub struct IdempotencyGuard {
    store: Arc<dyn ProcessedEventStore>,
    retention_duration: Duration,
}

impl IdempotencyGuard {
    pub fn new(store: Arc<dyn ProcessedEventStore>, retention_duration: Duration) -> Self {
        Self {
            store,
            retention_duration,
        }
    }

    /// Guard backed by the `processed_events` table
    pub fn postgres(pool: PgPool, retention_duration: Duration) -> Self {
        Self::new(Arc::new(PgProcessedEventStore::new(pool)), retention_duration)
    }

    pub async fn is_processed(&self, event_id: &str) -> IdempotencyResult<bool> {
        Self::validate_event_id(event_id)?;

        let exists = self.store.is_processed(event_id).await?;
        if exists {
            debug!(event_id = %event_id, "Event already processed");
        }
        Ok(exists)
    }

    /// Returns true when the id was recorded for the first time.
    pub async fn mark_processed(
        &self,
        event_id: &str,
        metadata: Option<serde_json::Value>,
    ) -> IdempotencyResult<bool> {
        Self::validate_event_id(event_id)?;

        let has_metadata = metadata.is_some();
        let was_inserted = self.store.mark_processed(event_id, metadata).await?;

        if was_inserted {
            info!(event_id = %event_id, has_metadata, "Event marked as processed");
        } else {
            debug!(event_id = %event_id, "Event already marked as processed (duplicate)");
        }
        Ok(was_inserted)
    }

    /// Run `f` unless `event_id` was already processed.
    pub async fn process_if_new<F, Fut>(
        &self,
        event_id: &str,
        f: F,
    ) -> IdempotencyResult<ProcessingResult>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<()>>,
    {
        self.process_if_new_with_metadata(event_id, None, f).await
    }

    /// Same as [`process_if_new`](Self::process_if_new), storing `metadata`
    /// with the record.
    pub async fn process_if_new_with_metadata<F, Fut>(
        &self,
        event_id: &str,
        metadata: Option<serde_json::Value>,
        f: F,
    ) -> IdempotencyResult<ProcessingResult>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<()>>,
    {
        if self.is_processed(event_id).await? {
            return Ok(ProcessingResult::AlreadyProcessed);
        }

        match f().await {
            Ok(()) => {
                self.mark_processed(event_id, metadata).await?;
                Ok(ProcessingResult::Success)
            }
            Err(e) => {
                warn!(event_id = %event_id, error = %format!("{:#}", e), "Event processing failed");
                Ok(ProcessingResult::Failed(format!("{:#}", e)))
            }
        }
    }

    /// Delete records older than the retention window.
    pub async fn cleanup_old_events(&self) -> IdempotencyResult<u64> {
        let cutoff_time = Utc::now()
            - chrono::Duration::from_std(self.retention_duration).map_err(|e| {
                IdempotencyError::Other(anyhow::anyhow!("Invalid retention duration: {}", e))
            })?;

        let deleted_count = self.store.delete_processed_before(cutoff_time).await?;

        if deleted_count > 0 {
            info!(
                deleted_count,
                cutoff_time = %cutoff_time,
                "Cleaned up old processed events"
            );
        } else {
            debug!("No old events to cleanup");
        }
        Ok(deleted_count)
    }

    fn validate_event_id(event_id: &str) -> IdempotencyResult<()> {
        if event_id.is_empty() {
            return Err(IdempotencyError::InvalidEventId(
                "Event ID cannot be empty".to_string(),
            ));
        }

        if event_id.len() > MAX_EVENT_ID_LEN {
            return Err(IdempotencyError::InvalidEventId(format!(
                "Event ID too long: {} characters (max {})",
                event_id.len(),
                MAX_EVENT_ID_LEN
            )));
        }

        Ok(())
    }
}
