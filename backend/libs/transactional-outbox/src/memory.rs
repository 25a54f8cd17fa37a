use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use uuid::Uuid;

use crate::error::{OutboxError, OutboxResult};
use crate::event::{backoff_for, OutboxEvent};
use crate::repository::{OutboxStore, PendingStats};

const CLAIM_LEASE: chrono::Duration = chrono::Duration::seconds(30);

/// Process-local outbox for tests and local development.
///
/// `insert` appends immediately; there is no surrounding transaction, so
/// callers insert after their in-memory mutation succeeded.
#[derive(Default)]
pub struct InMemoryOutbox {
    events: Mutex<Vec<OutboxEvent>>,
}

impl InMemoryOutbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, event: OutboxEvent) {
        self.events.lock().push(event);
    }

    /// Every row, published or not, in insertion order
    pub fn events(&self) -> Vec<OutboxEvent> {
        self.events.lock().clone()
    }

    pub fn unpublished(&self) -> Vec<OutboxEvent> {
        self.events
            .lock()
            .iter()
            .filter(|e| e.published_at.is_none())
            .cloned()
            .collect()
    }

    /// Make every unpublished row due now, ignoring backoff and claims.
    pub fn make_all_due(&self) {
        let now = Utc::now();
        for event in self.events.lock().iter_mut() {
            event.next_attempt_at = now;
        }
    }
}

#[async_trait]
impl OutboxStore for InMemoryOutbox {
    async fn fetch_due(&self, limit: i64, max_retries: i32) -> OutboxResult<Vec<OutboxEvent>> {
        let now = Utc::now();
        let mut events = self.events.lock();

        // Oldest unpublished row per aggregate that is not due; later rows
        // of that aggregate wait behind it
        let mut blockers: HashMap<Uuid, DateTime<Utc>> = HashMap::new();
        for e in events.iter().filter(|e| {
            e.published_at.is_none() && (e.next_attempt_at > now || e.retry_count >= max_retries)
        }) {
            blockers
                .entry(e.aggregate_id)
                .and_modify(|at| *at = (*at).min(e.created_at))
                .or_insert(e.created_at);
        }

        let mut due: Vec<&mut OutboxEvent> = events
            .iter_mut()
            .filter(|e| {
                e.published_at.is_none()
                    && e.next_attempt_at <= now
                    && e.retry_count < max_retries
                    && blockers
                        .get(&e.aggregate_id)
                        .map_or(true, |blocker| e.created_at <= *blocker)
            })
            .collect();
        due.sort_by_key(|e| e.created_at);

        Ok(due
            .into_iter()
            .take(limit.max(0) as usize)
            .map(|e| {
                e.next_attempt_at = now + CLAIM_LEASE;
                e.clone()
            })
            .collect())
    }

    async fn mark_published(&self, event_id: Uuid) -> OutboxResult<()> {
        let mut events = self.events.lock();
        let event = events
            .iter_mut()
            .find(|e| e.id == event_id)
            .ok_or(OutboxError::EventNotFound(event_id))?;
        event.published_at = Some(Utc::now());
        Ok(())
    }

    async fn mark_failed(&self, event_id: Uuid, error: &str) -> OutboxResult<()> {
        let mut events = self.events.lock();
        let event = events
            .iter_mut()
            .find(|e| e.id == event_id)
            .ok_or(OutboxError::EventNotFound(event_id))?;

        let backoff = chrono::Duration::from_std(backoff_for(event.retry_count))
            .map_err(|e| OutboxError::Other(e.into()))?;
        event.retry_count += 1;
        event.last_error = Some(error.to_string());
        event.next_attempt_at = Utc::now() + backoff;
        Ok(())
    }

    async fn pending_stats(&self, max_retries: i32) -> OutboxResult<PendingStats> {
        let now = Utc::now();
        let events = self.events.lock();
        let pending: Vec<&OutboxEvent> = events.iter().filter(|e| e.published_at.is_none()).collect();

        Ok(PendingStats {
            pending: pending.len() as i64,
            oldest_age_seconds: pending
                .iter()
                .map(|e| (now - e.created_at).num_seconds())
                .max()
                .unwrap_or(0),
            exhausted: pending.iter().filter(|e| e.retry_count >= max_retries).count() as i64,
        })
    }
}
