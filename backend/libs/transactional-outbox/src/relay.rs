use event_bus::EventBus;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::error::OutboxResult;
use crate::event::OutboxEvent;
use crate::metrics::OutboxMetrics;
use crate::repository::OutboxStore;

#[derive(Debug, Clone)]
pub struct OutboxRelayConfig {
    /// Rows claimed per batch
    pub batch_size: i64,
    pub poll_interval: Duration,
    /// Failed attempts after which a row is left for manual intervention
    pub max_retries: i32,
}

impl Default for OutboxRelayConfig {
    fn default() -> Self {
        Self {
            batch_size: 100,
            poll_interval: Duration::from_secs(1),
            max_retries: 10,
        }
    }
}

impl OutboxRelayConfig {
    /// `OUTBOX_BATCH_SIZE`, `OUTBOX_POLL_INTERVAL_MS`, `OUTBOX_MAX_RETRIES`
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let var = |name: &str| std::env::var(name).ok();
        Self {
            batch_size: var("OUTBOX_BATCH_SIZE")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.batch_size),
            poll_interval: var("OUTBOX_POLL_INTERVAL_MS")
                .and_then(|v| v.parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(defaults.poll_interval),
            max_retries: var("OUTBOX_MAX_RETRIES")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.max_retries),
        }
    }
}

/// Moves committed outbox rows onto the event bus.
pub struct OutboxRelay {
    store: Arc<dyn OutboxStore>,
    bus: Arc<EventBus>,
    config: OutboxRelayConfig,
    metrics: Option<OutboxMetrics>,
}

impl OutboxRelay {
    pub fn new(store: Arc<dyn OutboxStore>, bus: Arc<EventBus>, config: OutboxRelayConfig) -> Self {
        Self {
            store,
            bus,
            config,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: OutboxMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Poll forever. Spawn it and abort the task on shutdown.
    pub async fn start(&self) {
        info!(
            batch_size = self.config.batch_size,
            poll_interval_ms = self.config.poll_interval.as_millis() as u64,
            max_retries = self.config.max_retries,
            "Starting outbox relay"
        );

        loop {
            match self.process_batch().await {
                Ok(count) if count > 0 => info!(published_count = count, "Published events from outbox"),
                Ok(_) => debug!("No events to publish"),
                Err(e) => error!(error = %e, "Outbox relay error"),
            }

            self.refresh_stats().await;
            tokio::time::sleep(self.config.poll_interval).await;
        }
    }

    /// Publish one batch of due rows in creation order.
    ///
    /// Once a row fails, the rest of its aggregate's rows in the batch are
    /// left for a later pass.
    ///
    /// Returns the number of rows marked published.
    pub async fn process_batch(&self) -> OutboxResult<usize> {
        let events = self
            .store
            .fetch_due(self.config.batch_size, self.config.max_retries)
            .await?;
        let mut published = 0;
        let mut stalled: HashSet<Uuid> = HashSet::new();

        for event in events {
            if stalled.contains(&event.aggregate_id) {
                debug!(
                    event_id = %event.id,
                    aggregate_id = %event.aggregate_id,
                    "Holding event behind an earlier failure of its aggregate"
                );
                continue;
            }

            match self.publish(&event).await {
                Ok(()) => {
                    if let Err(e) = self.store.mark_published(event.id).await {
                        // Already on the bus; the row will go out again and
                        // consumers drop the duplicate.
                        error!(
                            event_id = %event.id,
                            error = %e,
                            "Failed to mark event as published"
                        );
                    } else {
                        published += 1;
                        if let Some(metrics) = &self.metrics {
                            metrics.published.inc();
                        }
                    }
                }
                Err(e) => {
                    warn!(
                        event_id = %event.id,
                        event_type = %event.event_type,
                        retry_count = event.retry_count,
                        error = %e,
                        "Failed to publish outbox event"
                    );
                    if let Some(metrics) = &self.metrics {
                        metrics.failed.inc();
                    }
                    stalled.insert(event.aggregate_id);
                    if let Err(mark_err) = self.store.mark_failed(event.id, &e.to_string()).await {
                        error!(
                            event_id = %event.id,
                            error = %mark_err,
                            "Failed to mark event as failed"
                        );
                    }
                }
            }
        }

        Ok(published)
    }

    async fn publish(&self, event: &OutboxEvent) -> OutboxResult<()> {
        let body = event.body()?;
        self.bus.publish_raw(&event.event_type, &body).await?;
        debug!(event_id = %event.id, event_type = %event.event_type, "Outbox event published");
        Ok(())
    }

    async fn refresh_stats(&self) {
        let stats = match self.store.pending_stats(self.config.max_retries).await {
            Ok(stats) => stats,
            Err(e) => {
                warn!(error = %e, "Failed to read outbox stats");
                return;
            }
        };

        if stats.exhausted > 0 {
            warn!(
                exhausted = stats.exhausted,
                max_retries = self.config.max_retries,
                "Outbox events exceeded max retries, skipping (requires manual intervention)"
            );
        }

        if let Some(metrics) = &self.metrics {
            metrics.pending.set(stats.pending);
            metrics.oldest_pending_age_seconds.set(stats.oldest_age_seconds);
        }
    }
}
