use crate::services::MediaService;
use anyhow::Context;
use async_trait::async_trait;
use event_bus::EventHandler;
use event_schema::{DomainEvent, EventMessage};
use std::sync::Arc;
use tracing::debug;

/// Deletes the media of a post once content-service reports it deleted, or
/// discarded by a rolled-back create
pub struct PostDeletedConsumer {
    service: Arc<MediaService>,
}

impl PostDeletedConsumer {
    pub const NAME: &'static str = "media.post_deleted";

    pub fn new(service: Arc<MediaService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl EventHandler for PostDeletedConsumer {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn handle(&self, message: &EventMessage) -> anyhow::Result<()> {
        let post_id = match &message.event {
            DomainEvent::PostDeleted(event) => event.post_id,
            DomainEvent::PostDiscarded(event) => event.post_id,
            _ => {
                debug!(routing_key = %message.routing_key(), "Ignoring unrelated event");
                return Ok(());
            }
        };

        self.service
            .purge_post(post_id)
            .await
            .with_context(|| format!("purging media of post {}", post_id))?;
        Ok(())
    }
}
