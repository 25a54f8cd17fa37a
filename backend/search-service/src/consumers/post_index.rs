use crate::index::{PostDocument, SearchIndex};
use crate::metrics;
use anyhow::Context;
use async_trait::async_trait;
use cache_invalidation::{CacheInvalidator, CacheKey, InvalidationTarget};
use event_bus::EventHandler;
use event_schema::{DomainEvent, EventMessage};
use std::sync::Arc;
use tracing::{debug, info};

/// Maintains one index record per post id
pub struct PostIndexConsumer {
    index: Arc<dyn SearchIndex>,
    cache: Arc<CacheInvalidator>,
}

impl PostIndexConsumer {
    pub const NAME: &'static str = "search.post_index";

    pub fn new(index: Arc<dyn SearchIndex>, cache: Arc<CacheInvalidator>) -> Self {
        Self { index, cache }
    }
}

#[async_trait]
impl EventHandler for PostIndexConsumer {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn handle(&self, message: &EventMessage) -> anyhow::Result<()> {
        match &message.event {
            DomainEvent::PostCreated(event) => {
                let doc = PostDocument {
                    post_id: event.post_id,
                    user_id: event.user_id,
                    content: event.content.clone(),
                    media_count: i32::try_from(event.media_urls.len()).unwrap_or(i32::MAX),
                    created_at: event.created_at,
                };
                let applied = self
                    .index
                    .upsert_post(&doc)
                    .await
                    .with_context(|| format!("indexing post {}", event.post_id))?;
                if !applied {
                    debug!(post_id = %event.post_id, "Skipping create of deleted post");
                    return Ok(());
                }
                metrics::record_index_op("post", "upsert");
                info!(post_id = %event.post_id, "Post indexed");
            }
            DomainEvent::PostUpdated(event) => {
                let applied = self
                    .index
                    .update_post_content(event.post_id, event.user_id, &event.content, event.updated_at)
                    .await
                    .with_context(|| format!("reindexing post {}", event.post_id))?;
                if !applied {
                    debug!(post_id = %event.post_id, "Skipping update of deleted post");
                    return Ok(());
                }
                metrics::record_index_op("post", "upsert");
                debug!(post_id = %event.post_id, "Post reindexed");
            }
            DomainEvent::PostDeleted(event) => {
                let removed = self
                    .index
                    .remove_post(event.post_id)
                    .await
                    .with_context(|| format!("removing post {} from index", event.post_id))?;
                metrics::record_index_op("post", "remove");
                debug!(post_id = %event.post_id, removed, "Post removed from index");
            }
            _ => {
                debug!(routing_key = %message.routing_key(), "Ignoring unrelated event");
                return Ok(());
            }
        }

        self.cache
            .invalidate(&[InvalidationTarget::pattern(CacheKey::posts_search_pattern())])
            .await;
        Ok(())
    }
}
