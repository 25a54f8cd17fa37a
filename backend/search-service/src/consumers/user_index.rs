use crate::index::{SearchIndex, UserDocument};
use crate::metrics;
use anyhow::Context;
use async_trait::async_trait;
use cache_invalidation::{CacheInvalidator, CacheKey, InvalidationTarget};
use event_bus::EventHandler;
use event_schema::{DomainEvent, EventMessage};
use std::sync::Arc;
use tracing::debug;

/// Maintains one index record per user id
pub struct UserIndexConsumer {
    index: Arc<dyn SearchIndex>,
    cache: Arc<CacheInvalidator>,
}

impl UserIndexConsumer {
    pub const NAME: &'static str = "search.user_index";

    pub fn new(index: Arc<dyn SearchIndex>, cache: Arc<CacheInvalidator>) -> Self {
        Self { index, cache }
    }
}

#[async_trait]
impl EventHandler for UserIndexConsumer {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn handle(&self, message: &EventMessage) -> anyhow::Result<()> {
        match &message.event {
            DomainEvent::UserCreated(event) => {
                let doc = UserDocument {
                    user_id: event.user_id,
                    username: event.username.clone(),
                    display_name: event.display_name.clone(),
                    bio: None,
                };
                self.index
                    .upsert_user(&doc)
                    .await
                    .with_context(|| format!("indexing user {}", event.user_id))?;
                metrics::record_index_op("user", "upsert");
            }
            DomainEvent::UserUpdated(event) => {
                let doc = UserDocument {
                    user_id: event.user_id,
                    username: event.username.clone(),
                    display_name: event.display_name.clone(),
                    bio: event.bio.clone(),
                };
                self.index
                    .upsert_user(&doc)
                    .await
                    .with_context(|| format!("reindexing user {}", event.user_id))?;
                metrics::record_index_op("user", "upsert");
            }
            DomainEvent::UserDeleted(event) => {
                self.index
                    .remove_user(event.user_id)
                    .await
                    .with_context(|| format!("removing user {} from index", event.user_id))?;
                metrics::record_index_op("user", "remove");
            }
            _ => {
                debug!(routing_key = %message.routing_key(), "Ignoring unrelated event");
                return Ok(());
            }
        }

        self.cache
            .invalidate(&[InvalidationTarget::pattern(CacheKey::users_search_pattern())])
            .await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::InMemorySearchIndex;
    use cache_invalidation::InMemoryCacheStore;
    use chrono::Utc;
    use event_schema::{UserCreated, UserDeleted, UserUpdated};
    use uuid::Uuid;

    #[tokio::test]
    async fn test_user_lifecycle() {
        let index = Arc::new(InMemorySearchIndex::new());
        let cache = Arc::new(CacheInvalidator::new(
            Arc::new(InMemoryCacheStore::new()),
            "search-test",
        ));
        let consumer = UserIndexConsumer::new(index.clone(), cache);
        let user_id = Uuid::new_v4();

        consumer
            .handle(&EventMessage::new(DomainEvent::UserCreated(UserCreated {
                user_id,
                username: "alice".into(),
                display_name: None,
                created_at: Utc::now(),
            })))
            .await
            .unwrap();
        assert_eq!(index.user(user_id).unwrap().username, "alice");

        consumer
            .handle(&EventMessage::new(DomainEvent::UserUpdated(UserUpdated {
                user_id,
                username: "alice".into(),
                display_name: Some("Alice L.".into()),
                bio: Some("hi".into()),
                avatar_url: None,
                updated_at: Utc::now(),
            })))
            .await
            .unwrap();
        let doc = index.user(user_id).unwrap();
        assert_eq!(doc.display_name.as_deref(), Some("Alice L."));
        assert_eq!(doc.bio.as_deref(), Some("hi"));

        consumer
            .handle(&EventMessage::new(DomainEvent::UserDeleted(UserDeleted {
                user_id,
                deleted_at: Utc::now(),
            })))
            .await
            .unwrap();
        assert!(index.user(user_id).is_none());
    }
}
