use crate::services::NotificationService;
use anyhow::Context;
use async_trait::async_trait;
use event_bus::EventHandler;
use event_schema::{DomainEvent, EventMessage};
use std::sync::Arc;
use tracing::debug;

/// Turns `post.liked` into a notification for the post owner
pub struct PostLikedConsumer {
    service: Arc<NotificationService>,
}

impl PostLikedConsumer {
    pub const NAME: &'static str = "notification.post_liked";

    pub fn new(service: Arc<NotificationService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl EventHandler for PostLikedConsumer {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn handle(&self, message: &EventMessage) -> anyhow::Result<()> {
        let DomainEvent::PostLiked(event) = &message.event else {
            debug!(routing_key = %message.routing_key(), "Ignoring unrelated event");
            return Ok(());
        };

        self.service
            .notify_like(message.event_id, event)
            .await
            .with_context(|| format!("notifying owner of post {}", event.post_id))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::InMemoryNotificationRepository;
    use cache_invalidation::{CacheInvalidator, InMemoryCacheStore};
    use chrono::Utc;
    use event_schema::{PostLiked, PostUnliked};
    use uuid::Uuid;

    fn consumer() -> (PostLikedConsumer, Arc<InMemoryNotificationRepository>) {
        let repo = Arc::new(InMemoryNotificationRepository::new());
        let cache = Arc::new(CacheInvalidator::new(
            Arc::new(InMemoryCacheStore::new()),
            "notification-test",
        ));
        let service = Arc::new(NotificationService::new(repo.clone(), cache));
        (PostLikedConsumer::new(service), repo)
    }

    #[tokio::test]
    async fn test_like_creates_notification_for_owner() {
        let (consumer, repo) = consumer();
        let owner = Uuid::new_v4();
        let message = EventMessage::new(DomainEvent::PostLiked(PostLiked {
            post_id: Uuid::new_v4(),
            post_owner_id: owner,
            user_id: Uuid::new_v4(),
            likes_count: 3,
            liked_at: Utc::now(),
        }));

        consumer.handle(&message).await.unwrap();

        let rows = repo.all();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].recipient_id, owner);
    }

    #[tokio::test]
    async fn test_unlike_is_ignored() {
        let (consumer, repo) = consumer();
        let message = EventMessage::new(DomainEvent::PostUnliked(PostUnliked {
            post_id: Uuid::new_v4(),
            post_owner_id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            likes_count: 0,
            unliked_at: Utc::now(),
        }));

        consumer.handle(&message).await.unwrap();
        assert!(repo.all().is_empty());
    }

    #[tokio::test]
    async fn test_store_failure_is_reported() {
        let (consumer, repo) = consumer();
        repo.set_offline(true);
        let message = EventMessage::new(DomainEvent::PostLiked(PostLiked {
            post_id: Uuid::new_v4(),
            post_owner_id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            likes_count: 1,
            liked_at: Utc::now(),
        }));

        assert!(consumer.handle(&message).await.is_err());
    }
}
