use crate::services::UserService;
use anyhow::Context;
use async_trait::async_trait;
use event_bus::EventHandler;
use event_schema::{DomainEvent, EventMessage};
use std::sync::Arc;
use tracing::debug;

/// Keeps `users.posts_count` in step with `post.created` / `post.deleted`
pub struct PostCounterConsumer {
    service: Arc<UserService>,
}

impl PostCounterConsumer {
    pub const NAME: &'static str = "user.posts_count";

    pub fn new(service: Arc<UserService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl EventHandler for PostCounterConsumer {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn handle(&self, message: &EventMessage) -> anyhow::Result<()> {
        let (user_id, delta) = match &message.event {
            DomainEvent::PostCreated(event) => (event.user_id, 1),
            DomainEvent::PostDeleted(event) => (event.user_id, -1),
            _ => {
                debug!(routing_key = %message.routing_key(), "Ignoring unrelated event");
                return Ok(());
            }
        };

        self.service
            .apply_post_delta(user_id, delta)
            .await
            .with_context(|| format!("updating posts_count of user {}", user_id))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory::InMemoryUserRepository;
    use crate::models::CreateUserRequest;
    use cache_invalidation::{CacheInvalidator, InMemoryCacheStore};
    use chrono::Utc;
    use event_schema::{PostCreated, PostDeleted};
    use resilience::RetryConfig;
    use std::time::Duration;
    use transactional_outbox::InMemoryOutbox;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_created_and_deleted_posts_move_counter() {
        let repo = Arc::new(InMemoryUserRepository::new(
            Arc::new(InMemoryOutbox::new()),
            RetryConfig::new(3, Duration::from_millis(1)),
        ));
        let cache = Arc::new(CacheInvalidator::new(
            Arc::new(InMemoryCacheStore::new()),
            "user-test",
        ));
        let service = Arc::new(UserService::new(repo.clone(), cache));
        let user = service
            .create_user(CreateUserRequest {
                username: "erin".into(),
                email: "erin@example.com".into(),
                display_name: None,
            })
            .await
            .unwrap();
        let consumer = PostCounterConsumer::new(service);
        let post_id = Uuid::new_v4();

        repo.inject_conflicts(1);
        consumer
            .handle(&EventMessage::new(DomainEvent::PostCreated(PostCreated {
                post_id,
                user_id: user.id,
                content: "hi".into(),
                media_urls: Vec::new(),
                created_at: Utc::now(),
            })))
            .await
            .unwrap();
        assert_eq!(repo.get(user.id).unwrap().posts_count, 1);

        consumer
            .handle(&EventMessage::new(DomainEvent::PostDeleted(PostDeleted {
                post_id,
                user_id: user.id,
                deleted_at: Utc::now(),
            })))
            .await
            .unwrap();
        assert_eq!(repo.get(user.id).unwrap().posts_count, 0);
    }
}
