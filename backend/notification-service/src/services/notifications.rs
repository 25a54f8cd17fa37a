use crate::db::NotificationRepository;
use crate::error::{AppError, Result};
use crate::metrics;
use crate::models::{Notification, PAGE_SIZE};
use cache_invalidation::{ttl, CacheInvalidator, CacheKey, InvalidationTarget};
use event_schema::PostLiked;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

pub struct NotificationService {
    repo: Arc<dyn NotificationRepository>,
    cache: Arc<CacheInvalidator>,
}

impl NotificationService {
    pub fn new(repo: Arc<dyn NotificationRepository>, cache: Arc<CacheInvalidator>) -> Self {
        Self { repo, cache }
    }

    /// Notify the post owner about a like. Self-likes produce nothing.
    pub async fn notify_like(&self, event_id: Uuid, event: &PostLiked) -> Result<Option<Notification>> {
        if event.user_id == event.post_owner_id {
            debug!(post_id = %event.post_id, "Skipping self-like notification");
            return Ok(None);
        }

        let notification = Notification::for_like(
            event_id,
            event.post_owner_id,
            event.user_id,
            event.post_id,
            event.liked_at,
        );
        if self.repo.insert(&notification).await? {
            metrics::record_created(notification.notification_type.as_str());
            info!(
                notification_id = %notification.id,
                recipient_id = %notification.recipient_id,
                post_id = %event.post_id,
                "Like notification created"
            );
        }

        self.evict(event.post_owner_id).await;
        Ok(Some(notification))
    }

    /// Newest notifications of `user_id`, read-through `notifications:<user_id>`
    pub async fn list(&self, user_id: Uuid, limit: Option<u32>) -> Result<Vec<Notification>> {
        let limit = limit.unwrap_or(PAGE_SIZE).clamp(1, PAGE_SIZE) as usize;
        let key = CacheKey::notifications(user_id);

        let mut page = match self.cache.get_json::<Vec<Notification>>(&key).await {
            Some(page) => page,
            None => {
                let page = self.repo.list_for_recipient(user_id, PAGE_SIZE).await?;
                self.cache.set_json(&key, &page, ttl::NOTIFICATIONS).await;
                page
            }
        };
        page.truncate(limit);
        Ok(page)
    }

    pub async fn mark_read(&self, user_id: Uuid, notification_id: Uuid) -> Result<()> {
        if !self.repo.mark_read(notification_id, user_id).await? {
            return Err(AppError::NotFound(format!("notification {}", notification_id)));
        }
        self.evict(user_id).await;
        Ok(())
    }

    async fn evict(&self, user_id: Uuid) {
        self.cache
            .invalidate(&[InvalidationTarget::key(CacheKey::notifications(user_id))])
            .await;
    }
}
