/// User service - profile lifecycle and the denormalized posts counter
use crate::db::UserRepository;
use crate::error::{AppError, Result};
use crate::metrics;
use crate::models::{CreateUserRequest, UpdateUserRequest, User};
use cache_invalidation::{ttl, CacheInvalidator, CacheKey, InvalidationTarget};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

pub struct UserService {
    repo: Arc<dyn UserRepository>,
    cache: Arc<CacheInvalidator>,
}

impl UserService {
    pub fn new(repo: Arc<dyn UserRepository>, cache: Arc<CacheInvalidator>) -> Self {
        Self { repo, cache }
    }

    pub async fn create_user(&self, req: CreateUserRequest) -> Result<User> {
        req.validate().map_err(AppError::ValidationError)?;
        let user = User::new(req.username, req.email.trim().to_string(), req.display_name);
        self.repo.create(&user).await?;
        info!(user_id = %user.id, username = %user.username, "User created");
        Ok(user)
    }

    /// Read-through `user_profile:<id>`
    pub async fn get_user(&self, user_id: Uuid) -> Result<User> {
        let key = CacheKey::user_profile(user_id);
        if let Some(user) = self.cache.get_json::<User>(&key).await {
            return Ok(user);
        }

        let user = self
            .repo
            .find(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("user {}", user_id)))?;
        self.cache.set_json(&key, &user, ttl::USER_PROFILE).await;
        Ok(user)
    }

    pub async fn update_user(&self, user_id: Uuid, req: UpdateUserRequest) -> Result<User> {
        req.validate().map_err(AppError::ValidationError)?;
        let user = self
            .repo
            .update(user_id, &req)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("user {}", user_id)))?;
        self.evict_profile(user_id).await;
        Ok(user)
    }

    pub async fn delete_user(&self, user_id: Uuid) -> Result<()> {
        self.repo
            .delete(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("user {}", user_id)))?;
        self.evict_profile(user_id).await;
        info!(user_id = %user_id, "User deleted");
        Ok(())
    }

    /// Apply a post created (+1) or deleted (-1) to the author's counter.
    /// Unknown authors are ignored.
    pub async fn apply_post_delta(&self, user_id: Uuid, delta: i64) -> Result<Option<i64>> {
        let count = self.repo.adjust_posts_count(user_id, delta).await?;
        match count {
            Some(count) => {
                metrics::record_counter_update(if delta >= 0 { "increment" } else { "decrement" });
                self.evict_profile(user_id).await;
                debug!(user_id = %user_id, posts_count = count, "Posts counter updated");
            }
            None => debug!(user_id = %user_id, "Posts counter skipped for unknown user"),
        }
        Ok(count)
    }

    async fn evict_profile(&self, user_id: Uuid) {
        self.cache
            .invalidate(&[InvalidationTarget::key(CacheKey::user_profile(user_id))])
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory::InMemoryUserRepository;
    use cache_invalidation::InMemoryCacheStore;
    use resilience::RetryConfig;
    use std::time::Duration;
    use transactional_outbox::InMemoryOutbox;

    fn service() -> (UserService, Arc<InMemoryUserRepository>, InMemoryCacheStore) {
        let repo = Arc::new(InMemoryUserRepository::new(
            Arc::new(InMemoryOutbox::new()),
            RetryConfig::new(3, Duration::from_millis(1)),
        ));
        let store = InMemoryCacheStore::new();
        let cache = Arc::new(CacheInvalidator::new(Arc::new(store.clone()), "user-test"));
        (UserService::new(repo.clone(), cache), repo, store)
    }

    fn create(username: &str) -> CreateUserRequest {
        CreateUserRequest {
            username: username.into(),
            email: format!("{}@example.com", username),
            display_name: None,
        }
    }

    #[tokio::test]
    async fn test_profile_is_cached_and_evicted_on_update() {
        let (service, _, store) = service();
        let user = service.create_user(create("alice")).await.unwrap();

        service.get_user(user.id).await.unwrap();
        assert!(store.contains(&CacheKey::user_profile(user.id)));

        let updated = service
            .update_user(
                user.id,
                UpdateUserRequest {
                    bio: Some("hello".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.bio.as_deref(), Some("hello"));
        assert!(!store.contains(&CacheKey::user_profile(user.id)));
        assert_eq!(service.get_user(user.id).await.unwrap().bio.as_deref(), Some("hello"));
    }

    #[tokio::test]
    async fn test_posts_delta_evicts_profile() {
        let (service, _, store) = service();
        let user = service.create_user(create("bob")).await.unwrap();
        service.get_user(user.id).await.unwrap();

        assert_eq!(service.apply_post_delta(user.id, 1).await.unwrap(), Some(1));
        assert!(!store.contains(&CacheKey::user_profile(user.id)));
        assert_eq!(service.get_user(user.id).await.unwrap().posts_count, 1);
    }

    #[tokio::test]
    async fn test_invalid_and_missing_users() {
        let (service, _, _) = service();
        let err = service.create_user(create("x")).await.unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));

        let err = service.get_user(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        let err = service.delete_user(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_cache_outage_does_not_fail_write() {
        let (service, repo, store) = service();
        let user = service.create_user(create("carol")).await.unwrap();
        store.set_offline(true);

        service.delete_user(user.id).await.unwrap();
        assert!(repo.get(user.id).is_none());
    }
}
