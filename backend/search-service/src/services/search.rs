/// Search reads over the index, cached per query and limit
use crate::error::{AppError, Result};
use crate::index::{PostDocument, SearchIndex, UserDocument};
use cache_invalidation::{ttl, CacheInvalidator, CacheKey};
use std::sync::Arc;

pub const DEFAULT_LIMIT: u32 = 20;
pub const MAX_LIMIT: u32 = 100;

pub struct SearchService {
    index: Arc<dyn SearchIndex>,
    cache: Arc<CacheInvalidator>,
}

impl SearchService {
    pub fn new(index: Arc<dyn SearchIndex>, cache: Arc<CacheInvalidator>) -> Self {
        Self { index, cache }
    }

    fn normalize(query: &str, limit: Option<u32>) -> Result<(String, u32)> {
        let query = query.trim();
        if query.is_empty() {
            return Err(AppError::ValidationError("q must not be empty".into()));
        }
        let limit = limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
        Ok((query.to_lowercase(), limit))
    }

    pub async fn search_posts(&self, query: &str, limit: Option<u32>) -> Result<Vec<PostDocument>> {
        let (query, limit) = Self::normalize(query, limit)?;
        let key = CacheKey::posts_search(&query, limit);
        if let Some(hits) = self.cache.get_json::<Vec<PostDocument>>(&key).await {
            return Ok(hits);
        }

        let hits = self.index.search_posts(&query, limit).await?;
        self.cache.set_json(&key, &hits, ttl::SEARCH).await;
        Ok(hits)
    }

    pub async fn search_users(&self, query: &str, limit: Option<u32>) -> Result<Vec<UserDocument>> {
        let (query, limit) = Self::normalize(query, limit)?;
        let key = CacheKey::users_search(&query, limit);
        if let Some(hits) = self.cache.get_json::<Vec<UserDocument>>(&key).await {
            return Ok(hits);
        }

        let hits = self.index.search_users(&query, limit).await?;
        self.cache.set_json(&key, &hits, ttl::SEARCH).await;
        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::InMemorySearchIndex;
    use cache_invalidation::InMemoryCacheStore;
    use chrono::{Duration, Utc};
    use uuid::Uuid;

    fn service() -> (SearchService, Arc<InMemorySearchIndex>, InMemoryCacheStore) {
        let index = Arc::new(InMemorySearchIndex::new());
        let store = InMemoryCacheStore::new();
        let cache = Arc::new(CacheInvalidator::new(Arc::new(store.clone()), "search-test"));
        (SearchService::new(index.clone(), cache), index, store)
    }

    fn post(content: &str, age_minutes: i64) -> PostDocument {
        PostDocument {
            post_id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            content: content.to_string(),
            media_count: 0,
            created_at: Utc::now() - Duration::minutes(age_minutes),
        }
    }

    #[tokio::test]
    async fn test_empty_query_rejected() {
        let (service, _, _) = service();
        let err = service.search_posts("   ", None).await.unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
    }

    #[tokio::test]
    async fn test_posts_newest_first_and_cached() {
        let (service, index, store) = service();
        let older = post("Rust tips", 10);
        let newer = post("more rust", 1);
        index.upsert_post(&older).await.unwrap();
        index.upsert_post(&newer).await.unwrap();
        index.upsert_post(&post("golang", 0)).await.unwrap();

        let hits = service.search_posts("RUST", None).await.unwrap();
        assert_eq!(hits, vec![newer.clone(), older.clone()]);
        assert!(store.contains(&CacheKey::posts_search("rust", DEFAULT_LIMIT)));

        // served from cache until invalidated
        index.remove_post(newer.post_id).await.unwrap();
        let hits = service.search_posts("rust", None).await.unwrap();
        assert_eq!(hits.len(), 2);
    }

    #[tokio::test]
    async fn test_limit_is_clamped() {
        let (service, index, store) = service();
        for i in 0..3 {
            index.upsert_post(&post(&format!("note {}", i), i)).await.unwrap();
        }

        let hits = service.search_posts("note", Some(1)).await.unwrap();
        assert_eq!(hits.len(), 1);

        service.search_posts("note", Some(10_000)).await.unwrap();
        assert!(store.contains(&CacheKey::posts_search("note", MAX_LIMIT)));
    }

    #[tokio::test]
    async fn test_users_match_display_name() {
        let (service, index, _) = service();
        index
            .upsert_user(&UserDocument {
                user_id: Uuid::new_v4(),
                username: "bob".into(),
                display_name: Some("Robert Paulson".into()),
                bio: None,
            })
            .await
            .unwrap();

        let hits = service.search_users("paulson", None).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].username, "bob");
    }

    #[tokio::test]
    async fn test_index_failure_surfaces() {
        let (service, index, _) = service();
        index.set_offline(true);
        let err = service.search_users("bob", None).await.unwrap_err();
        assert!(matches!(err, AppError::DatabaseError(_)));
    }
}
