/// Post service - post lifecycle, the create-post saga and read-through caching
use super::media_client::MediaClient;
use super::saga::{SagaRun, SagaState};
use crate::db::PostRepository;
use crate::error::{AppError, Result};
use crate::metrics;
use crate::models::{LikeToggle, MediaUpload, Post, PostPage, PostStatus, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
use cache_invalidation::{ttl, CacheInvalidator, CacheKey, InvalidationTarget};
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Longest accepted post body, in characters
pub const MAX_CONTENT_LEN: usize = 5000;

pub struct PostService {
    repo: Arc<dyn PostRepository>,
    media: Arc<dyn MediaClient>,
    cache: Arc<CacheInvalidator>,
}

impl PostService {
    pub fn new(
        repo: Arc<dyn PostRepository>,
        media: Arc<dyn MediaClient>,
        cache: Arc<CacheInvalidator>,
    ) -> Self {
        Self { repo, media, cache }
    }

    fn validate_content(content: &str) -> Result<()> {
        if content.trim().is_empty() {
            return Err(AppError::ValidationError("content must not be empty".into()));
        }
        if content.chars().count() > MAX_CONTENT_LEN {
            return Err(AppError::ValidationError(format!(
                "content exceeds {} characters",
                MAX_CONTENT_LEN
            )));
        }
        Ok(())
    }

    /// Create a post, uploading `files` to media-service first when present.
    ///
    /// A failed upload rolls the post back and surfaces as `Dependency`.
    pub async fn create_post(&self, user_id: Uuid, content: String, files: Vec<MediaUpload>) -> Result<Post> {
        Self::validate_content(&content)?;
        let (run, result) = self.run_create_saga(user_id, content, files).await;
        metrics::record_saga_outcome(&run.state().to_string().to_lowercase());
        let post = result?;

        self.cache
            .invalidate(&[InvalidationTarget::pattern(CacheKey::posts_pattern())])
            .await;

        info!(post_id = %post.id, user_id = %user_id, media = post.media_urls.len(), "Post created");
        Ok(post)
    }

    /// The saga itself, returning its final run alongside the outcome
    pub(crate) async fn run_create_saga(
        &self,
        user_id: Uuid,
        content: String,
        files: Vec<MediaUpload>,
    ) -> (SagaRun, Result<Post>) {
        if files.is_empty() {
            let post = Post::new(user_id, content, PostStatus::Published);
            let mut run = SagaRun::start(post.id);
            if let Err(e) = self.repo.insert_published(&post).await {
                return (run, Err(e));
            }
            // Entity row and its event commit together
            run.advance(SagaState::EntityCreated);
            run.advance(SagaState::EventPublishing);
            run.advance(SagaState::Done);
            return (run, Ok(post));
        }

        let post = Post::new(user_id, content, PostStatus::PendingMedia);
        let mut run = SagaRun::start(post.id);
        if let Err(e) = self.repo.insert_pending(&post).await {
            return (run, Err(e));
        }
        run.advance(SagaState::EntityCreated);

        run.advance(SagaState::RemoteStepPending);
        let urls = match self.media.ingest(post.id, files).await {
            Ok(urls) => urls,
            Err(e) => {
                warn!(post_id = %post.id, error = %e, "Media upload failed");
                run.advance(SagaState::RemoteStepFailed);
                self.compensate(&mut run).await;
                return (run, Err(AppError::Dependency(format!("media upload failed: {}", e))));
            }
        };
        run.advance(SagaState::RemoteStepDone);

        match self.repo.publish_with_media(post.id, &urls).await {
            Ok(Some(post)) => {
                run.advance(SagaState::EventPublishing);
                run.advance(SagaState::Done);
                (run, Ok(post))
            }
            Ok(None) => {
                run.advance(SagaState::RemoteStepFailed);
                self.compensate(&mut run).await;
                (run, Err(AppError::Internal("pending post disappeared".into())))
            }
            Err(e) => {
                error!(post_id = %post.id, error = %e, "Failed to publish post after media upload");
                run.advance(SagaState::RemoteStepFailed);
                self.compensate(&mut run).await;
                (run, Err(AppError::Dependency(format!("post publish failed: {}", e))))
            }
        }
    }

    /// Undo the pending post and release whatever media-service stored for
    /// it, including uploads that committed remotely before a timeout. A
    /// failure leaves an invisible orphan row.
    async fn compensate(&self, run: &mut SagaRun) {
        run.advance(SagaState::Compensating);
        match self.repo.delete_pending(run.post_id).await {
            Ok(_) => run.advance(SagaState::Compensated),
            Err(e) => {
                error!(
                    post_id = %run.post_id,
                    error = %e,
                    "Compensation failed, pending post left behind"
                );
                run.advance(SagaState::CompensationFailed);
            }
        }
    }

    /// Get a published post, read-through `post:<id>`
    pub async fn get_post(&self, post_id: Uuid) -> Result<Post> {
        let key = CacheKey::post(post_id);
        if let Some(post) = self.cache.get_json::<Post>(&key).await {
            return Ok(post);
        }

        let post = self
            .repo
            .find_published(post_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("post {}", post_id)))?;

        self.cache.set_json(&key, &post, ttl::POST).await;
        Ok(post)
    }

    /// Newest-first feed page, read-through `posts:cursor:<cursor>:<limit>`
    pub async fn list_posts(&self, cursor: Option<String>, limit: Option<u32>) -> Result<PostPage> {
        let limit = limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
        let after = cursor
            .as_deref()
            .map(|raw| {
                Uuid::parse_str(raw).map_err(|_| AppError::BadRequest(format!("invalid cursor: {}", raw)))
            })
            .transpose()?;

        let key = CacheKey::posts_cursor(cursor.as_deref(), limit);
        if let Some(page) = self.cache.get_json::<PostPage>(&key).await {
            return Ok(page);
        }

        let posts = self.repo.list_published(after, limit).await?;
        let next_cursor = if posts.len() == limit as usize {
            posts.last().map(|post| post.id.to_string())
        } else {
            None
        };
        let page = PostPage { posts, next_cursor };

        self.cache.set_json(&key, &page, ttl::POSTS_PAGE).await;
        Ok(page)
    }

    pub async fn update_post(&self, post_id: Uuid, user_id: Uuid, content: String) -> Result<Post> {
        Self::validate_content(&content)?;
        let post = self
            .repo
            .update_content(post_id, user_id, &content)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("post {}", post_id)))?;

        self.invalidate_post(post_id).await;
        Ok(post)
    }

    pub async fn delete_post(&self, post_id: Uuid, user_id: Uuid) -> Result<()> {
        self.repo
            .delete(post_id, user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("post {}", post_id)))?;

        self.invalidate_post(post_id).await;
        info!(post_id = %post_id, "Post deleted");
        Ok(())
    }

    pub async fn toggle_like(&self, post_id: Uuid, user_id: Uuid) -> Result<LikeToggle> {
        let toggle = self
            .repo
            .toggle_like(post_id, user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("post {}", post_id)))?;

        self.invalidate_post(post_id).await;
        Ok(toggle)
    }

    async fn invalidate_post(&self, post_id: Uuid) {
        self.cache
            .invalidate(&[
                InvalidationTarget::key(CacheKey::post(post_id)),
                InvalidationTarget::pattern(CacheKey::posts_pattern()),
            ])
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory::InMemoryPostRepository;
    use crate::services::media_client::StubMediaClient;
    use cache_invalidation::InMemoryCacheStore;
    use resilience::RetryConfig;
    use std::time::Duration;
    use transactional_outbox::InMemoryOutbox;

    struct Fixture {
        repo: Arc<InMemoryPostRepository>,
        media: Arc<StubMediaClient>,
        cache: Arc<InMemoryCacheStore>,
        service: PostService,
    }

    fn fixture(media: StubMediaClient) -> Fixture {
        let repo = Arc::new(InMemoryPostRepository::new(
            Arc::new(InMemoryOutbox::new()),
            RetryConfig::new(3, Duration::from_millis(1)),
        ));
        let media = Arc::new(media);
        let cache = Arc::new(InMemoryCacheStore::new());
        let service = PostService::new(
            repo.clone(),
            media.clone(),
            Arc::new(CacheInvalidator::new(cache.clone(), "content-service")),
        );
        Fixture {
            repo,
            media,
            cache,
            service,
        }
    }

    fn upload(name: &str) -> MediaUpload {
        MediaUpload {
            filename: name.to_string(),
            content_type: "image/png".to_string(),
            data: bytes::Bytes::from_static(b"\x89PNG"),
        }
    }

    fn event_types(repo: &InMemoryPostRepository) -> Vec<String> {
        repo.outbox()
            .events()
            .into_iter()
            .map(|e| e.event_type)
            .collect()
    }

    #[tokio::test]
    async fn test_text_post_skips_remote_step() {
        let f = fixture(StubMediaClient::succeeding());

        let (run, result) = f
            .service
            .run_create_saga(Uuid::new_v4(), "hello".into(), vec![])
            .await;

        let post = result.unwrap();
        assert_eq!(post.status, PostStatus::Published);
        assert_eq!(
            run.history(),
            &[
                SagaState::Init,
                SagaState::EntityCreated,
                SagaState::EventPublishing,
                SagaState::Done
            ]
        );
        assert!(f.media.calls().is_empty());
        assert_eq!(event_types(&f.repo), vec!["post.created"]);
    }

    #[tokio::test]
    async fn test_media_post_publishes_with_urls() {
        let f = fixture(StubMediaClient::succeeding());

        let post = f
            .service
            .create_post(Uuid::new_v4(), "pics".into(), vec![upload("a.png"), upload("b.png")])
            .await
            .unwrap();

        assert_eq!(post.media_urls.len(), 2);
        assert_eq!(post.status, PostStatus::Published);
        assert_eq!(f.media.calls(), vec![(post.id, 2)]);

        let events = f.repo.outbox().events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].payload["media_urls"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_media_failure_compensates_without_created_event() {
        let f = fixture(StubMediaClient::failing("disk full"));

        let (run, result) = f
            .service
            .run_create_saga(Uuid::new_v4(), "pics".into(), vec![upload("a.png")])
            .await;

        assert!(matches!(result, Err(AppError::Dependency(_))));
        assert_eq!(run.state(), SagaState::Compensated);
        assert_eq!(f.repo.post_count(), 0);
        // A timed-out upload may still have landed; media-service is told to drop it
        assert_eq!(event_types(&f.repo), vec!["post.discarded"]);
    }

    #[tokio::test]
    async fn test_publish_failure_after_upload_releases_media() {
        let f = fixture(StubMediaClient::succeeding());
        f.repo.fail_publishes(true);
        let user_id = Uuid::new_v4();

        let (run, result) = f
            .service
            .run_create_saga(user_id, "pics".into(), vec![upload("a.png"), upload("b.png")])
            .await;

        assert!(matches!(result, Err(AppError::Dependency(_))));
        assert_eq!(
            run.history(),
            &[
                SagaState::Init,
                SagaState::EntityCreated,
                SagaState::RemoteStepPending,
                SagaState::RemoteStepDone,
                SagaState::RemoteStepFailed,
                SagaState::Compensating,
                SagaState::Compensated
            ]
        );
        assert_eq!(f.media.calls(), vec![(run.post_id, 2)]);
        assert_eq!(f.repo.post_count(), 0);

        let events = f.repo.outbox().events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, "post.discarded");
        assert_eq!(events[0].aggregate_id, run.post_id);
        assert_eq!(events[0].payload["user_id"], serde_json::json!(user_id));
    }

    #[tokio::test]
    async fn test_failed_compensation_leaves_invisible_orphan() {
        let f = fixture(StubMediaClient::failing("timeout"));
        f.repo.fail_deletes(true);

        let (run, result) = f
            .service
            .run_create_saga(Uuid::new_v4(), "pics".into(), vec![upload("a.png")])
            .await;

        assert!(matches!(result, Err(AppError::Dependency(_))));
        assert_eq!(run.state(), SagaState::CompensationFailed);
        assert_eq!(f.repo.post_count(), 1);
        assert!(f.service.list_posts(None, None).await.unwrap().posts.is_empty());
        assert!(f.repo.outbox().events().is_empty());
    }

    #[tokio::test]
    async fn test_empty_content_rejected() {
        let f = fixture(StubMediaClient::succeeding());
        let err = f
            .service
            .create_post(Uuid::new_v4(), "   ".into(), vec![])
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
        assert_eq!(f.repo.post_count(), 0);
    }

    #[tokio::test]
    async fn test_get_post_reads_through_cache() {
        let f = fixture(StubMediaClient::succeeding());
        let post = f
            .service
            .create_post(Uuid::new_v4(), "hello".into(), vec![])
            .await
            .unwrap();

        f.service.get_post(post.id).await.unwrap();
        assert!(f.cache.contains(&CacheKey::post(post.id)));

        let missing = f.service.get_post(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(missing, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_writes_evict_post_and_pages() {
        let f = fixture(StubMediaClient::succeeding());
        let owner = Uuid::new_v4();
        let post = f
            .service
            .create_post(owner, "hello".into(), vec![])
            .await
            .unwrap();
        f.service.get_post(post.id).await.unwrap();
        f.service.list_posts(None, Some(10)).await.unwrap();
        assert!(f.cache.contains(&CacheKey::posts_cursor(None, 10)));

        f.service
            .update_post(post.id, owner, "edited".into())
            .await
            .unwrap();

        assert!(!f.cache.contains(&CacheKey::post(post.id)));
        assert!(!f.cache.contains(&CacheKey::posts_cursor(None, 10)));
        assert_eq!(f.service.get_post(post.id).await.unwrap().content, "edited");
    }

    #[tokio::test]
    async fn test_update_by_non_owner_is_not_found() {
        let f = fixture(StubMediaClient::succeeding());
        let post = f
            .service
            .create_post(Uuid::new_v4(), "hello".into(), vec![])
            .await
            .unwrap();

        let err = f
            .service
            .update_post(post.id, Uuid::new_v4(), "hijack".into())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
        assert_eq!(event_types(&f.repo), vec!["post.created"]);
    }

    #[tokio::test]
    async fn test_cache_outage_does_not_fail_writes() {
        let f = fixture(StubMediaClient::succeeding());
        let owner = Uuid::new_v4();
        let post = f
            .service
            .create_post(owner, "hello".into(), vec![])
            .await
            .unwrap();
        f.cache.set_offline(true);

        f.service.delete_post(post.id, owner).await.unwrap();
        assert_eq!(event_types(&f.repo), vec!["post.created", "post.deleted"]);
    }

    #[tokio::test]
    async fn test_double_toggle_is_net_no_op() {
        let f = fixture(StubMediaClient::succeeding());
        let post = f
            .service
            .create_post(Uuid::new_v4(), "hello".into(), vec![])
            .await
            .unwrap();
        let liker = Uuid::new_v4();
        f.repo.inject_conflicts(1);

        let first = f.service.toggle_like(post.id, liker).await.unwrap();
        let second = f.service.toggle_like(post.id, liker).await.unwrap();

        assert!(first.liked);
        assert!(!second.liked);
        assert_eq!(second.likes_count, 0);
        assert!(!f.repo.is_liked(post.id, liker));
        assert_eq!(
            event_types(&f.repo),
            vec!["post.created", "post.liked", "post.unliked"]
        );
    }

    #[tokio::test]
    async fn test_list_rejects_malformed_cursor() {
        let f = fixture(StubMediaClient::succeeding());
        let err = f
            .service
            .list_posts(Some("not-a-uuid".into()), None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }
}
