//! In-memory `PostRepository` with optimistic sessions, for tests and
//! local runs without PostgreSQL.

use super::post_repo::PostRepository;
use crate::error::{AppError, Result};
use crate::events;
use crate::models::{LikeToggle, Post, PostStatus};
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use resilience::{run_in_transaction, RetryConfig, SessionSource};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use transactional_outbox::{InMemoryOutbox, OutboxEvent};
use uuid::Uuid;

#[derive(Debug, Clone, Default)]
struct State {
    posts: HashMap<Uuid, Post>,
    likes: HashSet<(Uuid, Uuid)>,
    version: u64,
}

/// Private copy of the store plus the outbox rows staged alongside it.
/// Commit fails when another session committed first.
pub struct MemorySession {
    state: State,
    base_version: u64,
    staged: Vec<OutboxEvent>,
}

pub struct InMemoryPostRepository {
    state: Mutex<State>,
    outbox: Arc<InMemoryOutbox>,
    retry: RetryConfig,
    injected_conflicts: AtomicU32,
    fail_deletes: AtomicBool,
    fail_publishes: AtomicBool,
}

impl InMemoryPostRepository {
    pub fn new(outbox: Arc<InMemoryOutbox>, retry: RetryConfig) -> Self {
        Self {
            state: Mutex::new(State::default()),
            outbox,
            retry,
            injected_conflicts: AtomicU32::new(0),
            fail_deletes: AtomicBool::new(false),
            fail_publishes: AtomicBool::new(false),
        }
    }

    pub fn outbox(&self) -> &Arc<InMemoryOutbox> {
        &self.outbox
    }

    /// Make the next `count` commits fail with a write conflict
    pub fn inject_conflicts(&self, count: u32) {
        self.injected_conflicts.store(count, Ordering::SeqCst);
    }

    /// Make `delete_pending` fail, as when the store is down during compensation
    pub fn fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }

    /// Make `publish_with_media` fail, as when the store drops after the
    /// media upload
    pub fn fail_publishes(&self, fail: bool) {
        self.fail_publishes.store(fail, Ordering::SeqCst);
    }

    /// Any post by id, pending or published
    pub fn get(&self, post_id: Uuid) -> Option<Post> {
        self.state.lock().posts.get(&post_id).cloned()
    }

    pub fn post_count(&self) -> usize {
        self.state.lock().posts.len()
    }

    pub fn is_liked(&self, post_id: Uuid, user_id: Uuid) -> bool {
        self.state.lock().likes.contains(&(post_id, user_id))
    }

    /// Apply `change` atomically and enqueue the outbox rows it stages
    fn write<T>(
        &self,
        change: impl FnOnce(&mut State, &mut Vec<OutboxEvent>) -> Result<T>,
    ) -> Result<T> {
        let mut state = self.state.lock();
        let mut staged = Vec::new();
        let value = change(&mut state, &mut staged)?;
        state.version += 1;
        for event in staged {
            self.outbox.insert(event);
        }
        Ok(value)
    }

    fn published(state: &State, post_id: Uuid) -> Option<&Post> {
        state
            .posts
            .get(&post_id)
            .filter(|post| post.status == PostStatus::Published)
    }
}

#[async_trait]
impl SessionSource for InMemoryPostRepository {
    type Session = MemorySession;
    type Error = AppError;

    async fn begin(&self) -> Result<MemorySession> {
        let state = self.state.lock().clone();
        // Let concurrent sessions start from the same snapshot, as with a real round-trip
        tokio::task::yield_now().await;
        Ok(MemorySession {
            base_version: state.version,
            state,
            staged: Vec::new(),
        })
    }

    async fn commit(&self, session: MemorySession) -> Result<()> {
        let conflicted = self
            .injected_conflicts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if conflicted {
            return Err(AppError::TransientDatabaseError(
                "could not serialize access due to concurrent update".to_string(),
            ));
        }

        let mut state = self.state.lock();
        if state.version != session.base_version {
            return Err(AppError::TransientDatabaseError(
                "concurrent write detected".to_string(),
            ));
        }

        *state = session.state;
        state.version = session.base_version + 1;
        for event in session.staged {
            self.outbox.insert(event);
        }
        Ok(())
    }

    async fn abort(&self, _session: MemorySession) -> Result<()> {
        Ok(())
    }
}

#[async_trait]
impl PostRepository for InMemoryPostRepository {
    async fn insert_published(&self, post: &Post) -> Result<()> {
        self.write(|state, staged| {
            staged.push(events::outbox_row(&events::post_created(post))?);
            state.posts.insert(post.id, post.clone());
            Ok(())
        })
    }

    async fn insert_pending(&self, post: &Post) -> Result<()> {
        self.write(|state, _| {
            state.posts.insert(post.id, post.clone());
            Ok(())
        })
    }

    async fn publish_with_media(&self, post_id: Uuid, media_urls: &[String]) -> Result<Option<Post>> {
        if self.fail_publishes.load(Ordering::SeqCst) {
            return Err(AppError::DatabaseError("connection reset".to_string()));
        }
        self.write(|state, staged| {
            let Some(post) = state
                .posts
                .get_mut(&post_id)
                .filter(|post| post.status == PostStatus::PendingMedia)
            else {
                return Ok(None);
            };
            post.media_urls = media_urls.to_vec();
            post.status = PostStatus::Published;
            post.updated_at = Utc::now();
            let post = post.clone();
            staged.push(events::outbox_row(&events::post_created(&post))?);
            Ok(Some(post))
        })
    }

    async fn delete_pending(&self, post_id: Uuid) -> Result<bool> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(AppError::DatabaseError("connection refused".to_string()));
        }
        self.write(|state, staged| {
            let pending = state
                .posts
                .get(&post_id)
                .is_some_and(|post| post.status == PostStatus::PendingMedia);
            if !pending {
                return Ok(false);
            }
            if let Some(post) = state.posts.remove(&post_id) {
                staged.push(events::outbox_row(&events::post_discarded(&post))?);
            }
            Ok(true)
        })
    }

    async fn find_published(&self, post_id: Uuid) -> Result<Option<Post>> {
        let state = self.state.lock();
        Ok(Self::published(&state, post_id).cloned())
    }

    async fn list_published(&self, after: Option<Uuid>, limit: u32) -> Result<Vec<Post>> {
        let state = self.state.lock();
        let mut posts: Vec<&Post> = state
            .posts
            .values()
            .filter(|post| post.status == PostStatus::Published)
            .collect();
        posts.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));

        let start = match after {
            None => 0,
            Some(cursor) => match state.posts.get(&cursor) {
                Some(anchor) => posts
                    .iter()
                    .position(|post| (post.created_at, post.id) < (anchor.created_at, anchor.id))
                    .unwrap_or(posts.len()),
                None => posts.len(),
            },
        };

        Ok(posts
            .into_iter()
            .skip(start)
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn update_content(&self, post_id: Uuid, user_id: Uuid, content: &str) -> Result<Option<Post>> {
        self.write(|state, staged| {
            let Some(post) = state
                .posts
                .get_mut(&post_id)
                .filter(|post| post.status == PostStatus::Published && post.user_id == user_id)
            else {
                return Ok(None);
            };
            post.content = content.to_string();
            post.updated_at = Utc::now();
            let post = post.clone();
            staged.push(events::outbox_row(&events::post_updated(&post))?);
            Ok(Some(post))
        })
    }

    async fn delete(&self, post_id: Uuid, user_id: Uuid) -> Result<Option<Post>> {
        self.write(|state, staged| {
            let owned = Self::published(state, post_id).is_some_and(|post| post.user_id == user_id);
            if !owned {
                return Ok(None);
            }
            let post = state.posts.remove(&post_id);
            state.likes.retain(|(liked_post, _)| *liked_post != post_id);
            if let Some(post) = &post {
                staged.push(events::outbox_row(&events::post_deleted(post))?);
            }
            Ok(post)
        })
    }

    async fn toggle_like(&self, post_id: Uuid, user_id: Uuid) -> Result<Option<LikeToggle>> {
        run_in_transaction(self, &self.retry, |session| {
            Box::pin(async move {
                let Some(post) = session.state.posts.get_mut(&post_id) else {
                    return Ok(None);
                };
                if post.status != PostStatus::Published {
                    return Ok(None);
                }

                let unliked = session.state.likes.remove(&(post_id, user_id));
                if !unliked {
                    session.state.likes.insert((post_id, user_id));
                }
                post.likes_count = if unliked {
                    (post.likes_count - 1).max(0)
                } else {
                    post.likes_count + 1
                };

                let toggle = LikeToggle {
                    post_id,
                    liked: !unliked,
                    likes_count: post.likes_count,
                };
                let message = events::like_toggled(&toggle, post.user_id, user_id);
                session.staged.push(events::outbox_row(&message)?);
                Ok(Some(toggle))
            })
        })
        .await
    }
}
