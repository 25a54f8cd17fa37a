//! In-memory `UserRepository` with optimistic sessions for the counter path

use super::user_repo::UserRepository;
use crate::error::{AppError, Result};
use crate::events;
use crate::models::{UpdateUserRequest, User};
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use resilience::{run_in_transaction, RetryConfig, SessionSource};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use transactional_outbox::{InMemoryOutbox, OutboxEvent};
use uuid::Uuid;

#[derive(Debug, Clone, Default)]
struct State {
    users: HashMap<Uuid, User>,
    version: u64,
}

pub struct MemorySession {
    state: State,
    base_version: u64,
}

pub struct InMemoryUserRepository {
    state: Mutex<State>,
    outbox: Arc<InMemoryOutbox>,
    retry: RetryConfig,
    injected_conflicts: AtomicU32,
}

impl InMemoryUserRepository {
    pub fn new(outbox: Arc<InMemoryOutbox>, retry: RetryConfig) -> Self {
        Self {
            state: Mutex::new(State::default()),
            outbox,
            retry,
            injected_conflicts: AtomicU32::new(0),
        }
    }

    pub fn outbox(&self) -> &Arc<InMemoryOutbox> {
        &self.outbox
    }

    /// Make the next `count` commits fail with a serialization conflict
    pub fn inject_conflicts(&self, count: u32) {
        self.injected_conflicts.store(count, Ordering::SeqCst);
    }

    pub fn get(&self, user_id: Uuid) -> Option<User> {
        self.state.lock().users.get(&user_id).cloned()
    }

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
}

#[async_trait]
impl SessionSource for InMemoryUserRepository {
    type Session = MemorySession;
    type Error = AppError;

    async fn begin(&self) -> Result<MemorySession> {
        let state = self.state.lock().clone();
        Ok(MemorySession {
            base_version: state.version,
            state,
        })
    }

    async fn commit(&self, session: MemorySession) -> Result<()> {
        let conflicted = self
            .injected_conflicts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        let mut state = self.state.lock();
        if conflicted || state.version != session.base_version {
            return Err(AppError::TransientDatabaseError(
                "could not serialize access due to read/write dependencies".to_string(),
            ));
        }
        *state = session.state;
        state.version = session.base_version + 1;
        Ok(())
    }

    async fn abort(&self, _session: MemorySession) -> Result<()> {
        Ok(())
    }
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn create(&self, user: &User) -> Result<()> {
        self.write(|state, staged| {
            let taken = state.users.values().any(|existing| {
                existing.username == user.username || existing.email == user.email
            });
            if taken {
                return Err(AppError::Conflict(
                    "username or email already in use".to_string(),
                ));
            }
            staged.push(events::outbox_row(&events::user_created(user))?);
            state.users.insert(user.id, user.clone());
            Ok(())
        })
    }

    async fn find(&self, user_id: Uuid) -> Result<Option<User>> {
        Ok(self.get(user_id))
    }

    async fn update(&self, user_id: Uuid, update: &UpdateUserRequest) -> Result<Option<User>> {
        self.write(|state, staged| {
            let Some(user) = state.users.get_mut(&user_id) else {
                return Ok(None);
            };
            user.apply(update);
            let user = user.clone();
            staged.push(events::outbox_row(&events::user_updated(&user))?);
            Ok(Some(user))
        })
    }

    async fn delete(&self, user_id: Uuid) -> Result<Option<User>> {
        self.write(|state, staged| {
            let Some(mut user) = state.users.remove(&user_id) else {
                return Ok(None);
            };
            user.updated_at = Utc::now();
            staged.push(events::outbox_row(&events::user_deleted(&user))?);
            Ok(Some(user))
        })
    }

    async fn adjust_posts_count(&self, user_id: Uuid, delta: i64) -> Result<Option<i64>> {
        run_in_transaction(self, &self.retry, |session| {
            Box::pin(async move {
                let Some(user) = session.state.users.get_mut(&user_id) else {
                    return Ok(None);
                };
                user.posts_count = (user.posts_count + delta).max(0);
                Ok(Some(user.posts_count))
            })
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn repo() -> InMemoryUserRepository {
        InMemoryUserRepository::new(
            Arc::new(InMemoryOutbox::new()),
            RetryConfig::new(3, Duration::from_millis(1)),
        )
    }

    #[tokio::test]
    async fn test_duplicate_username_conflicts_without_event() {
        let repo = repo();
        repo.create(&User::new("alice".into(), "a@example.com".into(), None))
            .await
            .unwrap();

        let err = repo
            .create(&User::new("alice".into(), "other@example.com".into(), None))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
        assert_eq!(repo.outbox().events().len(), 1);
    }

    #[tokio::test]
    async fn test_counter_retries_conflict_and_floors_at_zero() {
        let repo = repo();
        let user = User::new("bob".into(), "b@example.com".into(), None);
        repo.create(&user).await.unwrap();

        repo.inject_conflicts(2);
        assert_eq!(repo.adjust_posts_count(user.id, 1).await.unwrap(), Some(1));
        assert_eq!(repo.adjust_posts_count(user.id, -1).await.unwrap(), Some(0));
        assert_eq!(repo.adjust_posts_count(user.id, -1).await.unwrap(), Some(0));
        assert_eq!(repo.adjust_posts_count(Uuid::new_v4(), 1).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_exhausted_retries_surface_transient_error() {
        let repo = repo();
        let user = User::new("carol".into(), "c@example.com".into(), None);
        repo.create(&user).await.unwrap();

        repo.inject_conflicts(10);
        let err = repo.adjust_posts_count(user.id, 1).await.unwrap_err();
        assert!(matches!(err, AppError::TransientDatabaseError(_)));
        assert_eq!(repo.get(user.id).unwrap().posts_count, 0);
    }

    #[tokio::test]
    async fn test_deleted_user_is_gone_and_announced() {
        let repo = repo();
        let user = User::new("dave".into(), "d@example.com".into(), None);
        repo.create(&user).await.unwrap();

        assert!(repo.delete(user.id).await.unwrap().is_some());
        assert!(repo.find(user.id).await.unwrap().is_none());
        assert!(repo.delete(user.id).await.unwrap().is_none());

        let types: Vec<_> = repo.outbox().events().into_iter().map(|e| e.event_type).collect();
        assert_eq!(types, vec!["user.created", "user.deleted"]);
    }
}
