use super::{PostDocument, SearchIndex, UserDocument};
use crate::error::{AppError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use uuid::Uuid;

/// Process-local index with an outage switch
#[derive(Default)]
pub struct InMemorySearchIndex {
    posts: Mutex<PostTable>,
    users: Mutex<HashMap<Uuid, UserDocument>>,
    offline: AtomicBool,
}

#[derive(Default)]
struct PostTable {
    rows: HashMap<Uuid, PostRow>,
    deleted: HashMap<Uuid, DateTime<Utc>>,
}

struct PostRow {
    doc: PostDocument,
    content_at: DateTime<Utc>,
}

impl InMemorySearchIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn post(&self, post_id: Uuid) -> Option<PostDocument> {
        self.posts.lock().rows.get(&post_id).map(|row| row.doc.clone())
    }

    pub fn post_count(&self) -> usize {
        self.posts.lock().rows.len()
    }

    pub fn is_tombstoned(&self, post_id: Uuid) -> bool {
        self.posts.lock().deleted.contains_key(&post_id)
    }

    pub fn user(&self, user_id: Uuid) -> Option<UserDocument> {
        self.users.lock().get(&user_id).cloned()
    }

    fn check(&self) -> Result<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(AppError::DatabaseError("index unavailable".into()));
        }
        Ok(())
    }
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

#[async_trait]
impl SearchIndex for InMemorySearchIndex {
    async fn upsert_post(&self, doc: &PostDocument) -> Result<bool> {
        self.check()?;
        let mut posts = self.posts.lock();
        if posts.deleted.contains_key(&doc.post_id) {
            return Ok(false);
        }
        match posts.rows.get_mut(&doc.post_id) {
            Some(row) => {
                row.doc.user_id = doc.user_id;
                row.doc.media_count = doc.media_count;
                row.doc.created_at = doc.created_at;
                if doc.created_at >= row.content_at {
                    row.doc.content = doc.content.clone();
                    row.content_at = doc.created_at;
                }
            }
            None => {
                posts.rows.insert(
                    doc.post_id,
                    PostRow {
                        doc: doc.clone(),
                        content_at: doc.created_at,
                    },
                );
            }
        }
        Ok(true)
    }

    async fn update_post_content(&self, post_id: Uuid, user_id: Uuid, content: &str, at: DateTime<Utc>) -> Result<bool> {
        self.check()?;
        let mut posts = self.posts.lock();
        if posts.deleted.contains_key(&post_id) {
            return Ok(false);
        }
        posts
            .rows
            .entry(post_id)
            .and_modify(|row| {
                if at >= row.content_at {
                    row.doc.content = content.to_string();
                    row.content_at = at;
                }
            })
            .or_insert_with(|| PostRow {
                doc: PostDocument {
                    post_id,
                    user_id,
                    content: content.to_string(),
                    media_count: 0,
                    created_at: at,
                },
                content_at: at,
            });
        Ok(true)
    }

    async fn remove_post(&self, post_id: Uuid) -> Result<bool> {
        self.check()?;
        let mut posts = self.posts.lock();
        posts.deleted.entry(post_id).or_insert_with(Utc::now);
        Ok(posts.rows.remove(&post_id).is_some())
    }

    async fn purge_tombstones(&self, older_than: Duration) -> Result<u64> {
        self.check()?;
        let cutoff = Utc::now() - chrono::Duration::from_std(older_than).unwrap_or(chrono::Duration::zero());
        let mut posts = self.posts.lock();
        let before = posts.deleted.len();
        posts.deleted.retain(|_, deleted_at| *deleted_at >= cutoff);
        Ok((before - posts.deleted.len()) as u64)
    }

    async fn upsert_user(&self, doc: &UserDocument) -> Result<()> {
        self.check()?;
        self.users.lock().insert(doc.user_id, doc.clone());
        Ok(())
    }

    async fn remove_user(&self, user_id: Uuid) -> Result<bool> {
        self.check()?;
        Ok(self.users.lock().remove(&user_id).is_some())
    }

    async fn search_posts(&self, query: &str, limit: u32) -> Result<Vec<PostDocument>> {
        self.check()?;
        let mut hits: Vec<PostDocument> = self
            .posts
            .lock()
            .rows
            .values()
            .map(|row| &row.doc)
            .filter(|doc| contains_ci(&doc.content, query))
            .cloned()
            .collect();
        hits.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        hits.truncate(limit as usize);
        Ok(hits)
    }

    async fn search_users(&self, query: &str, limit: u32) -> Result<Vec<UserDocument>> {
        self.check()?;
        let mut hits: Vec<UserDocument> = self
            .users
            .lock()
            .values()
            .filter(|doc| {
                contains_ci(&doc.username, query)
                    || doc
                        .display_name
                        .as_deref()
                        .is_some_and(|name| contains_ci(name, query))
            })
            .cloned()
            .collect();
        hits.sort_by(|a, b| a.username.cmp(&b.username));
        hits.truncate(limit as usize);
        Ok(hits)
    }
}
