//! Search index storage
//!
//! One record per post id and per user id. Writes are upserts so replayed
//! events converge on the same record.
//!
//! Post events arrive on separate queues and may be handled out of order.
//! Removing a post leaves a tombstone that later creates and updates
//! respect, and content only moves forward in event time.

use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

mod postgres;
pub use postgres::PgSearchIndex;

#[cfg(any(test, feature = "test-support"))]
mod memory;
#[cfg(any(test, feature = "test-support"))]
pub use memory::InMemorySearchIndex;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct PostDocument {
    pub post_id: Uuid,
    pub user_id: Uuid,
    pub content: String,
    pub media_count: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct UserDocument {
    pub user_id: Uuid,
    pub username: String,
    pub display_name: Option<String>,
    pub bio: Option<String>,
}

#[async_trait]
pub trait SearchIndex: Send + Sync {
    /// Insert or refresh the post record. Content written by a newer update
    /// is kept. Returns `false` when the post was already removed.
    async fn upsert_post(&self, doc: &PostDocument) -> Result<bool>;

    /// Replace the text of a post if `at` is not older than the stored text,
    /// creating a placeholder record when the create has not arrived yet.
    /// Returns `false` when the post was already removed.
    async fn update_post_content(&self, post_id: Uuid, user_id: Uuid, content: &str, at: DateTime<Utc>) -> Result<bool>;

    /// Remove the record and tombstone the id
    async fn remove_post(&self, post_id: Uuid) -> Result<bool>;

    /// Drop tombstones older than `older_than`
    async fn purge_tombstones(&self, older_than: std::time::Duration) -> Result<u64>;

    async fn upsert_user(&self, doc: &UserDocument) -> Result<()>;

    async fn remove_user(&self, user_id: Uuid) -> Result<bool>;

    /// Case-insensitive substring match on content, newest first
    async fn search_posts(&self, query: &str, limit: u32) -> Result<Vec<PostDocument>>;

    /// Case-insensitive substring match on username or display name
    async fn search_users(&self, query: &str, limit: u32) -> Result<Vec<UserDocument>>;
}

/// Escape `%`, `_` and `\` for use inside an ILIKE pattern
pub fn like_pattern(query: &str) -> String {
    let mut escaped = String::with_capacity(query.len() + 2);
    escaped.push('%');
    for c in query.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}
