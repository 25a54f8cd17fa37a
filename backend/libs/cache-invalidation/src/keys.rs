//! Cache key namespace shared by all services
//!
//! Keys are plain `prefix:identifier` strings; list and search results use
//! a prefix that pattern invalidation can match with a single glob.

use uuid::Uuid;

/// TTL values (seconds)
pub mod ttl {
    pub const POST: u64 = 3600; // 1 hour
    pub const POSTS_PAGE: u64 = 300; // 5 minutes
    pub const USER_PROFILE: u64 = 3600; // 1 hour
    pub const SEARCH: u64 = 180; // 3 minutes
    pub const NOTIFICATIONS: u64 = 300; // 5 minutes
}

/// Cache key builder
pub struct CacheKey;

impl CacheKey {
    // ============= Content =============

    /// Format: post:{post_id}
    pub fn post(post_id: Uuid) -> String {
        format!("post:{}", post_id)
    }

    /// Cursor-paginated post list.
    /// Format: posts:cursor:{cursor}:{limit}
    pub fn posts_cursor(cursor: Option<&str>, limit: u32) -> String {
        format!("posts:cursor:{}:{}", cursor.unwrap_or("start"), limit)
    }

    /// Every cached post list page
    pub fn posts_pattern() -> &'static str {
        "posts:*"
    }

    // ============= Users =============

    /// Format: user_profile:{user_id}
    pub fn user_profile(user_id: Uuid) -> String {
        format!("user_profile:{}", user_id)
    }

    // ============= Search =============

    /// Format: posts-search:{query}:{limit}
    pub fn posts_search(query: &str, limit: u32) -> String {
        format!("posts-search:{}:{}", normalize_query(query), limit)
    }

    pub fn posts_search_pattern() -> &'static str {
        "posts-search:*"
    }

    /// Format: users-search:{query}:{limit}
    pub fn users_search(query: &str, limit: u32) -> String {
        format!("users-search:{}:{}", normalize_query(query), limit)
    }

    pub fn users_search_pattern() -> &'static str {
        "users-search:*"
    }

    // ============= Notifications =============

    /// Format: notifications:{user_id}
    pub fn notifications(user_id: Uuid) -> String {
        format!("notifications:{}", user_id)
    }
}

/// Lowercase and collapse whitespace; glob metacharacters are replaced so a
/// query can never widen a pattern match.
fn normalize_query(query: &str) -> String {
    query
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
        .chars()
        .map(|c| match c {
            '*' | '?' | '[' | ']' => '_',
            other => other,
        })
        .collect()
}
