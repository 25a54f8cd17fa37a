use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Routing keys understood by the event bus.
pub mod routing_keys {
    pub const POST_CREATED: &str = "post.created";
    pub const POST_UPDATED: &str = "post.updated";
    pub const POST_DELETED: &str = "post.deleted";
    pub const POST_DISCARDED: &str = "post.discarded";
    pub const POST_LIKED: &str = "post.liked";
    pub const POST_UNLIKED: &str = "post.unliked";
    pub const USER_CREATED: &str = "user.created";
    pub const USER_UPDATED: &str = "user.updated";
    pub const USER_DELETED: &str = "user.deleted";

    /// All routing keys that carry a known payload
    pub const ALL: [&str; 9] = [
        POST_CREATED,
        POST_UPDATED,
        POST_DELETED,
        POST_DISCARDED,
        POST_LIKED,
        POST_UNLIKED,
        USER_CREATED,
        USER_UPDATED,
        USER_DELETED,
    ];
}

// ============================================================================
// CONTENT SERVICE EVENTS
// ============================================================================

/// Published once a post and all of its media have been committed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostCreated {
    pub post_id: Uuid,
    pub user_id: Uuid,
    pub content: String,
    #[serde(default)]
    pub media_urls: Vec<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostUpdated {
    pub post_id: Uuid,
    pub user_id: Uuid,
    pub content: String,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostDeleted {
    pub post_id: Uuid,
    pub user_id: Uuid,
    pub deleted_at: DateTime<Utc>,
}

/// A post that never got published was rolled back. Anything stored for it
/// elsewhere should be released.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostDiscarded {
    pub post_id: Uuid,
    pub user_id: Uuid,
    pub discarded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostLiked {
    pub post_id: Uuid,
    pub post_owner_id: Uuid,
    /// The user who liked the post
    pub user_id: Uuid,
    pub likes_count: i64,
    pub liked_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostUnliked {
    pub post_id: Uuid,
    pub post_owner_id: Uuid,
    pub user_id: Uuid,
    pub likes_count: i64,
    pub unliked_at: DateTime<Utc>,
}

// ============================================================================
// USER SERVICE EVENTS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserCreated {
    pub user_id: Uuid,
    pub username: String,
    pub display_name: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserUpdated {
    pub user_id: Uuid,
    pub username: String,
    pub display_name: Option<String>,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserDeleted {
    pub user_id: Uuid,
    pub deleted_at: DateTime<Utc>,
}

/// Every event a Nova service may publish.
///
/// The variant is selected by the routing key, never by a field in the body.
#[derive(Debug, Clone, PartialEq)]
pub enum DomainEvent {
    PostCreated(PostCreated),
    PostUpdated(PostUpdated),
    PostDeleted(PostDeleted),
    PostDiscarded(PostDiscarded),
    PostLiked(PostLiked),
    PostUnliked(PostUnliked),
    UserCreated(UserCreated),
    UserUpdated(UserUpdated),
    UserDeleted(UserDeleted),
}

impl DomainEvent {
    pub fn routing_key(&self) -> &'static str {
        match self {
            DomainEvent::PostCreated(_) => routing_keys::POST_CREATED,
            DomainEvent::PostUpdated(_) => routing_keys::POST_UPDATED,
            DomainEvent::PostDeleted(_) => routing_keys::POST_DELETED,
            DomainEvent::PostDiscarded(_) => routing_keys::POST_DISCARDED,
            DomainEvent::PostLiked(_) => routing_keys::POST_LIKED,
            DomainEvent::PostUnliked(_) => routing_keys::POST_UNLIKED,
            DomainEvent::UserCreated(_) => routing_keys::USER_CREATED,
            DomainEvent::UserUpdated(_) => routing_keys::USER_UPDATED,
            DomainEvent::UserDeleted(_) => routing_keys::USER_DELETED,
        }
    }

    /// Type of the entity the event is about ("post" or "user")
    pub fn aggregate_type(&self) -> &'static str {
        match self {
            DomainEvent::PostCreated(_)
            | DomainEvent::PostUpdated(_)
            | DomainEvent::PostDeleted(_)
            | DomainEvent::PostDiscarded(_)
            | DomainEvent::PostLiked(_)
            | DomainEvent::PostUnliked(_) => "post",
            DomainEvent::UserCreated(_)
            | DomainEvent::UserUpdated(_)
            | DomainEvent::UserDeleted(_) => "user",
        }
    }

    /// ID of the entity the event is about
    pub fn aggregate_id(&self) -> Uuid {
        match self {
            DomainEvent::PostCreated(e) => e.post_id,
            DomainEvent::PostUpdated(e) => e.post_id,
            DomainEvent::PostDeleted(e) => e.post_id,
            DomainEvent::PostDiscarded(e) => e.post_id,
            DomainEvent::PostLiked(e) => e.post_id,
            DomainEvent::PostUnliked(e) => e.post_id,
            DomainEvent::UserCreated(e) => e.user_id,
            DomainEvent::UserUpdated(e) => e.user_id,
            DomainEvent::UserDeleted(e) => e.user_id,
        }
    }

    pub(crate) fn to_value(&self) -> serde_json::Result<serde_json::Value> {
        match self {
            DomainEvent::PostCreated(e) => serde_json::to_value(e),
            DomainEvent::PostUpdated(e) => serde_json::to_value(e),
            DomainEvent::PostDeleted(e) => serde_json::to_value(e),
            DomainEvent::PostDiscarded(e) => serde_json::to_value(e),
            DomainEvent::PostLiked(e) => serde_json::to_value(e),
            DomainEvent::PostUnliked(e) => serde_json::to_value(e),
            DomainEvent::UserCreated(e) => serde_json::to_value(e),
            DomainEvent::UserUpdated(e) => serde_json::to_value(e),
            DomainEvent::UserDeleted(e) => serde_json::to_value(e),
        }
    }

    /// Select the variant by routing key and parse its fields.
    ///
    /// Returns `Ok(None)` for an unknown routing key.
    pub(crate) fn from_value(
        routing_key: &str,
        value: serde_json::Value,
    ) -> serde_json::Result<Option<Self>> {
        let event = match routing_key {
            routing_keys::POST_CREATED => DomainEvent::PostCreated(serde_json::from_value(value)?),
            routing_keys::POST_UPDATED => DomainEvent::PostUpdated(serde_json::from_value(value)?),
            routing_keys::POST_DELETED => DomainEvent::PostDeleted(serde_json::from_value(value)?),
            routing_keys::POST_DISCARDED => DomainEvent::PostDiscarded(serde_json::from_value(value)?),
            routing_keys::POST_LIKED => DomainEvent::PostLiked(serde_json::from_value(value)?),
            routing_keys::POST_UNLIKED => DomainEvent::PostUnliked(serde_json::from_value(value)?),
            routing_keys::USER_CREATED => DomainEvent::UserCreated(serde_json::from_value(value)?),
            routing_keys::USER_UPDATED => DomainEvent::UserUpdated(serde_json::from_value(value)?),
            routing_keys::USER_DELETED => DomainEvent::UserDeleted(serde_json::from_value(value)?),
            _ => return Ok(None),
        };
        Ok(Some(event))
    }
}
