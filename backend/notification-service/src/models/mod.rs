use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Newest notifications kept in the per-user cache entry
pub const PAGE_SIZE: u32 = 50;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum NotificationType {
    /// Someone liked a post of the recipient
    Like,
}

impl NotificationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationType::Like => "like",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "like" => Some(NotificationType::Like),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Notification {
    pub id: Uuid,
    pub recipient_id: Uuid,
    pub actor_id: Uuid,
    pub notification_type: NotificationType,
    pub post_id: Option<Uuid>,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    /// Notification for a `post.liked` event. The id is derived from the
    /// event id so a replayed event maps onto the same row.
    pub fn for_like(event_id: Uuid, recipient_id: Uuid, actor_id: Uuid, post_id: Uuid, at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v5(&Uuid::NAMESPACE_OID, event_id.as_bytes()),
            recipient_id,
            actor_id,
            notification_type: NotificationType::Like,
            post_id: Some(post_id),
            is_read: false,
            created_at: at,
        }
    }
}
