/// Domain events emitted by content-service, built from committed post state
use crate::models::{LikeToggle, Post};
use chrono::Utc;
use event_schema::{
    DomainEvent, EventMessage, PostCreated, PostDeleted, PostDiscarded, PostLiked, PostUnliked,
    PostUpdated,
};
use transactional_outbox::{OutboxEvent, OutboxResult};
use uuid::Uuid;

pub fn post_created(post: &Post) -> EventMessage {
    EventMessage::new(DomainEvent::PostCreated(PostCreated {
        post_id: post.id,
        user_id: post.user_id,
        content: post.content.clone(),
        media_urls: post.media_urls.clone(),
        created_at: post.created_at,
    }))
}

pub fn post_updated(post: &Post) -> EventMessage {
    EventMessage::new(DomainEvent::PostUpdated(PostUpdated {
        post_id: post.id,
        user_id: post.user_id,
        content: post.content.clone(),
        updated_at: post.updated_at,
    }))
}

pub fn post_deleted(post: &Post) -> EventMessage {
    EventMessage::new(DomainEvent::PostDeleted(PostDeleted {
        post_id: post.id,
        user_id: post.user_id,
        deleted_at: Utc::now(),
    }))
}

/// Rolled-back saga; lets media-service drop whatever it stored for the post
pub fn post_discarded(post: &Post) -> EventMessage {
    EventMessage::new(DomainEvent::PostDiscarded(PostDiscarded {
        post_id: post.id,
        user_id: post.user_id,
        discarded_at: Utc::now(),
    }))
}

/// `post.liked` or `post.unliked` depending on the toggle result
pub fn like_toggled(toggle: &LikeToggle, post_owner_id: Uuid, user_id: Uuid) -> EventMessage {
    let now = Utc::now();
    let event = if toggle.liked {
        DomainEvent::PostLiked(PostLiked {
            post_id: toggle.post_id,
            post_owner_id,
            user_id,
            likes_count: toggle.likes_count,
            liked_at: now,
        })
    } else {
        DomainEvent::PostUnliked(PostUnliked {
            post_id: toggle.post_id,
            post_owner_id,
            user_id,
            likes_count: toggle.likes_count,
            unliked_at: now,
        })
    };
    EventMessage::new(event)
}

/// Outbox row for `message`, tagged with this service as origin
pub fn outbox_row(message: &EventMessage) -> OutboxResult<OutboxEvent> {
    Ok(OutboxEvent::from_message(message)?
        .with_metadata(serde_json::json!({ "service": "content-service" })))
}
