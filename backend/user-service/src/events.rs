/// Domain events emitted by user-service
use crate::models::User;
use chrono::Utc;
use event_schema::{DomainEvent, EventMessage, UserCreated, UserDeleted, UserUpdated};
use transactional_outbox::{OutboxEvent, OutboxResult};

pub fn user_created(user: &User) -> EventMessage {
    EventMessage::new(DomainEvent::UserCreated(UserCreated {
        user_id: user.id,
        username: user.username.clone(),
        display_name: user.display_name.clone(),
        created_at: user.created_at,
    }))
}

pub fn user_updated(user: &User) -> EventMessage {
    EventMessage::new(DomainEvent::UserUpdated(UserUpdated {
        user_id: user.id,
        username: user.username.clone(),
        display_name: user.display_name.clone(),
        bio: user.bio.clone(),
        avatar_url: user.avatar_url.clone(),
        updated_at: user.updated_at,
    }))
}

pub fn user_deleted(user: &User) -> EventMessage {
    EventMessage::new(DomainEvent::UserDeleted(UserDeleted {
        user_id: user.id,
        deleted_at: Utc::now(),
    }))
}

pub fn outbox_row(message: &EventMessage) -> OutboxResult<OutboxEvent> {
    Ok(OutboxEvent::from_message(message)?
        .with_metadata(serde_json::json!({ "service": "user-service" })))
}
