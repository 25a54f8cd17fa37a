/// Event consumers for notification-service
pub mod post_liked;

pub use post_liked::PostLikedConsumer;

pub const POST_LIKED_BINDING: &str = event_schema::routing_keys::POST_LIKED;
