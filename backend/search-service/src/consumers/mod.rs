/// Event consumers keeping the search index in step with content and users
pub mod post_index;
pub mod user_index;

pub use post_index::PostIndexConsumer;
pub use user_index::UserIndexConsumer;

/// Post lifecycle events (`post.created`, `post.updated`, `post.deleted`)
pub const POST_BINDINGS: [&str; 3] = [
    event_schema::routing_keys::POST_CREATED,
    event_schema::routing_keys::POST_UPDATED,
    event_schema::routing_keys::POST_DELETED,
];

pub const USER_BINDING: &str = "user.*";
