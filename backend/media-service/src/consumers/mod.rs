/// Event consumers for media-service
pub mod post_deleted;

pub use post_deleted::PostDeletedConsumer;

/// Routing keys the orphan cleanup is bound to
pub const MEDIA_RELEASE_BINDINGS: [&str; 2] = ["post.deleted", "post.discarded"];
