/// Business logic layer for content-service
///
/// - Post service: post lifecycle, likes, read-through caching
/// - Saga: state of the create-post saga
/// - Media client: the saga's remote step against media-service
pub mod media_client;
pub mod posts;
pub mod saga;

pub use media_client::{HttpMediaClient, MediaClient, MediaClientError};
pub use posts::PostService;
pub use saga::{SagaRun, SagaState};
