/// Content Service Library
///
/// Owns posts and likes for the Nova social platform. Creating a post with
/// media runs a saga against media-service; every committed mutation writes
/// its domain event to the transactional outbox, which the relay publishes
/// to the event bus.
///
/// # Modules
///
/// - `handlers`: Post HTTP request handlers
/// - `models`: Post, page and like data structures
/// - `services`: Post service, create-post saga, media-service client
/// - `db`: Repositories and embedded migrations
/// - `events`: Domain events built from committed post state
/// - `middleware`: Request extractors
/// - `error`: Error types and handling
/// - `config`: Configuration management
/// - `metrics`: Observability and metrics collection
pub mod config;
pub mod db;
pub mod error;
pub mod events;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod models;
pub mod services;

pub use config::Config;
pub use error::{AppError, Result};
