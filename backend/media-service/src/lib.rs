/// Media Service Library
///
/// Stores files attached to posts and removes them again when the post is
/// deleted.
///
/// # Modules
///
/// - `handlers`: Ingest and lookup HTTP handlers
/// - `services`: Ingestion and per-post cleanup
/// - `storage`: Object storage abstraction
/// - `consumers`: `post.deleted` orphan cleanup
/// - `db`: Media item persistence and migrations
pub mod config;
pub mod consumers;
pub mod db;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod models;
pub mod services;
pub mod storage;

pub use config::Config;
pub use error::{AppError, Result};
