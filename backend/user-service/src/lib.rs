/// User Service Library
///
/// Owns user profiles, announces their changes as `user.*` events through
/// the outbox, and keeps each profile's post counter current from
/// `post.created` / `post.deleted`.
///
/// # Modules
///
/// - `handlers`: Profile CRUD endpoints
/// - `services`: Profile lifecycle with read-through caching
/// - `consumers`: Posts counter
/// - `db`: User persistence and migrations
pub mod config;
pub mod consumers;
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
