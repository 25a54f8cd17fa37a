/// Database access layer
///
/// - `post_repo`: `PostRepository` trait and its PostgreSQL implementation
/// - `memory`: in-memory repository for tests (`test-support` feature)
use sqlx::migrate::Migrator;

pub mod post_repo;

#[cfg(any(test, feature = "test-support"))]
pub mod memory;

pub use post_repo::{PgPostRepository, PostRepository};

pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations");
