//! User persistence

mod user_repo;

#[cfg(any(test, feature = "test-support"))]
pub mod memory;

pub use user_repo::{PgUserRepository, UserRepository};

use sqlx::migrate::Migrator;

pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations");
