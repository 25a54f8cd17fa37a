/// Search Service Library
///
/// Keeps a searchable copy of posts and users, written only by event
/// consumers, and serves cached substring search over it.
pub mod config;
pub mod consumers;
pub mod error;
pub mod handlers;
pub mod index;
pub mod metrics;
pub mod services;

pub use config::Config;
pub use error::{AppError, Result};

use sqlx::migrate::Migrator;

pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations");
