/// Notification Service Library
///
/// Creates in-app notifications from domain events and serves them to
/// their recipients.
pub mod config;
pub mod consumers;
pub mod db;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod models;
pub mod services;

pub use config::Config;
pub use error::{AppError, Result};
