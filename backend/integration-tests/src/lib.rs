//! End-to-end fixtures for Nova's cross-service flows
//!
//! Wires content-service, media-service and search-service together over
//! the in-memory broker. media-service runs as a real HTTP server on an
//! ephemeral port so the create-post saga goes over the wire; everything
//! else is called in-process.
//!
//! ```text
//! PostService ──HTTP──▶ media-service
//!      │
//!   outbox ──relay──▶ InMemoryBroker ──▶ search.post_index
//!                                    └─▶ media.post_deleted
//! ```

pub mod assertions;
pub mod env;

pub use assertions::{wait_for, wait_for_default};
pub use env::{TestEnvironment, TestEnvironmentBuilder};
