//! Cache invalidation for Nova services
//!
//! Services cache read results in Redis under a shared key namespace
//! ([`CacheKey`]). After an authoritative write, the writer (or a consumer
//! reacting to the write's event) evicts the affected entries:
//!
//! ```text
//! content-service: UPDATE post      -> invalidate post:<id>, posts:*
//! search-service:  post.created     -> invalidate posts-search:*
//! user-service:    post.created     -> invalidate user_profile:<user_id>
//! ```
//!
//! Exact keys are unlinked directly; patterns are resolved with SCAN and the
//! matches unlinked in one pipeline.
//!
//! # Example
//!
//! ```no_run
//! use cache_invalidation::{CacheInvalidator, CacheKey, InvalidationTarget, RedisCacheStore};
//! use std::sync::Arc;
//!
//! # async fn run(post_id: uuid::Uuid) -> Result<(), cache_invalidation::InvalidationError> {
//! let store = RedisCacheStore::connect("redis://127.0.0.1:6379").await?;
//! let invalidator = CacheInvalidator::new(Arc::new(store), "content-service");
//!
//! let report = invalidator
//!     .invalidate(&[
//!         InvalidationTarget::key(CacheKey::post(post_id)),
//!         InvalidationTarget::pattern(CacheKey::posts_pattern()),
//!     ])
//!     .await;
//! assert!(report.is_complete());
//! # Ok(())
//! # }
//! ```

mod coordinator;
mod error;
mod keys;
mod metrics;
mod store;
mod target;

pub use coordinator::{CacheInvalidator, InvalidationReport};
pub use error::{InvalidationError, Result};
pub use keys::{ttl, CacheKey};
pub use metrics::failure_count;
pub use store::{CacheStore, InMemoryCacheStore, RedisCacheStore};
pub use target::{glob_match, InvalidationTarget};
