//! Invalidation coordinator
//!
//! Called synchronously after an authoritative write commits (and from
//! event consumers in other services). A failed eviction never fails the
//! write that triggered it: it is logged, counted, and reported back.

use crate::error::{InvalidationError, Result};
use crate::metrics;
use crate::store::CacheStore;
use crate::target::InvalidationTarget;
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

/// Outcome of a best-effort invalidation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InvalidationReport {
    /// Keys actually removed
    pub deleted: usize,
    /// Targets whose resolution or deletion failed
    pub failed: Vec<InvalidationTarget>,
}

impl InvalidationReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

#[derive(Clone)]
pub struct CacheInvalidator {
    store: Arc<dyn CacheStore>,
    service: String,
}

impl CacheInvalidator {
    pub fn new(store: Arc<dyn CacheStore>, service: impl Into<String>) -> Self {
        Self {
            store,
            service: service.into(),
        }
    }

    pub fn store(&self) -> &Arc<dyn CacheStore> {
        &self.store
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    /// Evict every target. Targets matching nothing are a no-op.
    pub async fn invalidate(&self, targets: &[InvalidationTarget]) -> InvalidationReport {
        let mut report = InvalidationReport::default();

        for target in targets {
            match self.evict(target).await {
                Ok(deleted) => report.deleted += deleted,
                Err(e) => {
                    warn!(
                        service = %self.service,
                        target = %target,
                        error = %e,
                        "Cache invalidation failed, stale entry may be served until TTL"
                    );
                    metrics::record_failure(&self.service);
                    report.failed.push(target.clone());
                }
            }
        }

        if report.deleted > 0 {
            metrics::record_deleted(&self.service, report.deleted);
        }
        debug!(
            service = %self.service,
            targets = targets.len(),
            deleted = report.deleted,
            failed = report.failed.len(),
            "Cache invalidation finished"
        );
        report
    }

    /// Strict variant for callers that want the failure (e.g. to get the
    /// triggering event redelivered).
    pub async fn try_invalidate(&self, targets: &[InvalidationTarget]) -> Result<usize> {
        let mut deleted = 0;
        let mut failed = 0;
        let mut first_error = None;

        for target in targets {
            match self.evict(target).await {
                Ok(n) => deleted += n,
                Err(e) => {
                    metrics::record_failure(&self.service);
                    failed += 1;
                    first_error.get_or_insert_with(|| e.to_string());
                }
            }
        }

        match first_error {
            None => {
                if deleted > 0 {
                    metrics::record_deleted(&self.service, deleted);
                }
                Ok(deleted)
            }
            Some(first_error) => Err(InvalidationError::Partial {
                failed,
                first_error,
            }),
        }
    }

    async fn evict(&self, target: &InvalidationTarget) -> Result<usize> {
        match target {
            InvalidationTarget::Key(key) => self.store.unlink(std::slice::from_ref(key)).await,
            InvalidationTarget::Pattern(pattern) => {
                let keys = self.store.scan(pattern).await?;
                if keys.is_empty() {
                    return Ok(0);
                }
                self.store.unlink(&keys).await
            }
        }
    }

    /// Read-through lookup. Store errors and undecodable entries count as a
    /// miss so reads fall back to the primary store.
    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        match self.store.get(key).await {
            Ok(Some(raw)) => match serde_json::from_str(&raw) {
                Ok(value) => Some(value),
                Err(e) => {
                    warn!(key = %key, error = %e, "Discarding undecodable cache entry");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                warn!(key = %key, error = %e, "Cache read failed");
                None
            }
        }
    }

    /// Populate after a primary-store read. Failures are logged only.
    pub async fn set_json<T: Serialize>(&self, key: &str, value: &T, ttl_secs: u64) {
        let raw = match serde_json::to_string(value) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(key = %key, error = %e, "Failed to serialize cache entry");
                return;
            }
        };
        if let Err(e) = self.store.set_ex(key, raw, ttl_secs).await {
            warn!(key = %key, error = %e, "Cache write failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryCacheStore;

    async fn seeded(keys: &[&str]) -> InMemoryCacheStore {
        let store = InMemoryCacheStore::new();
        for key in keys {
            store.set_ex(key, "{}".to_string(), 60).await.unwrap();
        }
        store
    }

    #[tokio::test]
    async fn test_exact_key_evicts_only_that_key() {
        let store = seeded(&["post:1", "post:10", "posts:cursor:start:20"]).await;
        let invalidator = CacheInvalidator::new(Arc::new(store.clone()), "test-exact");

        let report = invalidator.invalidate(&["post:1".into()]).await;

        assert_eq!(report.deleted, 1);
        assert!(report.is_complete());
        assert_eq!(store.keys(), vec!["post:10", "posts:cursor:start:20"]);
    }

    #[tokio::test]
    async fn test_pattern_evicts_prefix_only() {
        let store = seeded(&[
            "posts:cursor:start:20",
            "posts:cursor:abc:10",
            "post:1",
            "posts-search:hello:20",
        ])
        .await;
        let invalidator = CacheInvalidator::new(Arc::new(store.clone()), "test-pattern");

        let report = invalidator.invalidate(&["posts:*".into()]).await;

        assert_eq!(report.deleted, 2);
        assert_eq!(store.keys(), vec!["post:1", "posts-search:hello:20"]);
    }

    #[tokio::test]
    async fn test_no_match_is_noop() {
        let store = seeded(&["post:1"]).await;
        let invalidator = CacheInvalidator::new(Arc::new(store.clone()), "test-noop");

        let report = invalidator
            .invalidate(&["posts:*".into(), "post:2".into()])
            .await;

        assert_eq!(report, InvalidationReport::default());
        assert!(store.contains("post:1"));
    }

    #[tokio::test]
    async fn test_store_outage_is_reported_and_counted() {
        let store = seeded(&["post:1"]).await;
        let invalidator = CacheInvalidator::new(Arc::new(store.clone()), "test-outage");
        store.set_offline(true);

        let before = metrics::failure_count("test-outage");
        let report = invalidator
            .invalidate(&["post:1".into(), "posts:*".into()])
            .await;

        assert_eq!(report.failed.len(), 2);
        assert_eq!(metrics::failure_count("test-outage"), before + 2);

        let err = invalidator.try_invalidate(&["post:1".into()]).await.unwrap_err();
        assert!(matches!(err, InvalidationError::Partial { failed: 1, .. }));
    }

    #[tokio::test]
    async fn test_json_read_through() {
        let store = InMemoryCacheStore::new();
        let invalidator = CacheInvalidator::new(Arc::new(store.clone()), "test-json");

        invalidator.set_json("user_profile:1", &vec![1, 2, 3], 60).await;
        let cached: Option<Vec<i32>> = invalidator.get_json("user_profile:1").await;
        assert_eq!(cached, Some(vec![1, 2, 3]));

        store.set_offline(true);
        let cached: Option<Vec<i32>> = invalidator.get_json("user_profile:1").await;
        assert_eq!(cached, None);
    }
}
