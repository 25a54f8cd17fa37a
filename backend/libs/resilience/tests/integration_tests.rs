/// Integration tests for resilience library
use resilience::{
    execute_with_retry, run_in_transaction, with_timeout_result, RetryConfig, SessionSource,
    TimeoutError, TransientError,
};
use std::sync::atomic::{AtomicI64, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

// ==================== Shared Counter Store ====================

#[derive(Debug, PartialEq)]
enum StoreError {
    WriteConflict,
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "write conflict")
    }
}

impl TransientError for StoreError {
    fn is_transient(&self) -> bool {
        true
    }
}

/// Optimistic store: a session reads a version and commit fails if the
/// version moved in between.
struct VersionedCounter {
    value: AtomicI64,
    version: AtomicU32,
    /// Number of upcoming commits that will be forced to conflict
    forced_conflicts: AtomicU32,
}

struct CounterSession {
    read_version: u32,
    delta: i64,
}

#[async_trait::async_trait]
impl SessionSource for VersionedCounter {
    type Session = CounterSession;
    type Error = StoreError;

    async fn begin(&self) -> Result<CounterSession, StoreError> {
        Ok(CounterSession {
            read_version: self.version.load(Ordering::SeqCst),
            delta: 0,
        })
    }

    async fn commit(&self, session: CounterSession) -> Result<(), StoreError> {
        if self
            .forced_conflicts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(StoreError::WriteConflict);
        }
        self.version
            .compare_exchange(
                session.read_version,
                session.read_version + 1,
                Ordering::SeqCst,
                Ordering::SeqCst,
            )
            .map_err(|_| StoreError::WriteConflict)?;
        self.value.fetch_add(session.delta, Ordering::SeqCst);
        Ok(())
    }

    async fn abort(&self, _session: CounterSession) -> Result<(), StoreError> {
        Ok(())
    }
}

fn counter(forced_conflicts: u32) -> VersionedCounter {
    VersionedCounter {
        value: AtomicI64::new(0),
        version: AtomicU32::new(0),
        forced_conflicts: AtomicU32::new(forced_conflicts),
    }
}

// ==================== Transaction Tests ====================

#[tokio::test]
async fn test_commit_conflict_is_retried() {
    let store = counter(1);
    let config = RetryConfig::new(3, Duration::from_millis(5));

    let result = run_in_transaction(&store, &config, |session| {
        Box::pin(async move {
            session.delta += 1;
            Ok::<_, StoreError>(())
        })
    })
    .await;

    assert!(result.is_ok());
    assert_eq!(store.value.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_commit_conflicts_exhaust_budget_without_side_effects() {
    let store = counter(5);
    let config = RetryConfig::new(3, Duration::from_millis(5));

    let result = run_in_transaction(&store, &config, |session| {
        Box::pin(async move {
            session.delta += 1;
            Ok::<_, StoreError>(())
        })
    })
    .await;

    assert_eq!(result, Err(StoreError::WriteConflict));
    assert_eq!(store.value.load(Ordering::SeqCst), 0);
    // Three attempts consumed three forced conflicts
    assert_eq!(store.forced_conflicts.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_concurrent_toggles_net_to_zero() {
    let store = Arc::new(counter(0));
    let config = RetryConfig::new(10, Duration::from_millis(1));

    let mut handles = Vec::new();
    for delta in [1i64, -1] {
        let store = store.clone();
        let config = config.clone();
        handles.push(tokio::spawn(async move {
            run_in_transaction(store.as_ref(), &config, |session| {
                Box::pin(async move {
                    tokio::task::yield_now().await;
                    session.delta = delta;
                    Ok::<_, StoreError>(())
                })
            })
            .await
        }));
    }

    for handle in handles {
        handle.await.unwrap().unwrap();
    }
    assert_eq!(store.value.load(Ordering::SeqCst), 0);
    assert_eq!(store.version.load(Ordering::SeqCst), 2);
}

// ==================== Retry + Timeout Tests ====================

#[tokio::test]
async fn test_timeout_inside_retry_is_fatal() {
    struct Fatal<E>(TimeoutError<E>);

    impl<E: std::fmt::Display> std::fmt::Display for Fatal<E> {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            self.0.fmt(f)
        }
    }

    impl<E> TransientError for Fatal<E> {
        fn is_transient(&self) -> bool {
            false
        }
    }

    let attempts = Arc::new(AtomicU32::new(0));
    let attempts_clone = attempts.clone();

    let result = execute_with_retry(&RetryConfig::default(), move || {
        attempts_clone.fetch_add(1, Ordering::SeqCst);
        async {
            with_timeout_result("slow call", Duration::from_millis(5), async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok::<(), &str>(())
            })
            .await
            .map_err(Fatal)
        }
    })
    .await;

    assert!(matches!(result, Err(Fatal(TimeoutError::Elapsed(_)))));
    assert_eq!(attempts.load(Ordering::SeqCst), 1);
}
