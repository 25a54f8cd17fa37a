/// Bounded retry with linear backoff for transient store failures
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// SQLSTATE serialization_failure
const PG_SERIALIZATION_FAILURE: &str = "40001";
/// SQLSTATE deadlock_detected
const PG_DEADLOCK_DETECTED: &str = "40P01";

#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Total attempts, including the first one
    pub max_retries: u32,
    /// Base delay; attempt `n` waits `retry_delay * n` before the next try
    pub retry_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_delay: Duration::from_millis(1000),
        }
    }
}

impl RetryConfig {
    pub fn new(max_retries: u32, retry_delay: Duration) -> Self {
        Self {
            max_retries,
            retry_delay,
        }
    }
}

/// Transient per-call retry state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryContext {
    pub attempt: u32,
    pub max_attempts: u32,
    pub delay: Duration,
}

impl RetryContext {
    pub(crate) fn first(config: &RetryConfig) -> Self {
        Self {
            attempt: 1,
            max_attempts: config.max_retries,
            delay: config.retry_delay,
        }
    }

    /// Delay before the next attempt if `error` deserves one, `None` otherwise.
    pub fn backoff_for<E: TransientError + ?Sized>(&self, error: &E) -> Option<Duration> {
        if error.is_transient() && self.attempt < self.max_attempts {
            Some(self.delay * self.attempt)
        } else {
            None
        }
    }

    pub(crate) fn advance(&mut self) {
        self.attempt += 1;
    }
}

/// Classification of errors into "retry may succeed" and fatal.
pub trait TransientError {
    fn is_transient(&self) -> bool;
}

impl TransientError for sqlx::Error {
    fn is_transient(&self) -> bool {
        match self {
            sqlx::Error::Database(db_err) => matches!(
                db_err.code().as_deref(),
                Some(PG_SERIALIZATION_FAILURE) | Some(PG_DEADLOCK_DETECTED)
            ),
            sqlx::Error::PoolTimedOut | sqlx::Error::Io(_) => true,
            _ => false,
        }
    }
}

impl TransientError for anyhow::Error {
    fn is_transient(&self) -> bool {
        self.chain().any(|cause| {
            cause
                .downcast_ref::<sqlx::Error>()
                .is_some_and(|e| e.is_transient())
        })
    }
}

/// Run `operation` until it succeeds, fails fatally, or the attempt budget
/// is spent. The last error is returned unchanged.
pub async fn execute_with_retry<F, Fut, T, E>(config: &RetryConfig, mut operation: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: TransientError + std::fmt::Display,
{
    let mut ctx = RetryContext::first(config);

    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) => match ctx.backoff_for(&e) {
                Some(delay) => {
                    warn!(
                        attempt = ctx.attempt,
                        max_attempts = ctx.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Transient failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    ctx.advance();
                }
                None => return Err(e),
            },
        }
    }
}
