//! Polling helpers for asynchronous side effects

use std::future::Future;
use std::time::{Duration, Instant};

/// Poll `f` until it returns `true` or `timeout` passes.
///
/// ```rust,ignore
/// wait_for(
///     || async { index.post_count() == 1 },
///     Duration::from_secs(5),
///     Duration::from_millis(20),
/// )
/// .await
/// .expect("post was not indexed");
/// ```
pub async fn wait_for<F, Fut>(mut f: F, timeout: Duration, poll_interval: Duration) -> Result<(), String>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let start = Instant::now();
    let mut attempts = 0;

    loop {
        attempts += 1;

        if f().await {
            tracing::debug!(
                attempts,
                elapsed_ms = start.elapsed().as_millis() as u64,
                "Condition met"
            );
            return Ok(());
        }

        if start.elapsed() > timeout {
            return Err(format!(
                "condition not met after {} attempts within {}ms",
                attempts,
                timeout.as_millis()
            ));
        }

        tokio::time::sleep(poll_interval).await;
    }
}

/// [`wait_for`] with a 5 second timeout and 20ms polling
pub async fn wait_for_default<F, Fut>(f: F) -> Result<(), String>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    wait_for(f, Duration::from_secs(5), Duration::from_millis(20)).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn test_wait_for_polls_until_true() {
        let calls = AtomicU32::new(0);
        let result = wait_for(
            || async { calls.fetch_add(1, Ordering::SeqCst) >= 2 },
            Duration::from_secs(1),
            Duration::from_millis(1),
        )
        .await;
        assert!(result.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_wait_for_times_out() {
        let result = wait_for(
            || async { false },
            Duration::from_millis(20),
            Duration::from_millis(5),
        )
        .await;
        assert!(result.unwrap_err().contains("not met"));
    }
}
