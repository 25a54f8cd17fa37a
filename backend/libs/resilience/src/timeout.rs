/// Deadlines for inter-service calls
use std::future::Future;
use std::time::Duration;
use tokio::time::timeout;

/// Default deadline for read calls to another service
pub const DEFAULT_RPC_TIMEOUT: Duration = Duration::from_millis(5000);

/// The deadline passed before the call completed.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{operation} timed out after {after:?}")]
pub struct Elapsed {
    pub operation: &'static str,
    pub after: Duration,
}

#[derive(Debug, thiserror::Error)]
pub enum TimeoutError<E> {
    #[error(transparent)]
    Elapsed(#[from] Elapsed),
    #[error("{0}")]
    Failed(E),
}

/// Await `future` for at most `duration`.
pub async fn with_timeout<F>(
    operation: &'static str,
    duration: Duration,
    future: F,
) -> Result<F::Output, Elapsed>
where
    F: Future,
{
    timeout(duration, future).await.map_err(|_| Elapsed {
        operation,
        after: duration,
    })
}

/// Await a fallible `future` for at most `duration`, keeping its error type.
pub async fn with_timeout_result<F, T, E>(
    operation: &'static str,
    duration: Duration,
    future: F,
) -> Result<T, TimeoutError<E>>
where
    F: Future<Output = Result<T, E>>,
{
    match with_timeout(operation, duration, future).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(TimeoutError::Failed(e)),
        Err(elapsed) => Err(TimeoutError::Elapsed(elapsed)),
    }
}
