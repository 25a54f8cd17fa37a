/// Resilience patterns for Nova services
///
/// - **Retry**: bounded linear-backoff retry of operations that fail with a
///   transient error (write conflicts, deadlocks, pool exhaustion)
/// - **Transaction**: run a unit of work inside a store session, committing on
///   success and aborting on failure, with the same retry policy
/// - **Timeout**: deadlines for inter-service calls
///
/// # Example: retried counter update
///
/// ```rust,no_run
/// use resilience::{run_in_transaction, RetryConfig};
/// use sqlx::PgPool;
///
/// async fn bump(pool: &PgPool, user_id: sqlx::types::Uuid) -> Result<(), sqlx::Error> {
///     run_in_transaction(pool, &RetryConfig::default(), |tx| {
///         Box::pin(async move {
///             sqlx::query("UPDATE users SET posts_count = posts_count + 1 WHERE id = $1")
///                 .bind(user_id)
///                 .execute(&mut **tx)
///                 .await?;
///             Ok(())
///         })
///     })
///     .await
/// }
/// ```
pub mod retry;
pub mod timeout;
pub mod transaction;

pub use retry::{execute_with_retry, RetryConfig, RetryContext, TransientError};
pub use timeout::{with_timeout, with_timeout_result, Elapsed, TimeoutError, DEFAULT_RPC_TIMEOUT};
pub use transaction::{run_in_transaction, SerializablePool, SessionSource};
