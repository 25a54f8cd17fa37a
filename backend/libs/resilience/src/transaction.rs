/// Retried units of work inside a store session
use crate::retry::{RetryConfig, RetryContext, TransientError};
use async_trait::async_trait;
use futures::future::BoxFuture;
use sqlx::{PgPool, Postgres, Transaction};
use tracing::{debug, warn};

/// A store that can open, commit and abort sessions.
///
/// Commit and abort consume the session, so a session can never be reused
/// after its outcome is decided.
#[async_trait]
pub trait SessionSource: Send + Sync {
    type Session: Send;
    type Error: TransientError + std::fmt::Display + Send;

    async fn begin(&self) -> Result<Self::Session, Self::Error>;

    async fn commit(&self, session: Self::Session) -> Result<(), Self::Error>;

    async fn abort(&self, session: Self::Session) -> Result<(), Self::Error>;
}

#[async_trait]
impl SessionSource for PgPool {
    type Session = Transaction<'static, Postgres>;
    type Error = sqlx::Error;

    async fn begin(&self) -> Result<Self::Session, sqlx::Error> {
        sqlx::Pool::begin(self).await
    }

    async fn commit(&self, session: Self::Session) -> Result<(), sqlx::Error> {
        session.commit().await
    }

    async fn abort(&self, session: Self::Session) -> Result<(), sqlx::Error> {
        session.rollback().await
    }
}

/// PostgreSQL pool whose sessions run at SERIALIZABLE isolation.
///
/// Concurrent writers on the same row then surface as SQLSTATE 40001
/// instead of lost updates, which the retry loop absorbs.
#[derive(Clone)]
pub struct SerializablePool(pub PgPool);

#[async_trait]
impl SessionSource for SerializablePool {
    type Session = Transaction<'static, Postgres>;
    type Error = sqlx::Error;

    async fn begin(&self) -> Result<Self::Session, sqlx::Error> {
        let mut tx = self.0.begin().await?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL SERIALIZABLE")
            .execute(&mut *tx)
            .await?;
        Ok(tx)
    }

    async fn commit(&self, session: Self::Session) -> Result<(), sqlx::Error> {
        session.commit().await
    }

    async fn abort(&self, session: Self::Session) -> Result<(), sqlx::Error> {
        session.rollback().await
    }
}

/// Run `operations` in a fresh session, retrying the whole unit of work on
/// transient failures.
///
/// Each attempt begins its own session; the session is committed when
/// `operations` succeeds and aborted when it fails. A failing commit counts
/// as a failed attempt.
pub async fn run_in_transaction<S, F, T, E>(
    source: &S,
    config: &RetryConfig,
    mut operations: F,
) -> Result<T, E>
where
    S: SessionSource + ?Sized,
    F: for<'s> FnMut(&'s mut S::Session) -> BoxFuture<'s, Result<T, E>>,
    E: From<S::Error> + TransientError + std::fmt::Display,
{
    let mut ctx = RetryContext::first(config);

    loop {
        match attempt_once(source, &mut operations).await {
            Ok(value) => {
                debug!(attempt = ctx.attempt, "Transaction committed");
                return Ok(value);
            }
            Err(e) => match ctx.backoff_for(&e) {
                Some(delay) => {
                    warn!(
                        attempt = ctx.attempt,
                        max_attempts = ctx.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Transaction aborted with transient error, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    ctx.advance();
                }
                None => return Err(e),
            },
        }
    }
}

async fn attempt_once<S, F, T, E>(source: &S, operations: &mut F) -> Result<T, E>
where
    S: SessionSource + ?Sized,
    F: for<'s> FnMut(&'s mut S::Session) -> BoxFuture<'s, Result<T, E>>,
    E: From<S::Error>,
{
    let mut session = source.begin().await?;

    match operations(&mut session).await {
        Ok(value) => {
            source.commit(session).await?;
            Ok(value)
        }
        Err(e) => {
            if let Err(abort_err) = source.abort(session).await {
                warn!(error = %abort_err, "Failed to abort transaction");
            }
            Err(e)
        }
    }
}
