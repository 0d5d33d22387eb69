//! Bounded retry for storage operations that fail on contention.
//!
//! Only failures that are plausibly transient (sqlite lock contention, a lost
//! connection, pool acquire timeouts) are retried. Everything else, including
//! constraint violations, is returned on the first attempt.

use sea_orm::{DbErr, RuntimeErr};
use std::future::Future;
use std::time::Duration;
use tracing::warn;

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            backoff: Duration::from_millis(25),
        }
    }
}

impl RetryPolicy {
    #[must_use]
    pub const fn new(attempts: u32, backoff_ms: u64) -> Self {
        Self {
            attempts,
            backoff: Duration::from_millis(backoff_ms),
        }
    }
}

#[must_use]
pub fn is_transient(err: &DbErr) -> bool {
    match err {
        DbErr::ConnectionAcquire(_) | DbErr::Conn(_) => true,
        DbErr::Exec(RuntimeErr::SqlxError(e)) | DbErr::Query(RuntimeErr::SqlxError(e)) => {
            let msg = e.to_string().to_lowercase();
            msg.contains("database is locked")
                || msg.contains("database table is locked")
                || msg.contains("busy")
                || msg.contains("pool timed out")
        }
        _ => false,
    }
}

#[must_use]
pub fn is_unique_violation(err: &DbErr) -> bool {
    matches!(
        err.sql_err(),
        Some(sea_orm::SqlErr::UniqueConstraintViolation(_))
    )
}

/// Runs `op` until it succeeds, fails with a non-transient error, or the
/// policy's attempts are exhausted.
pub async fn with_retry<T, F, Fut>(policy: RetryPolicy, op_name: &str, mut op: F) -> Result<T, DbErr>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, DbErr>>,
{
    let attempts = policy.attempts.max(1);
    let mut attempt = 1;

    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < attempts && is_transient(&e) => {
                warn!(
                    event = "storage_retry",
                    op = op_name,
                    attempt,
                    error = %e,
                    "Transient storage failure, retrying"
                );
                tokio::time::sleep(policy.backoff * attempt).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
