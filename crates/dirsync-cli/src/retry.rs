//! Retry with exponential backoff around engine operations.
//!
//! Only errors that report themselves retryable are repeated; everything
//! else is returned on the first failure.

use std::future::Future;
use std::time::Duration;

use dirsync_engine::SyncError;

/// Base delay between retries (doubles each attempt: 200ms, 400ms, 800ms, ...).
const BASE_DELAY_MS: u64 = 200;

/// Errors that know whether repeating the failed operation may help.
pub trait Retryable {
    fn is_retryable(&self) -> bool;
}

impl Retryable for SyncError {
    fn is_retryable(&self) -> bool {
        SyncError::is_retryable(self)
    }
}

/// Run `f`, retrying up to `retries` more times while it fails with a
/// retryable error.
pub async fn retry_with_backoff<T, E, F, Fut>(retries: u32, op_name: &str, f: F) -> Result<T, E>
where
    E: Retryable + std::fmt::Display,
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut attempt = 0;
    loop {
        match f().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < retries && e.is_retryable() => {
                let delay = Duration::from_millis(BASE_DELAY_MS.saturating_mul(1 << attempt.min(16)));
                attempt += 1;
                tracing::warn!(
                    operation = op_name,
                    attempt,
                    max_retries = retries,
                    "{op_name} failed, retrying in {delay:?}: {e}"
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}
