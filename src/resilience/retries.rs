//! Retry logic.
//!
//! # Responsibilities
//! - Decide which origin failures are worth retrying
//! - Re-run an operation with exponential backoff + jitter
//!
//! # Design Decisions
//! - Only connection establishment is retried; once a request has been
//!   written to the origin it is never replayed
//! - Protocol errors and cache I/O errors are never retried

use std::future::Future;

use crate::config::RetryConfig;
use crate::error::{ProxyError, ProxyResult};
use crate::resilience::backoff::retry_delay;

/// Whether a failed origin connect may be attempted again.
pub fn is_retryable(err: &ProxyError) -> bool {
    matches!(err, ProxyError::ConnectRefused { .. } | ProxyError::Timeout(..))
}

/// Run `op` until it succeeds, fails with a non-retryable error, or the
/// configured attempts are used up. `op` receives the 1-based attempt number.
pub async fn retry<T, F, Fut>(config: &RetryConfig, what: &'static str, mut op: F) -> ProxyResult<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = ProxyResult<T>>,
{
    let attempts = config.attempts();
    let mut attempt = 1;

    loop {
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < attempts && is_retryable(&e) => {
                let delay = retry_delay(config, attempt);
                tracing::info!(operation = what, attempt, delay = ?delay, error = %e, "Retrying");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
