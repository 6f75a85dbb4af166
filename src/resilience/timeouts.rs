//! Timeout enforcement.
//!
//! # Responsibilities
//! - Wrap client and origin I/O with a deadline
//! - Turn an elapsed deadline into a distinct error
//!
//! # Design Decisions
//! - Uses Tokio's timeout facilities; the wrapped future is dropped
//! - Timed-out origin operations answer 504 Gateway Timeout

use std::future::Future;
use std::time::Duration;

use crate::error::{ProxyError, ProxyResult};

/// Run `fut` with a deadline of `secs` seconds.
///
/// `what` names the operation in the resulting [`ProxyError::Timeout`].
pub async fn with_timeout<T, F>(secs: u64, what: &'static str, fut: F) -> ProxyResult<T>
where
    F: Future<Output = ProxyResult<T>>,
{
    match tokio::time::timeout(Duration::from_secs(secs), fut).await {
        Ok(result) => result,
        Err(_) => Err(ProxyError::Timeout(what, secs)),
    }
}
