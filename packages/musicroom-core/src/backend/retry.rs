//! Retry logic for transient backend and catalog errors.
//!
//! Every collaborator operation is idempotent, so a request that failed with
//! a timeout, a refused connection or a 5xx answer is sent again with
//! exponential backoff. Room logic never retries on its own; it only sees the
//! final outcome.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use super::TransientError;

/// Retry delays for transient errors (exponential backoff).
const RETRY_DELAYS_MS: [u64; 3] = [200, 500, 1000];

/// Executes a request with retry logic for transient errors.
///
/// # Arguments
/// * `action` - Action name for logging
/// * `operation` - Closure that performs the request
pub(crate) async fn with_retry<T, E, F, Fut>(action: &str, mut operation: F) -> Result<T, E>
where
    E: TransientError + Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut attempt = 0;
    loop {
        match operation().await {
            Ok(r) => return Ok(r),
            Err(e) if e.is_transient() && attempt < RETRY_DELAYS_MS.len() => {
                let delay_ms = RETRY_DELAYS_MS[attempt];
                attempt += 1;
                log::warn!(
                    "[Backend] {} transient error: {} (retry {}/{} in {}ms)",
                    action,
                    e,
                    attempt,
                    RETRY_DELAYS_MS.len(),
                    delay_ms
                );
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            }
            Err(e) => return Err(e),
        }
    }
}
