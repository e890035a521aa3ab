//! Upstream fetchers (spec §4.4): an HTTP provider client, an HTTP/git
//! module client, and the shared retry/cancellation plumbing.

pub mod git;
pub mod http_module;
pub mod http_provider;

use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("not found")]
    NotFound,

    #[error("upstream io error: {0}")]
    UpstreamIO(String),

    #[error("checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch { expected: String, actual: String },

    #[error("cancelled")]
    Cancelled,

    #[error("timeout")]
    Timeout,
}

impl From<FetchError> for crate::Error {
    fn from(err: FetchError) -> Self {
        match err {
            FetchError::NotFound => crate::Error::NotFound(err.to_string()),
            FetchError::UpstreamIO(msg) => crate::Error::UpstreamIO(msg),
            FetchError::ChecksumMismatch { expected, actual } => {
                crate::Error::ChecksumMismatch { expected, actual }
            }
            FetchError::Cancelled => crate::Error::Cancelled(err.to_string()),
            FetchError::Timeout => crate::Error::Timeout(err.to_string()),
        }
    }
}

/// Retry policy shared by both HTTP clients: exponential backoff starting
/// at `initial_delay`, capped at `max_attempts`. Applies to transport
/// errors and 5xx; never to 4xx (spec §4.4).
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_attempts: 3, initial_delay: Duration::from_millis(500) }
    }
}

impl RetryPolicy {
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        self.initial_delay.saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)))
    }
}

/// Run `op` under the retry policy, honoring `cancel`. `should_retry`
/// decides whether a given error is transient (transport/5xx) or terminal
/// (4xx, checksum mismatch, not-found).
pub async fn with_retry<T, F, Fut>(
    policy: RetryPolicy,
    cancel: &CancellationToken,
    mut op: F,
) -> Result<T, FetchError>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, FetchError>>,
{
    let mut attempt = 0;
    loop {
        attempt += 1;

        let result = tokio::select! {
            result = op() => result,
            _ = cancel.cancelled() => return Err(FetchError::Cancelled),
        };

        match result {
            Ok(value) => return Ok(value),
            Err(err) if is_retryable(&err) && attempt < policy.max_attempts => {
                let delay = policy.delay_for_attempt(attempt);
                tracing::warn!(attempt, ?delay, error = %err, "fetch attempt failed, retrying");
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = cancel.cancelled() => return Err(FetchError::Cancelled),
                }
            }
            Err(err) => return Err(err),
        }
    }
}

fn is_retryable(err: &FetchError) -> bool {
    matches!(err, FetchError::UpstreamIO(_) | FetchError::Timeout)
}

/// The registry's own protocol always runs over HTTPS; a host that already
/// names a scheme (as tests do, pointing at a local mock server) is used
/// verbatim instead of being double-prefixed.
pub(crate) fn base_url(upstream_registry: &str) -> String {
    if upstream_registry.contains("://") {
        upstream_registry.trim_end_matches('/').to_string()
    } else {
        format!("https://{upstream_registry}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn retries_transient_errors_until_success() {
        let attempts = AtomicU32::new(0);
        let policy = RetryPolicy { max_attempts: 3, initial_delay: Duration::from_millis(1) };
        let cancel = CancellationToken::new();

        let result: Result<&str, FetchError> = with_retry(policy, &cancel, || {
            let n = attempts.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(FetchError::UpstreamIO("boom".to_string()))
                } else {
                    Ok("ok")
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), "ok");
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn does_not_retry_terminal_errors() {
        let attempts = AtomicU32::new(0);
        let policy = RetryPolicy::default();
        let cancel = CancellationToken::new();

        let result: Result<(), FetchError> = with_retry(policy, &cancel, || {
            attempts.fetch_add(1, Ordering::SeqCst);
            async move { Err(FetchError::NotFound) }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn cancellation_aborts_the_retry_loop() {
        let policy = RetryPolicy { max_attempts: 5, initial_delay: Duration::from_secs(30) };
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result: Result<(), FetchError> =
            with_retry(policy, &cancel, || async { Err(FetchError::UpstreamIO("boom".to_string())) }).await;

        assert!(matches!(result, Err(FetchError::Cancelled)));
    }
}
