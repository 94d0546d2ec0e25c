//! Retry with exponential backoff for transient tenant-API failures.
//!
//! Wraps every remote write and every rate-limited remote read. Only the
//! transient class (rate limiting, write conflicts) is retried; everything
//! else propagates on the first failure.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::services::client::{AccountError, AccountResult};
use crate::services::config::RetryConfig;

/// Message fragments that mark a failure as transient even when the error
/// variant carries no structured flag; tenants phrase rate limiting
/// inconsistently, so the match is on the rendered message.
const TRANSIENT_MESSAGE_MARKERS: &[&str] =
    &["rate limit", "too many requests", "429", "conflict", "409"];

/// True when the error belongs to the retryable transient class.
pub fn is_transient_failure(error: &AccountError) -> bool {
    if error.is_transient() {
        return true;
    }
    let message = error.to_string().to_lowercase();
    TRANSIENT_MESSAGE_MARKERS
        .iter()
        .any(|marker| message.contains(marker))
}

/// Runs operations with bounded retries and exponential backoff.
///
/// The delay before attempt n+1 is `base_delay_ms * 2^(n-1)`: 1s, 2s, 4s
/// with the defaults. Non-transient errors are returned immediately without
/// consuming further attempts.
#[derive(Debug, Clone)]
pub struct RetryExecutor {
    config: RetryConfig,
}

impl RetryExecutor {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    pub async fn execute<T, F, Fut>(&self, operation_label: &str, mut operation: F) -> AccountResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = AccountResult<T>>,
    {
        let mut attempt = 0;
        let mut last_error = None;

        while attempt < self.config.max_attempts {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(e) => {
                    attempt += 1;

                    if !is_transient_failure(&e) {
                        return Err(e);
                    }

                    if attempt < self.config.max_attempts {
                        // Exponential backoff: 1s, 2s, 4s, etc.
                        let delay_ms = self.config.base_delay_ms * 2_u64.pow(attempt - 1);
                        warn!(
                            "[Retry] {} failed (attempt {}/{}), retrying in {}ms: {}",
                            operation_label, attempt, self.config.max_attempts, delay_ms, e
                        );
                        last_error = Some(e);
                        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                    } else {
                        warn!(
                            "[Retry] {} failed on final attempt {}/{}: {}",
                            operation_label, attempt, self.config.max_attempts, e
                        );
                        last_error = Some(e);
                    }
                }
            }
        }

        Err(last_error.unwrap_or(AccountError::Network {
            message: format!("{} was never attempted", operation_label),
        }))
    }
}
