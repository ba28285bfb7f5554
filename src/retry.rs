//! Retry Executor (§4.B): runs an idempotent async operation with capped
//! exponential backoff, absorbing the failure rather than propagating it.

use std::future::Future;
use std::time::Duration;

use crate::config::SyncConfig;

/// Up to `config.retry_max_attempts` retries (so `retry_max_attempts + 1`
/// total attempts). Delay before attempt `k` (1-indexed) is
/// `base * 2^(k-1)`. Returns `None` on exhaustion; the caller never learns
/// *why* it failed beyond the log line this function emits, matching
/// §4.B's "never propagate" contract.
pub async fn execute<F, Fut, T, E>(config: &SyncConfig, name: &str, mut op: F) -> Option<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let total_attempts = config.retry_max_attempts + 1;
    for attempt in 1..=total_attempts {
        match op().await {
            Ok(value) => return Some(value),
            Err(err) => {
                if attempt < total_attempts {
                    let delay = config.retry_base_delay * 2u32.pow(attempt - 1);
                    tracing::warn!(
                        operation = name,
                        attempt,
                        total_attempts,
                        error = %err,
                        delay_ms = delay.as_millis() as u64,
                        "retryable operation failed, backing off"
                    );
                    tokio::time::sleep(delay).await;
                } else {
                    tracing::error!(
                        operation = name,
                        attempts = total_attempts,
                        error = %err,
                        "operation exhausted all retries"
                    );
                }
            }
        }
    }
    None
}

/// Cumulative sleep time a full exhaustion run incurs, useful for tests
/// that assert on backoff shape (P9) without depending on wall-clock
/// measurement jitter.
pub fn cumulative_backoff(config: &SyncConfig) -> Duration {
    (1..config.retry_max_attempts)
        .map(|k| config.retry_base_delay * 2u32.pow(k - 1))
        .chain(std::iter::once(
            config.retry_base_delay * 2u32.pow(config.retry_max_attempts - 1),
        ))
        .sum()
}
