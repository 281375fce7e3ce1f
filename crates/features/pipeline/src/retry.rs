//! Exponential backoff for transient failures.

use std::future::Future;
use std::time::Duration;
use tracing::debug;

use crate::transport::TransportError;

/// Classifies errors the backoff loop is allowed to retry.
///
/// Only transient, network-class failures qualify; business-rule
/// rejections must report `false`.
pub trait Transient {
    fn is_transient(&self) -> bool;
}

impl Transient for TransportError {
    fn is_transient(&self) -> bool {
        matches!(self, Self::Network { .. })
    }
}

/// Runs `operation`, retrying transient failures with exponential backoff:
/// `base_delay * 2^attempt` between tries, up to `max_retries` retries.
///
/// Non-transient errors are returned immediately without sleeping.
///
/// # Errors
/// Returns the last error once retries are exhausted.
pub async fn retry_with_backoff<T, E, F, Fut>(
    mut operation: F,
    max_retries: u32,
    base_delay: Duration,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Transient + std::fmt::Display,
{
    let mut attempt = 0u32;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(error) if error.is_transient() && attempt < max_retries => {
                let delay = base_delay.saturating_mul(2u32.saturating_pow(attempt));
                debug!(attempt, delay_ms = delay.as_millis() as u64, %error, "Retrying after transient failure");
                tokio::time::sleep(delay).await;
                attempt += 1;
            },
            Err(error) => return Err(error),
        }
    }
}
