//! Retry policy with exponential backoff and jitter.
//!
//! Only idempotent reads go through here. A retried compare-and-set whose
//! first attempt landed would come back as a lost race.

use std::time::Duration;

use rand::Rng;
use tracing::{info_span, warn, Instrument};

use crate::error::StoreResult;
use crate::metrics::record_retry;

/// Backoff policy for store reads.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// First backoff step and lower bound of every delay, in ms
    pub base_delay_ms: u64,
    /// Upper bound of every computed delay, in ms
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 100,
            max_delay_ms: 5000,
        }
    }
}

impl RetryConfig {
    /// `STORE_RETRY_BASE_MS` / `STORE_RETRY_MAX_MS`, falling back to the defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let ms = |name: &str| std::env::var(name).ok().and_then(|s| s.trim().parse::<u64>().ok());

        Self {
            base_delay_ms: ms("STORE_RETRY_BASE_MS").unwrap_or(defaults.base_delay_ms),
            max_delay_ms: ms("STORE_RETRY_MAX_MS").unwrap_or(defaults.max_delay_ms),
            ..defaults
        }
    }
}

/// Run `op` until it succeeds, fails permanently, or `config.max_retries`
/// retries are spent.
///
/// Network errors, 429 and 5xx are retried; 429 waits for the server's
/// `Retry-After` when one was sent.
pub async fn with_retry<T, F, Fut>(config: &RetryConfig, operation: &str, op: F) -> StoreResult<T>
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = StoreResult<T>>,
{
    let mut attempt = 0;
    loop {
        let span = info_span!("store_retry", operation = %operation, attempt = attempt + 1);
        let error = match op().instrument(span).await {
            Ok(value) => return Ok(value),
            Err(e) => e,
        };

        if !error.is_retryable() || attempt >= config.max_retries {
            return Err(error);
        }

        let delay = calculate_delay(config, attempt, error.retry_after_ms());
        warn!(
            operation = %operation,
            attempt = attempt + 1,
            delay_ms = delay.as_millis() as u64,
            "Store read failed, retrying: {}",
            error
        );
        record_retry(operation);
        tokio::time::sleep(delay).await;
        attempt += 1;
    }
}

/// Delay before retry `attempt` (0-indexed): the server's delay when given,
/// otherwise uniform in `[base, min(base * 2^attempt, max)]`.
fn calculate_delay(config: &RetryConfig, attempt: u32, retry_after_ms: Option<u64>) -> Duration {
    if let Some(after) = retry_after_ms {
        return Duration::from_millis(after);
    }

    let multiplier = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
    let ceiling = config
        .base_delay_ms
        .saturating_mul(multiplier)
        .min(config.max_delay_ms);
    let floor = config.base_delay_ms.min(ceiling);

    Duration::from_millis(rand::rng().random_range(floor..=ceiling))
}
