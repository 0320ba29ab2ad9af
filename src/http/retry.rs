//! Backoff policy for throttled Graph requests.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default number of retries after the first attempt.
pub const MAX_RETRIES: u32 = 3;

/// Default base delay for exponential backoff in milliseconds.
pub const BASE_DELAY_MS: u64 = 1000;

/// Default upper bound for a single backoff delay in milliseconds.
pub const MAX_DELAY_MS: u64 = 30_000;

/// Retry envelope applied to throttled (HTTP 429) responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RetryOptions {
    /// Retries after the first attempt; a request is sent at most `max_retries + 1` times.
    pub max_retries: u32,
    /// Base delay in milliseconds, doubled per attempt.
    pub base_delay: u64,
    /// Cap in milliseconds applied before jitter.
    pub max_delay: u64,
}

impl Default for RetryOptions {
    fn default() -> Self {
        Self {
            max_retries: MAX_RETRIES,
            base_delay: BASE_DELAY_MS,
            max_delay: MAX_DELAY_MS,
        }
    }
}

/// Computes the backoff delay in milliseconds for a zero-based `attempt`.
///
/// The delay is `min(base_delay * 2^attempt, max_delay)` plus up to 10% random jitter,
/// so the result always lies in `[capped, capped * 1.1]`.
pub fn calculate_backoff(attempt: u32, base_delay: u64, max_delay: u64) -> f64 {
    calculate_backoff_with(attempt, base_delay, max_delay, rand::random::<f64>())
}

/// Same as [`calculate_backoff`] with an explicit jitter sample in `[0, 1)`.
pub fn calculate_backoff_with(attempt: u32, base_delay: u64, max_delay: u64, jitter: f64) -> f64 {
    let exponential = (base_delay as f64) * 2f64.powi(attempt.min(i32::MAX as u32) as i32);
    let delay = exponential.min(max_delay as f64);
    delay + delay * 0.1 * jitter.clamp(0.0, 1.0)
}

/// Suspends the current task for `ms` milliseconds without blocking the runtime.
pub async fn sleep(ms: u64) {
    tokio::time::sleep(Duration::from_millis(ms)).await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_retry_options() {
        let opts = RetryOptions::default();
        assert_eq!(opts.max_retries, 3);
        assert_eq!(opts.base_delay, 1000);
        assert_eq!(opts.max_delay, 30_000);
    }

    #[test]
    fn test_retry_options_partial_json_keeps_defaults() {
        let opts: RetryOptions = serde_json::from_str(r#"{"maxRetries": 1}"#).unwrap();
        assert_eq!(opts.max_retries, 1);
        assert_eq!(opts.base_delay, BASE_DELAY_MS);
        assert_eq!(opts.max_delay, MAX_DELAY_MS);
    }

    #[test]
    fn test_backoff_without_jitter_doubles() {
        assert_eq!(calculate_backoff_with(0, 1000, 30_000, 0.0), 1000.0);
        assert_eq!(calculate_backoff_with(1, 1000, 30_000, 0.0), 2000.0);
        assert_eq!(calculate_backoff_with(4, 1000, 30_000, 0.0), 16_000.0);
    }

    #[test]
    fn test_backoff_is_capped_before_jitter() {
        assert_eq!(calculate_backoff_with(5, 1000, 30_000, 0.0), 30_000.0);
        assert_eq!(calculate_backoff_with(20, 1000, 30_000, 0.0), 30_000.0);
        assert!((calculate_backoff_with(20, 1000, 30_000, 1.0) - 33_000.0).abs() < 1e-6);
    }

    #[test]
    fn test_backoff_huge_attempt_does_not_overflow() {
        let delay = calculate_backoff_with(u32::MAX, 1000, 30_000, 0.5);
        assert!(delay.is_finite());
        assert!(delay >= 30_000.0 && delay <= 33_000.0);
    }

    #[test]
    fn test_backoff_stays_within_jitter_bounds() {
        for attempt in 0..12 {
            let floor = ((1000u64 << attempt) as f64).min(30_000.0);
            for _ in 0..50 {
                let delay = calculate_backoff(attempt, 1000, 30_000);
                assert!(delay >= floor, "attempt {}: {} < {}", attempt, delay, floor);
                assert!(delay <= floor * 1.1, "attempt {}: {} > {}", attempt, delay, floor * 1.1);
            }
        }
    }

    #[test]
    fn test_backoff_non_decreasing_without_jitter() {
        let mut previous = 0.0;
        for attempt in 0..16 {
            let delay = calculate_backoff_with(attempt, 250, 10_000, 0.0);
            assert!(delay >= previous);
            previous = delay;
        }
    }

    #[tokio::test]
    async fn test_sleep_waits() {
        let start = std::time::Instant::now();
        sleep(20).await;
        assert!(start.elapsed() >= Duration::from_millis(20));
    }
}
