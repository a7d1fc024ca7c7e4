// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//
// Bounded retry with full-jitter exponential backoff (spec §4.6). Retries
// only the whitelisted upstream error kinds; everything else surfaces on the
// first attempt.

use std::future::Future;
use std::time::Duration;

use rand::Rng;

use crate::error::GatewayError;
use crate::infrastructure::observability::metrics as obs;

#[derive(Debug, Clone, Copy)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base: Duration,
    pub cap: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self { max_attempts: 3, base: Duration::from_millis(100), cap: Duration::from_secs(5) }
    }
}

impl RetryConfig {
    /// `delay = min(cap, base * 2^attempt) * rand[0,1]` (spec §4.6).
    fn backoff_for(&self, attempt: u32) -> Duration {
        let exp = self.base.as_millis().saturating_mul(1u128 << attempt.min(20));
        let capped = exp.min(self.cap.as_millis());
        let jittered = rand::rng().random_range(0.0..1.0) * capped as f64;
        Duration::from_millis(jittered as u64)
    }
}

/// Runs `attempt` up to `config.max_attempts` times, retrying only while the
/// returned error is `GatewayError::is_retryable()` and the caller hasn't
/// cancelled (`cancel` resolves first).
pub async fn retry_with_backoff<F, Fut, T>(
    tool: &str,
    action: &str,
    config: RetryConfig,
    mut attempt: F,
) -> Result<T, GatewayError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, GatewayError>>,
{
    let mut last_err = None;
    for attempt_idx in 0..config.max_attempts {
        match attempt().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_retryable() && attempt_idx + 1 < config.max_attempts => {
                obs::retry_attempted(tool, action, err.kind());
                tokio::time::sleep(config.backoff_for(attempt_idx)).await;
                last_err = Some(err);
            }
            Err(err) => return Err(err),
        }
    }
    Err(last_err.unwrap_or(GatewayError::Internal("retry loop exited without an attempt".to_string())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn succeeds_after_two_retryable_failures() {
        let calls = AtomicU32::new(0);
        let result = retry_with_backoff("serpapi", "search", RetryConfig { base: Duration::from_millis(1), ..Default::default() }, || async {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            if n < 2 {
                Err(GatewayError::UpstreamTimeout)
            } else {
                Ok(n)
            }
        })
        .await;
        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn non_retryable_error_short_circuits() {
        let calls = AtomicU32::new(0);
        let result: Result<(), GatewayError> = retry_with_backoff("serpapi", "search", RetryConfig::default(), || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(GatewayError::Validation("bad params".to_string()))
        })
        .await;
        assert!(matches!(result, Err(GatewayError::Validation(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn exhausts_max_attempts_and_surfaces_last_error() {
        let calls = AtomicU32::new(0);
        let result: Result<(), GatewayError> = retry_with_backoff(
            "serpapi",
            "search",
            RetryConfig { max_attempts: 2, base: Duration::from_millis(1), ..Default::default() },
            || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(GatewayError::Upstream5xx)
            },
        )
        .await;
        assert!(matches!(result, Err(GatewayError::Upstream5xx)));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
