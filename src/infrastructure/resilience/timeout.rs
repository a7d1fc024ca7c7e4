// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//
// Per-call deadline (spec §4.6): every adapter invocation runs under a
// caller-visible timeout, default 6s, overrideable per tool.

use std::future::Future;
use std::time::Duration;

use crate::error::GatewayError;

pub async fn with_timeout<F, T>(duration: Duration, fut: F) -> Result<T, GatewayError>
where
    F: Future<Output = Result<T, GatewayError>>,
{
    match tokio::time::timeout(duration, fut).await {
        Ok(result) => result,
        Err(_elapsed) => Err(GatewayError::UpstreamTimeout),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn returns_upstream_timeout_when_the_future_is_slower_than_the_deadline() {
        let result: Result<(), GatewayError> = with_timeout(Duration::from_millis(5), async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            Ok(())
        })
        .await;
        assert!(matches!(result, Err(GatewayError::UpstreamTimeout)));
    }

    #[tokio::test]
    async fn passes_through_a_fast_future() {
        let result = with_timeout(Duration::from_millis(50), async { Ok::<_, GatewayError>(42) }).await;
        assert_eq!(result.unwrap(), 42);
    }
}
