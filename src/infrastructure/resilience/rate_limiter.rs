// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//
// Per-agent token bucket (spec §4.6): `5 requests / 60s` by default, keyed by
// `AgentId` and backed by `governor`'s dashmap-sharded keyed limiter so
// distinct agents never contend on the same lock.

use std::num::NonZeroU32;
use std::time::Duration as StdDuration;

use governor::{state::keyed::DashMapStateStore, Quota, RateLimiter};

use crate::domain::agent::AgentId;
use crate::error::GatewayError;
use crate::infrastructure::observability::metrics as obs;

type KeyedLimiter = RateLimiter<AgentId, DashMapStateStore<AgentId>, governor::clock::DefaultClock>;

pub struct AgentRateLimiter {
    limiter: KeyedLimiter,
}

impl AgentRateLimiter {
    /// `burst` requests per `per` (spec §4.6 default: 5 per 60s).
    pub fn new(burst: u32, per: StdDuration) -> Self {
        let burst = NonZeroU32::new(burst).unwrap_or(NonZeroU32::new(1).unwrap());
        let quota = Quota::with_period(per.checked_div(burst.get()).unwrap_or(per))
            .unwrap_or_else(|| Quota::per_minute(burst))
            .allow_burst(burst);
        Self { limiter: RateLimiter::dashmap(quota) }
    }

    /// Returns `Ok(())` if admitted, or `Err(RateLimited)` with the seconds
    /// until the bucket next has capacity (spec §4.6, §7).
    pub fn check(&self, agent_id: AgentId) -> Result<(), GatewayError> {
        match self.limiter.check_key(&agent_id) {
            Ok(_) => Ok(()),
            Err(not_until) => {
                let retry_after_secs = not_until.wait_time_from(governor::clock::DefaultClock::default().now()).as_secs().max(1);
                obs::rate_limited(&agent_id.to_string());
                Err(GatewayError::RateLimited { retry_after_secs })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admits_burst_then_denies_the_next() {
        let limiter = AgentRateLimiter::new(3, StdDuration::from_secs(60));
        let agent = AgentId::new();
        for _ in 0..3 {
            assert!(limiter.check(agent).is_ok());
        }
        assert!(matches!(limiter.check(agent), Err(GatewayError::RateLimited { .. })));
    }

    #[test]
    fn distinct_agents_have_independent_buckets() {
        let limiter = AgentRateLimiter::new(1, StdDuration::from_secs(60));
        let a = AgentId::new();
        let b = AgentId::new();
        assert!(limiter.check(a).is_ok());
        assert!(limiter.check(b).is_ok());
        assert!(limiter.check(a).is_err());
    }
}
