// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//
// Process-local chaos injector (spec §4.10): a `tool -> {mode, pct}` map,
// mutable only outside production mode (enforced by the caller checking
// `Config::upstream_mode`, not by this type). Sampled on every upstream call.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::GatewayError;
use crate::infrastructure::observability::metrics as obs;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChaosMode {
    Timeout,
    Error500,
    Jitter,
}

impl ChaosMode {
    fn label(self) -> &'static str {
        match self {
            ChaosMode::Timeout => "timeout",
            ChaosMode::Error500 => "error500",
            ChaosMode::Jitter => "jitter",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ChaosRule {
    pub mode: ChaosMode,
    /// Sampling probability in `[0.0, 1.0]`.
    pub pct: f64,
}

pub struct ChaosInjector {
    schedule: DashMap<String, ChaosRule>,
    /// Gated by `FF_CHAOS` (spec §6); `sample` is a no-op while this is false.
    enabled: AtomicBool,
}

impl Default for ChaosInjector {
    fn default() -> Self {
        Self { schedule: DashMap::new(), enabled: AtomicBool::new(true) }
    }
}

impl ChaosInjector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }

    pub fn set(&self, tool: &str, rule: ChaosRule) {
        self.schedule.insert(tool.to_string(), rule);
    }

    pub fn clear(&self, tool: &str) {
        if self.schedule.remove(tool).is_some() {
            obs::chaos_cleared(tool);
        }
    }

    pub fn get_all(&self) -> Vec<(String, ChaosRule)> {
        self.schedule.iter().map(|e| (e.key().clone(), *e.value())).collect()
    }

    /// Samples the schedule for `tool`. Returns a synthetic failure to
    /// surface (timeout/500) for the caller to short-circuit with, `Some(jitter)`
    /// delay to sleep before proceeding, or `None` when no fault fires.
    pub fn sample(&self, tool: &str) -> Option<ChaosOutcome> {
        if !self.enabled.load(Ordering::SeqCst) {
            return None;
        }
        let rule = *self.schedule.get(tool)?.value();
        if rand::rng().random_range(0.0..1.0) >= rule.pct {
            return None;
        }
        obs::chaos_injected(tool, rule.mode.label());
        match rule.mode {
            ChaosMode::Timeout => Some(ChaosOutcome::Fail(GatewayError::UpstreamTimeout)),
            ChaosMode::Error500 => Some(ChaosOutcome::Fail(GatewayError::Upstream5xx)),
            ChaosMode::Jitter => Some(ChaosOutcome::Delay(Duration::from_millis(rand::rng().random_range(1000..6000)))),
        }
    }
}

pub enum ChaosOutcome {
    Fail(GatewayError),
    Delay(Duration),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pct_zero_never_fires() {
        let chaos = ChaosInjector::new();
        chaos.set("serpapi", ChaosRule { mode: ChaosMode::Timeout, pct: 0.0 });
        for _ in 0..50 {
            assert!(chaos.sample("serpapi").is_none());
        }
    }

    #[test]
    fn pct_one_always_fires() {
        let chaos = ChaosInjector::new();
        chaos.set("serpapi", ChaosRule { mode: ChaosMode::Error500, pct: 1.0 });
        for _ in 0..10 {
            assert!(matches!(chaos.sample("serpapi"), Some(ChaosOutcome::Fail(GatewayError::Upstream5xx))));
        }
    }

    #[test]
    fn clear_removes_the_rule() {
        let chaos = ChaosInjector::new();
        chaos.set("serpapi", ChaosRule { mode: ChaosMode::Timeout, pct: 1.0 });
        chaos.clear("serpapi");
        assert!(chaos.sample("serpapi").is_none());
    }
}
