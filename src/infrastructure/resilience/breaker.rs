// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//
// Per-tool circuit breaker (spec §4.6). State is mutated only by the request
// that observes the failure or completion, serialized per tool via one
// `parking_lot::Mutex` per entry; reads of `breaker_state{tool}` are
// lock-free snapshots (spec §5).

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration as StdDuration, Instant};

use chrono::Utc;
use dashmap::DashMap;
use parking_lot::Mutex;

use crate::domain::breaker::{BreakerState, BreakerStateKind};
use crate::error::GatewayError;
use crate::infrastructure::observability::metrics as obs;

#[derive(Debug, Clone, Copy)]
pub struct BreakerConfig {
    pub failure_threshold: u32,
    pub failure_window: StdDuration,
    pub cooldown: StdDuration,
    pub success_probe_count: u32,
    pub half_open_probe_quota: u32,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            failure_window: StdDuration::from_secs(30),
            cooldown: StdDuration::from_secs(15),
            success_probe_count: 2,
            half_open_probe_quota: 1,
        }
    }
}

struct ToolBreaker {
    state: BreakerState,
    /// Monotonic instants of failures within `failure_window`, oldest first.
    recent_failures: VecDeque<Instant>,
    opened_at_instant: Option<Instant>,
}

impl Default for ToolBreaker {
    fn default() -> Self {
        Self { state: BreakerState::default(), recent_failures: VecDeque::new(), opened_at_instant: None }
    }
}

/// Per-tool circuit breaker registry (spec §3, §4.6).
pub struct CircuitBreaker {
    config: BreakerConfig,
    tools: DashMap<String, Arc<Mutex<ToolBreaker>>>,
}

impl CircuitBreaker {
    pub fn new(config: BreakerConfig) -> Self {
        Self { config, tools: DashMap::new() }
    }

    fn entry(&self, tool: &str) -> Arc<Mutex<ToolBreaker>> {
        self.tools.entry(tool.to_string()).or_default().clone()
    }

    /// Call before invoking the adapter. Returns `Err(BreakerOpen)` without
    /// touching the adapter when the breaker is open and the cooldown has
    /// not elapsed, or transitions it to half-open and admits one probe.
    pub fn admit(&self, tool: &str) -> Result<(), GatewayError> {
        let entry = self.entry(tool);
        let mut guard = entry.lock();

        if guard.state.state == BreakerStateKind::Open {
            let elapsed = guard.opened_at_instant.map(|t| t.elapsed()).unwrap_or(StdDuration::MAX);
            if elapsed < self.config.cooldown {
                obs::breaker_fastfail(tool);
                return Err(GatewayError::BreakerOpen { tool: tool.to_string() });
            }
            guard.state.state = BreakerStateKind::HalfOpen;
            guard.state.half_open_successes = 0;
            guard.state.half_open_probes_issued = 0;
            obs::breaker_state_changed(tool, BreakerStateKind::HalfOpen);
        }

        if guard.state.state == BreakerStateKind::HalfOpen {
            if guard.state.half_open_probes_issued >= self.config.half_open_probe_quota {
                obs::breaker_fastfail(tool);
                return Err(GatewayError::BreakerOpen { tool: tool.to_string() });
            }
            guard.state.half_open_probes_issued += 1;
        }

        Ok(())
    }

    pub fn record_success(&self, tool: &str) {
        let entry = self.entry(tool);
        let mut guard = entry.lock();
        match guard.state.state {
            BreakerStateKind::Closed => {
                guard.recent_failures.clear();
            }
            BreakerStateKind::HalfOpen => {
                guard.state.half_open_successes += 1;
                if guard.state.half_open_successes >= self.config.success_probe_count {
                    guard.state.state = BreakerStateKind::Closed;
                    guard.state.failures = 0;
                    guard.recent_failures.clear();
                    guard.opened_at_instant = None;
                    obs::breaker_state_changed(tool, BreakerStateKind::Closed);
                }
            }
            BreakerStateKind::Open => {}
        }
    }

    pub fn record_failure(&self, tool: &str) {
        let entry = self.entry(tool);
        let mut guard = entry.lock();
        let now = Instant::now();

        match guard.state.state {
            BreakerStateKind::HalfOpen => {
                self.open(&mut guard, tool, now);
            }
            BreakerStateKind::Closed => {
                guard.recent_failures.push_back(now);
                while let Some(&front) = guard.recent_failures.front() {
                    if now.duration_since(front) > self.config.failure_window {
                        guard.recent_failures.pop_front();
                    } else {
                        break;
                    }
                }
                guard.state.failures = guard.recent_failures.len() as u32;
                guard.state.last_failure_at = Some(Utc::now());
                if guard.state.failures >= self.config.failure_threshold {
                    self.open(&mut guard, tool, now);
                }
            }
            BreakerStateKind::Open => {}
        }
    }

    fn open(&self, guard: &mut ToolBreaker, tool: &str, now: Instant) {
        guard.state.state = BreakerStateKind::Open;
        guard.state.opened_at = Some(Utc::now());
        guard.opened_at_instant = Some(now);
        obs::breaker_state_changed(tool, BreakerStateKind::Open);
    }

    pub fn snapshot(&self, tool: &str) -> BreakerState {
        self.entry(tool).lock().state.clone()
    }
}
