// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Circuit breaker state machine for one tool (spec §3, §4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BreakerStateKind {
    Closed,
    HalfOpen,
    Open,
}

impl BreakerStateKind {
    /// Gauge value exported as `breaker_state{tool}` (spec §4.9).
    pub fn gauge_value(self) -> f64 {
        match self {
            BreakerStateKind::Closed => 0.0,
            BreakerStateKind::HalfOpen => 1.0,
            BreakerStateKind::Open => 2.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BreakerState {
    pub state: BreakerStateKind,
    pub failures: u32,
    pub last_failure_at: Option<DateTime<Utc>>,
    pub opened_at: Option<DateTime<Utc>>,
    /// Consecutive successes observed while half-open; reset on any failure.
    pub half_open_successes: u32,
    /// Probes admitted this half-open period; bounded by `probe_quota`.
    pub half_open_probes_issued: u32,
}

impl Default for BreakerState {
    fn default() -> Self {
        Self {
            state: BreakerStateKind::Closed,
            failures: 0,
            last_failure_at: None,
            opened_at: None,
            half_open_successes: 0,
            half_open_probes_issued: 0,
        }
    }
}
