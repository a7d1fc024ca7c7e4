// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//
// Thin, typed wrappers around the `metrics` macros (spec §4.9) so call sites
// elsewhere in the crate never hand-assemble label sets. Every counter,
// histogram and gauge named in §4.9 has exactly one home here.

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram, Unit};

use crate::domain::breaker::BreakerStateKind;
use crate::error::PolicyDenialKind;

const DURATION_BUCKETS: &[f64] = &[25.0, 50.0, 100.0, 200.0, 400.0, 800.0, 1600.0, 3200.0, 6400.0];

pub fn describe_all() {
    describe_counter!("requests_total", Unit::Count, "Completed requests by tool, action and response code");
    describe_counter!("cache_hits_total", Unit::Count, "Cache hits serving a request without invoking the adapter");
    describe_counter!("retries_total", Unit::Count, "Upstream call retries");
    describe_counter!("breaker_fastfail_total", Unit::Count, "Requests fast-failed by an open circuit breaker");
    describe_counter!("policy_denials_total", Unit::Count, "Requests denied by the policy engine, by denial kind");
    describe_counter!("token_generations_total", Unit::Count, "Tokens issued");
    describe_counter!("token_validations_total", Unit::Count, "Token validation attempts");
    describe_counter!("token_expirations_total", Unit::Count, "Token validations rejected for expiry");
    describe_counter!("chaos_injections_total", Unit::Count, "Chaos faults injected into an upstream call");
    describe_counter!("chaos_clearings_total", Unit::Count, "Chaos schedule entries cleared for a tool");
    describe_counter!("rate_limited_total", Unit::Count, "Requests denied by the per-agent rate limiter");
    describe_histogram!("request_duration_ms", Unit::Milliseconds, "End-to-end pipeline duration");
    describe_gauge!("breaker_state", Unit::Count, "Circuit breaker state per tool: 0=closed 1=half_open 2=open");
    describe_gauge!("active_connections", Unit::Count, "In-flight requests currently admitted into the pipeline");
}

pub fn request_completed(tool: &str, action: &str, status_code: u16, duration_ms: f64) {
    counter!(
        "requests_total",
        "tool" => tool.to_string(),
        "action" => action.to_string(),
        "code" => status_code.to_string(),
    )
    .increment(1);
    histogram!("request_duration_ms", "tool" => tool.to_string(), "action" => action.to_string())
        .record(duration_ms.min(*DURATION_BUCKETS.last().unwrap()));
}

pub fn cache_hit(tool: &str, action: &str) {
    counter!("cache_hits_total", "tool" => tool.to_string(), "action" => action.to_string()).increment(1);
}

/// `reason` is the `GatewayError::kind()` of the error that triggered the retry.
pub fn retry_attempted(tool: &str, action: &str, reason: &'static str) {
    counter!(
        "retries_total",
        "tool" => tool.to_string(),
        "action" => action.to_string(),
        "reason" => reason,
    )
    .increment(1);
}

pub fn breaker_fastfail(tool: &str) {
    counter!("breaker_fastfail_total", "tool" => tool.to_string()).increment(1);
}

pub fn breaker_state_changed(tool: &str, state: BreakerStateKind) {
    gauge!("breaker_state", "tool" => tool.to_string()).set(state.gauge_value());
}

pub fn policy_denial(kind: PolicyDenialKind) {
    counter!("policy_denials_total", "kind" => kind.to_string()).increment(1);
}

pub fn token_issued(agent_id: &str) {
    counter!("token_generations_total", "agent_id" => agent_id.to_string()).increment(1);
}

/// `outcome` is a low-cardinality label such as `"ok"` or `"signature_mismatch"`.
pub fn token_validation(outcome: &'static str) {
    counter!("token_validations_total", "outcome" => outcome).increment(1);
}

pub fn token_expired() {
    counter!("token_expirations_total").increment(1);
}

pub fn chaos_injected(tool: &str, mode: &str) {
    counter!("chaos_injections_total", "tool" => tool.to_string(), "mode" => mode.to_string()).increment(1);
}

pub fn chaos_cleared(tool: &str) {
    counter!("chaos_clearings_total", "tool" => tool.to_string()).increment(1);
}

pub fn rate_limited(agent_id: &str) {
    counter!("rate_limited_total", "agent_id" => agent_id.to_string()).increment(1);
}

pub fn connection_opened() {
    gauge!("active_connections").increment(1.0);
}

pub fn connection_closed() {
    gauge!("active_connections").decrement(1.0);
}
