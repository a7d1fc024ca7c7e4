// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use std::collections::HashSet;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::crypto::canonical::{canonical_json, sha256_hex};
use crate::error::{GatewayError, PolicyDenialKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PolicyId(pub Uuid);

impl PolicyId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for PolicyId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for PolicyId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QuotaWindow {
    #[serde(rename = "1h")]
    OneHour,
    #[serde(rename = "24h")]
    TwentyFourHours,
    #[serde(rename = "7d")]
    SevenDays,
}

impl QuotaWindow {
    pub fn duration(self) -> Duration {
        match self {
            QuotaWindow::OneHour => Duration::hours(1),
            QuotaWindow::TwentyFourHours => Duration::hours(24),
            QuotaWindow::SevenDays => Duration::days(7),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuotaRule {
    pub action: String,
    pub window: QuotaWindow,
    pub limit: u64,
}

impl QuotaRule {
    /// `"tool:action|window"` used as the `QuotaCounter` primary key (spec §3).
    pub fn quota_key(&self) -> String {
        format!("{}|{:?}", self.action, self.window)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: String, // "HH:MM"
    pub end: String,   // "HH:MM"
    pub timezone: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HourRange {
    pub start: u8,
    pub end: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schedule {
    pub enabled: bool,
    /// 0 = Sunday .. 6 = Saturday, matching `chrono::Weekday::num_days_from_sunday`.
    pub allowed_days: Vec<u8>,
    pub allowed_hours: HourRange,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Guards {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_request_size: Option<u64>,
    #[serde(default)]
    pub allowed_domains: HashSet<String>,
    #[serde(default)]
    pub blocked_domains: HashSet<String>,
    #[serde(default)]
    pub pii_filters: HashSet<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_window: Option<TimeWindow>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TruncateField {
    pub field: String,
    pub max_length: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResponseFilters {
    #[serde(default)]
    pub redact_fields: HashSet<String>,
    #[serde(default)]
    pub truncate_fields: Vec<TruncateField>,
    #[serde(default)]
    pub block_patterns: HashSet<String>,
}

impl ResponseFilters {
    /// Applies redaction, truncation and pattern-blocking to a response body
    /// in place (spec §4.8 FILTERED stage, spec §3 `response_filters`).
    /// Walks top-level object fields only; nested fields are addressed by
    /// dotted names the same way the field name is matched (exact match).
    pub fn apply(&self, value: &mut serde_json::Value) {
        let Some(obj) = value.as_object_mut() else { return };

        for field in &self.redact_fields {
            if let Some(v) = obj.get_mut(field) {
                *v = serde_json::Value::String("[REDACTED]".to_string());
            }
        }

        for truncate in &self.truncate_fields {
            if let Some(serde_json::Value::String(s)) = obj.get_mut(&truncate.field) {
                if s.len() > truncate.max_length {
                    s.truncate(truncate.max_length);
                }
            }
        }

        if self.block_patterns.is_empty() {
            return;
        }
        for (_, v) in obj.iter_mut() {
            if let serde_json::Value::String(s) = v {
                for pattern in &self.block_patterns {
                    if s.contains(pattern.as_str()) {
                        *s = s.replace(pattern.as_str(), "[BLOCKED]");
                    }
                }
            }
        }
    }
}

/// Declarative permission document (spec §3). Content-addressed by
/// `spec_hash` once wrapped in a `PolicyRecord`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PolicySpec {
    #[serde(default)]
    pub scopes: HashSet<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intent: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guards: Option<Guards>,
    #[serde(default)]
    pub quotas: Vec<QuotaRule>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schedule: Option<Schedule>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_filters: Option<ResponseFilters>,
}

impl PolicySpec {
    /// The default spec applied when an agent has no bound policies at all
    /// (spec §4.5): deny everything.
    pub fn default_deny() -> Self {
        Self {
            scopes: HashSet::new(),
            intent: Some("default_deny".to_string()),
            guards: None,
            quotas: Vec::new(),
            schedule: None,
            response_filters: None,
        }
    }

    /// Canonical-JSON SHA-256, used both as `PolicyRecord::spec_hash` and to
    /// detect drift in upstream tooling (spec §4.5).
    pub fn spec_hash(&self) -> String {
        let value = serde_json::to_value(self).expect("PolicySpec always serializes");
        sha256_hex(canonical_json(&value).as_bytes())
    }

    /// Merge role-bound policies (applied first) with agent-bound policies
    /// (applied last, so they override) per the rules in spec §4.5.
    pub fn merge(role_specs: &[PolicySpec], agent_specs: &[PolicySpec]) -> PolicySpec {
        let mut merged = PolicySpec::default();
        for spec in role_specs.iter().chain(agent_specs.iter()) {
            merged.merge_one(spec);
        }
        merged
    }

    fn merge_one(&mut self, other: &PolicySpec) {
        self.scopes.extend(other.scopes.iter().cloned());

        if let Some(intent) = &other.intent {
            if !intent.is_empty() {
                self.intent = Some(intent.clone());
            }
        }

        if let Some(other_guards) = &other.guards {
            let guards = self.guards.get_or_insert_with(Guards::default);
            guards.allowed_domains.extend(other_guards.allowed_domains.iter().cloned());
            guards.blocked_domains.extend(other_guards.blocked_domains.iter().cloned());
            guards.pii_filters.extend(other_guards.pii_filters.iter().cloned());
            if other_guards.max_request_size.is_some() {
                guards.max_request_size = other_guards.max_request_size;
            }
            if other_guards.time_window.is_some() {
                guards.time_window = other_guards.time_window.clone();
            }
        }

        self.quotas.extend(other.quotas.iter().cloned());

        if other.schedule.is_some() {
            self.schedule = other.schedule.clone();
        }

        if let Some(other_filters) = &other.response_filters {
            let filters = self.response_filters.get_or_insert_with(ResponseFilters::default);
            filters.redact_fields.extend(other_filters.redact_fields.iter().cloned());
            filters.block_patterns.extend(other_filters.block_patterns.iter().cloned());
            filters.truncate_fields.extend(other_filters.truncate_fields.iter().cloned());
        }
    }

    /// Scope check (spec §4.5 step 1).
    pub fn check_scope(&self, tool: &str, action: &str) -> Result<(), GatewayError> {
        let scope = format!("{tool}:{action}");
        if self.scopes.contains(&scope) {
            Ok(())
        } else {
            Err(GatewayError::PolicyDenied {
                kind: PolicyDenialKind::Scope,
                reason: format!("Scope '{scope}' not allowed for this agent"),
            })
        }
    }

    /// Intent check (spec §4.5 step 2).
    pub fn check_intent(&self, caller_intent: Option<&str>) -> Result<(), GatewayError> {
        match (&self.intent, caller_intent) {
            (Some(required), Some(got)) if !got.is_empty() => {
                if required == got {
                    Ok(())
                } else {
                    Err(GatewayError::PolicyDenied {
                        kind: PolicyDenialKind::Intent,
                        reason: format!("Required intent '{required}' does not match '{got}'"),
                    })
                }
            }
            (Some(required), _) => Err(GatewayError::PolicyDenied {
                kind: PolicyDenialKind::Intent,
                reason: format!("Required intent '{required}' was not presented"),
            }),
            (None, _) => Ok(()),
        }
    }

    /// Guard checks (spec §4.5 step 3): request size, domain allow/block list
    /// (for `http_fetch:get`), and the time-of-day window.
    pub fn check_guards(
        &self,
        tool: &str,
        action: &str,
        params: &serde_json::Value,
        now_local_hhmm: Option<&str>,
    ) -> Result<(), GatewayError> {
        let Some(guards) = &self.guards else { return Ok(()) };

        if let Some(max_size) = guards.max_request_size {
            let canonical = canonical_json(params);
            if canonical.len() as u64 > max_size {
                return Err(GatewayError::PolicyDenied {
                    kind: PolicyDenialKind::Size,
                    reason: format!("request size {} exceeds limit {}", canonical.len(), max_size),
                });
            }
        }

        if tool == "http_fetch" && action == "get" {
            if let Some(url) = params.get("url").and_then(|v| v.as_str()) {
                if let Ok(parsed) = url::Url::parse(url) {
                    let host = parsed.host_str().unwrap_or("").to_string();
                    if guards.blocked_domains.contains(&host) {
                        return Err(GatewayError::PolicyDenied {
                            kind: PolicyDenialKind::DomainBlocked,
                            reason: format!("domain '{host}' is blocked"),
                        });
                    }
                    if !guards.allowed_domains.is_empty() && !guards.allowed_domains.contains(&host) {
                        return Err(GatewayError::PolicyDenied {
                            kind: PolicyDenialKind::DomainNotAllowed,
                            reason: format!("domain '{host}' is not in the allowlist"),
                        });
                    }
                }
            }
        }

        if let (Some(window), Some(hhmm)) = (&guards.time_window, now_local_hhmm) {
            // Lexicographic HH:MM comparison per spec §4.5; does not handle
            // windows crossing midnight (flagged as an Open Question).
            if hhmm < window.start.as_str() || hhmm > window.end.as_str() {
                return Err(GatewayError::PolicyDenied {
                    kind: PolicyDenialKind::TimeWindow,
                    reason: format!("{hhmm} is outside allowed window [{}, {}]", window.start, window.end),
                });
            }
        }

        Ok(())
    }

    /// Schedule check (spec §4.5 step 4).
    pub fn check_schedule(&self, weekday: u8, hour: u8) -> Result<(), GatewayError> {
        let Some(schedule) = &self.schedule else { return Ok(()) };
        if !schedule.enabled {
            return Ok(());
        }
        if !schedule.allowed_days.contains(&weekday) {
            return Err(GatewayError::PolicyDenied {
                kind: PolicyDenialKind::Schedule,
                reason: format!("day-of-week {weekday} is not in the allowed schedule"),
            });
        }
        if hour < schedule.allowed_hours.start || hour > schedule.allowed_hours.end {
            return Err(GatewayError::PolicyDenied {
                kind: PolicyDenialKind::Schedule,
                reason: format!("hour {hour} is outside allowed hours [{}, {}]", schedule.allowed_hours.start, schedule.allowed_hours.end),
            });
        }
        Ok(())
    }

    /// Quotas whose `action` matches `"tool:action"` (spec §4.5 step 5). The
    /// actual atomic increment-and-check lives in `PolicyEngine` since it
    /// needs the repository; this just filters applicable rules.
    pub fn quotas_for(&self, tool: &str, action: &str) -> Vec<&QuotaRule> {
        let scope = format!("{tool}:{action}");
        self.quotas.iter().filter(|q| q.action == scope).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PolicyBinding {
    Agent(crate::domain::agent::AgentId),
    Role(String),
}

/// Persisted policy document (spec §3). Binds exactly one of `agent_id` / `role`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyRecord {
    pub id: PolicyId,
    pub binding: PolicyBinding,
    pub spec: PolicySpec,
    pub spec_hash: String,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PolicyRecord {
    pub fn new(binding: PolicyBinding, spec: PolicySpec) -> Self {
        let now = Utc::now();
        let spec_hash = spec.spec_hash();
        Self { id: PolicyId::new(), binding, spec, spec_hash, active: true, created_at: now, updated_at: now }
    }

    /// Recomputes `spec_hash` after a mutation (spec §3 invariant).
    pub fn set_spec(&mut self, spec: PolicySpec) {
        self.spec_hash = spec.spec_hash();
        self.spec = spec;
        self.updated_at = Utc::now();
    }
}

/// Per-`(policy_id, quota_key)` atomic counter (spec §3, §5).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuotaCounter {
    pub id: Uuid,
    pub policy_id: PolicyId,
    pub quota_key: String,
    pub current: u64,
    pub reset_at: DateTime<Utc>,
}

impl QuotaCounter {
    pub fn new_window(policy_id: PolicyId, quota_key: String, window: QuotaWindow, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            policy_id,
            quota_key,
            current: 0,
            reset_at: now + window.duration(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn spec_with_scope(scope: &str) -> PolicySpec {
        let mut scopes = HashSet::new();
        scopes.insert(scope.to_string());
        PolicySpec { scopes, ..Default::default() }
    }

    #[test]
    fn merge_unions_scopes_role_first_agent_last() {
        let role = spec_with_scope("serpapi:search");
        let agent = spec_with_scope("gmail_send:send");
        let merged = PolicySpec::merge(&[role], &[agent]);
        assert!(merged.scopes.contains("serpapi:search"));
        assert!(merged.scopes.contains("gmail_send:send"));
    }

    #[test]
    fn merge_agent_intent_overrides_role_intent() {
        let role = PolicySpec { intent: Some("role-intent".to_string()), ..Default::default() };
        let agent = PolicySpec { intent: Some("agent-intent".to_string()), ..Default::default() };
        let merged = PolicySpec::merge(&[role], &[agent]);
        assert_eq!(merged.intent.as_deref(), Some("agent-intent"));
    }

    #[test]
    fn scope_deny_matches_scenario_1() {
        let spec = spec_with_scope("serpapi:search");
        let err = spec.check_scope("gmail_send", "send").unwrap_err();
        assert!(matches!(err, GatewayError::PolicyDenied { kind: PolicyDenialKind::Scope, .. }));
    }

    #[test]
    fn max_request_size_off_by_one() {
        let mut spec = PolicySpec::default();
        let params = json!({"q": "foo"});
        let limit = canonical_json(&params).len() as u64;
        spec.guards = Some(Guards { max_request_size: Some(limit), ..Default::default() });
        assert!(spec.check_guards("serpapi", "search", &params, None).is_ok());

        spec.guards = Some(Guards { max_request_size: Some(limit - 1), ..Default::default() });
        assert!(spec.check_guards("serpapi", "search", &params, None).is_err());
    }

    #[test]
    fn spec_hash_is_stable_under_key_reorder() {
        let spec = spec_with_scope("serpapi:search");
        let value = serde_json::to_value(&spec).unwrap();
        let mut as_map: serde_json::Map<String, serde_json::Value> = value.as_object().unwrap().clone();
        let reordered: serde_json::Map<String, serde_json::Value> = as_map.drain().rev().collect();
        let hash_a = sha256_hex(canonical_json(&serde_json::Value::Object(as_map.clone())).as_bytes());
        let hash_b = sha256_hex(canonical_json(&serde_json::Value::Object(reordered)).as_bytes());
        assert_eq!(spec.spec_hash(), hash_a);
        assert_eq!(hash_a, hash_b);
    }

    #[test]
    fn response_filters_redact_and_truncate() {
        let filters = ResponseFilters {
            redact_fields: { let mut s = HashSet::new(); s.insert("api_key".to_string()); s },
            truncate_fields: vec![TruncateField { field: "body".to_string(), max_length: 5 }],
            block_patterns: HashSet::new(),
        };
        let mut value = json!({"api_key": "super-secret", "body": "0123456789"});
        filters.apply(&mut value);
        assert_eq!(value["api_key"], "[REDACTED]");
        assert_eq!(value["body"], "01234");
    }

    #[test]
    fn domain_guard_blocks_and_allows() {
        let mut guards = Guards::default();
        guards.blocked_domains.insert("evil.example".to_string());
        let spec = PolicySpec { guards: Some(guards), ..Default::default() };
        let blocked = json!({"url": "https://evil.example/x"});
        assert!(matches!(
            spec.check_guards("http_fetch", "get", &blocked, None).unwrap_err(),
            GatewayError::PolicyDenied { kind: PolicyDenialKind::DomainBlocked, .. }
        ));
    }
}
