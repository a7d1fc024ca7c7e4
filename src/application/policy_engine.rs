// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use std::sync::Arc;

use chrono::{DateTime, Datelike, Timelike, Utc};
use chrono_tz::Tz;

use crate::domain::agent::Agent;
use crate::domain::policy::{PolicyBinding, PolicySpec};
use crate::domain::repository::{PolicyRepository, QuotaRepository};
use crate::error::{GatewayError, PolicyDenialKind};
use crate::infrastructure::observability::metrics as obs;

pub struct PolicyEngine {
    policy_repo: Arc<dyn PolicyRepository>,
    quota_repo: Arc<dyn QuotaRepository>,
    default_timezone: String,
}

impl PolicyEngine {
    pub fn new(policy_repo: Arc<dyn PolicyRepository>, quota_repo: Arc<dyn QuotaRepository>, default_timezone: String) -> Self {
        Self { policy_repo, quota_repo, default_timezone }
    }

    /// Loads and merges every policy bound to `agent.role` (applied first)
    /// and `agent.id` (applied last, overriding) per spec §4.5. Absent any
    /// bound policy, returns the default-deny spec.
    pub async fn merged_spec_for(&self, agent: &Agent) -> Result<PolicySpec, GatewayError> {
        let role_records = self
            .policy_repo
            .find_for_binding(&PolicyBinding::Role(agent.role.clone()))
            .await
            .map_err(|e| GatewayError::Internal(e.to_string()))?;
        let agent_records = self
            .policy_repo
            .find_for_binding(&PolicyBinding::Agent(agent.id))
            .await
            .map_err(|e| GatewayError::Internal(e.to_string()))?;

        if role_records.is_empty() && agent_records.is_empty() {
            return Ok(PolicySpec::default_deny());
        }

        let role_specs: Vec<_> = role_records.into_iter().filter(|r| r.active).map(|r| r.spec).collect();
        let agent_specs: Vec<_> = agent_records.into_iter().filter(|r| r.active).map(|r| r.spec).collect();
        Ok(PolicySpec::merge(&role_specs, &agent_specs))
    }

    /// Runs the full evaluation order from spec §4.5: scope, intent, guards,
    /// schedule, then quotas. The first failing stage short-circuits and its
    /// `PolicyDenialKind` is counted toward `policy_denials_total{kind}`.
    pub async fn evaluate(
        &self,
        spec: &PolicySpec,
        tool: &str,
        action: &str,
        params: &serde_json::Value,
        caller_intent: Option<&str>,
        policy_id_for_quota: uuid::Uuid,
        now: DateTime<Utc>,
    ) -> Result<(), GatewayError> {
        let result = self.evaluate_inner(spec, tool, action, params, caller_intent, policy_id_for_quota, now).await;
        if let Err(GatewayError::PolicyDenied { kind, .. }) = &result {
            obs::policy_denial(*kind);
        } else if let Err(GatewayError::QuotaExceeded { .. }) = &result {
            obs::policy_denial(PolicyDenialKind::Quota);
        }
        result
    }

    async fn evaluate_inner(
        &self,
        spec: &PolicySpec,
        tool: &str,
        action: &str,
        params: &serde_json::Value,
        caller_intent: Option<&str>,
        policy_id_for_quota: uuid::Uuid,
        now: DateTime<Utc>,
    ) -> Result<(), GatewayError> {
        spec.check_scope(tool, action)?;
        spec.check_intent(caller_intent)?;

        let hhmm = spec
            .guards
            .as_ref()
            .and_then(|g| g.time_window.as_ref())
            .map(|w| local_hhmm(&w.timezone, now))
            .or_else(|| Some(local_hhmm(&self.default_timezone, now)));
        spec.check_guards(tool, action, params, hhmm.as_deref())?;

        if let Some(schedule) = &spec.schedule {
            if schedule.enabled {
                let tz: Tz = self.default_timezone.parse().unwrap_or(Tz::UTC);
                let local = now.with_timezone(&tz);
                let weekday = local.weekday().num_days_from_sunday() as u8;
                let hour = local.hour() as u8;
                spec.check_schedule(weekday, hour)?;
            }
        }

        for rule in spec.quotas_for(tool, action) {
            let policy_id = crate::domain::policy::PolicyId(policy_id_for_quota);
            let counter = self
                .quota_repo
                .increment(policy_id, &rule.quota_key(), rule.window.duration(), now)
                .await
                .map_err(|e| GatewayError::Internal(e.to_string()))?;
            if counter.current > rule.limit {
                return Err(GatewayError::QuotaExceeded {
                    current: counter.current,
                    limit: rule.limit,
                    reset_at: counter.reset_at,
                });
            }
        }

        Ok(())
    }
}

/// Local wall-clock `HH:MM` in `tz_name`, falling back to UTC for an
/// unrecognized timezone string rather than failing the request.
fn local_hhmm(tz_name: &str, now: DateTime<Utc>) -> String {
    let tz: Tz = tz_name.parse().unwrap_or(Tz::UTC);
    now.with_timezone(&tz).format("%H:%M").to_string()
}
