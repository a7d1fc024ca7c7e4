// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//
// Request orchestrator (spec §4.8): one pipeline per request, stages
// executed strictly in order. Any stage may fail the whole request; the
// first failure short-circuits, is mapped to a `GatewayError`, and produces
// exactly one `AuditLogEntry`.
//
// ```
// RECEIVED -> AUTHENTICATED -> POLICY_ALLOWED -> RATE_LIMIT_CONSUMED
//          -> CACHE_CHECKED  -> ADAPTER_INVOKED -> FILTERED -> RESPONDED
// ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use dashmap::DashMap;
use serde_json::Value;
use uuid::Uuid;

use crate::application::credential_vault::CredentialVault;
use crate::application::policy_engine::PolicyEngine;
use crate::application::token_service::TokenService;
use crate::domain::audit::AuditLogEntry;
use crate::domain::repository::AuditRepository;
use crate::domain::token::TokenId;
use crate::error::GatewayError;
use crate::infrastructure::adapters::registry::AdapterRegistry;
use crate::infrastructure::observability::correlation::CorrelationId;
use crate::infrastructure::observability::metrics as obs;
use crate::infrastructure::resilience::{retry::retry_with_backoff, timeout::with_timeout, BreakerConfig, CircuitBreaker, RetryConfig};
use crate::infrastructure::resilience::cache::ResponseCache;
use crate::infrastructure::resilience::rate_limiter::AgentRateLimiter;

pub struct ToolRequest {
    pub agent_token: String,
    pub token_id: Option<TokenId>,
    pub proof_payload: Option<Vec<u8>>,
    pub tool: String,
    pub action: String,
    pub params: Value,
    pub caller_intent: Option<String>,
    pub idempotency_key: Option<String>,
}

pub struct ToolResponseMeta {
    pub agent_id: Uuid,
    pub agent_name: String,
    pub tool: String,
    pub action: String,
    pub response_time_ms: u64,
}

pub struct ToolResponse {
    pub data: Value,
    pub metadata: ToolResponseMeta,
    pub correlation_id: CorrelationId,
    pub rotation_recommended: bool,
    pub token_expires_at: chrono::DateTime<Utc>,
}

pub struct FeatureFlags {
    pub policy: bool,
    pub breakers: bool,
    pub retry: bool,
    pub cache: bool,
}

pub struct Orchestrator {
    token_service: Arc<TokenService>,
    policy_engine: Arc<PolicyEngine>,
    credential_vault: Arc<CredentialVault>,
    adapters: Arc<AdapterRegistry>,
    cache: Arc<ResponseCache>,
    breaker: Arc<CircuitBreaker>,
    rate_limiter: Arc<AgentRateLimiter>,
    audit_repo: Arc<dyn AuditRepository>,
    flags: FeatureFlags,
    http_timeout: Duration,
    drain_deadline: Duration,
    /// Total pipeline budget per request (spec §5): cancellation propagates
    /// into adapter I/O and aborts retry sleeps by dropping the in-flight
    /// `execute_inner` future when this elapses.
    pipeline_deadline: Duration,
    draining: AtomicBool,
    /// `Idempotency-Key -> request fingerprint` seen so far (spec §6, §7:
    /// `IDEMPOTENCY_CONFLICT` when the same key is replayed with a different
    /// body). Unbounded for the lifetime of the process; a production
    /// deployment would back this with the same TTL'd store as the cache.
    idempotency_keys: DashMap<String, String>,
}

impl Orchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        token_service: Arc<TokenService>,
        policy_engine: Arc<PolicyEngine>,
        credential_vault: Arc<CredentialVault>,
        adapters: Arc<AdapterRegistry>,
        audit_repo: Arc<dyn AuditRepository>,
        flags: FeatureFlags,
        http_timeout: Duration,
        drain_deadline: Duration,
        pipeline_deadline: Duration,
    ) -> Self {
        Self {
            token_service,
            policy_engine,
            credential_vault,
            adapters,
            cache: Arc::new(ResponseCache::default()),
            breaker: Arc::new(CircuitBreaker::new(BreakerConfig::default())),
            rate_limiter: Arc::new(AgentRateLimiter::new(5, Duration::from_secs(60))),
            audit_repo,
            flags,
            http_timeout,
            drain_deadline,
            pipeline_deadline,
            draining: AtomicBool::new(false),
            idempotency_keys: DashMap::new(),
        }
    }

    /// Flips the draining flag. New requests are rejected with
    /// `SERVICE_UNAVAILABLE`; in-flight requests are not interrupted by this
    /// call (they race against `drain_deadline` in whatever supervises
    /// shutdown, not inside `execute` itself).
    pub fn begin_draining(&self) {
        self.draining.store(true, Ordering::SeqCst);
    }

    pub fn is_draining(&self) -> bool {
        self.draining.load(Ordering::SeqCst)
    }

    pub fn drain_deadline(&self) -> Duration {
        self.drain_deadline
    }

    pub async fn execute(&self, request: ToolRequest, correlation_id: CorrelationId) -> Result<ToolResponse, GatewayError> {
        let start = Instant::now();
        let mut result = match tokio::time::timeout(self.pipeline_deadline, self.execute_inner(&request, correlation_id)).await {
            Ok(result) => result,
            Err(_elapsed) => Err(GatewayError::Cancelled),
        };
        let duration_ms = start.elapsed().as_millis() as u64;
        if let Ok(response) = &mut result {
            response.metadata.response_time_ms = duration_ms;
        }

        let (status_code, error_kind, agent_id, policy_decision) = match &result {
            Ok(response) => (200u16, None, Some(response.metadata.agent_id), Some("allowed".to_string())),
            Err(err) => {
                let decision = match err {
                    GatewayError::PolicyDenied { kind, .. } => Some(kind.to_string()),
                    GatewayError::QuotaExceeded { .. } => Some(crate::error::PolicyDenialKind::Quota.to_string()),
                    _ => None,
                };
                (err.status_code(), Some(err.kind().to_string()), None, decision)
            }
        };

        obs::request_completed(&request.tool, &request.action, status_code, duration_ms as f64);

        let entry = AuditLogEntry {
            correlation_id: correlation_id.0,
            agent_id: agent_id.map(crate::domain::agent::AgentId),
            tool: request.tool.clone(),
            action: request.action.clone(),
            status_code,
            success: result.is_ok(),
            duration_ms,
            error_kind,
            policy_decision,
        };
        if let Err(e) = self.audit_repo.record(entry).await {
            tracing::error!(%correlation_id, error = %e, "failed to persist audit log entry");
        }

        result
    }

    async fn execute_inner(&self, request: &ToolRequest, correlation_id: CorrelationId) -> Result<ToolResponse, GatewayError> {
        if self.is_draining() {
            return Err(GatewayError::ServiceUnavailable);
        }

        // AUTHENTICATED
        let provenance = match (request.token_id, &request.proof_payload) {
            (Some(id), Some(proof)) => Some((id, proof.as_slice())),
            _ => None,
        };
        let validated = self.token_service.validate(&request.agent_token, provenance).await?;
        tracing::info!(%correlation_id, agent_id = %validated.agent.id, tool = %request.tool, action = %request.action, "authenticated");

        // POLICY_ALLOWED
        let spec = if self.flags.policy {
            let spec = self.policy_engine.merged_spec_for(&validated.agent).await?;
            self.policy_engine
                .evaluate(
                    &spec,
                    &request.tool,
                    &request.action,
                    &request.params,
                    request.caller_intent.as_deref(),
                    validated.agent.id.0,
                    Utc::now(),
                )
                .await?;
            spec
        } else {
            crate::domain::policy::PolicySpec::default()
        };

        // RATE_LIMIT_CONSUMED
        self.rate_limiter.check(validated.agent.id)?;

        let adapter = self.adapters.get(&request.tool)?;
        let descriptor = adapter
            .action(&request.action)
            .ok_or_else(|| GatewayError::Validation(format!("{} has no action '{}'", request.tool, request.action)))?;
        descriptor.validate_params(&request.params).map_err(GatewayError::Validation)?;

        let cache_key = ResponseCache::key(&request.tool, &request.action, &request.params);
        if let Some(idempotency_key) = &request.idempotency_key {
            self.check_idempotency(idempotency_key, &cache_key)?;
        }

        // CACHE_CHECKED
        if self.flags.cache && descriptor.cacheable {
            if let Some(cached) = self.cache.get(&request.tool, &request.action, &cache_key) {
                return Ok(self.finish(cached, &validated, request, correlation_id));
            }
        }

        let credential = if descriptor.needs_credential {
            Some(self.credential_vault.get_active(&request.tool).await?)
        } else {
            None
        };

        // ADAPTER_INVOKED
        let tool_for_retry = request.tool.clone();
        let data = if self.flags.breakers {
            self.breaker.admit(&request.tool)?;
            let invoke_result = self.invoke_with_retry(&tool_for_retry, &adapter, &request.action, &request.params, credential.as_deref()).await;
            match &invoke_result {
                Ok(_) => self.breaker.record_success(&request.tool),
                Err(e) if e.is_retryable() || matches!(e, GatewayError::Upstream5xx) => self.breaker.record_failure(&request.tool),
                Err(_) => {}
            }
            invoke_result?
        } else {
            self.invoke_with_retry(&tool_for_retry, &adapter, &request.action, &request.params, credential.as_deref()).await?
        };

        if self.flags.cache && descriptor.cacheable {
            self.cache.put(cache_key, data.clone(), descriptor.cache_ttl_secs);
        }

        // FILTERED
        let mut data = data;
        if let Some(filters) = &spec.response_filters {
            filters.apply(&mut data);
        }

        // RESPONDED
        Ok(self.finish(data, &validated, request, correlation_id))
    }

    /// Records the first fingerprint seen for `idempotency_key`; a later
    /// request reusing the key with a different fingerprint is rejected
    /// (spec §6, §7 `IDEMPOTENCY_CONFLICT`).
    fn check_idempotency(&self, idempotency_key: &str, fingerprint: &str) -> Result<(), GatewayError> {
        match self.idempotency_keys.entry(idempotency_key.to_string()) {
            dashmap::mapref::entry::Entry::Occupied(existing) => {
                if existing.get() != fingerprint {
                    return Err(GatewayError::IdempotencyConflict);
                }
                Ok(())
            }
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(fingerprint.to_string());
                Ok(())
            }
        }
    }

    async fn invoke_with_retry(
        &self,
        tool: &str,
        adapter: &Arc<dyn crate::infrastructure::adapters::ToolAdapter>,
        action: &str,
        params: &Value,
        credential: Option<&[u8]>,
    ) -> Result<Value, GatewayError> {
        let timeout = self.http_timeout;
        let run_once = || {
            let adapter = adapter.clone();
            let action = action.to_string();
            let params = params.clone();
            let credential_owned = credential.map(|c| c.to_vec());
            async move { with_timeout(timeout, adapter.invoke(&action, &params, credential_owned.as_deref())).await }
        };

        if self.flags.retry {
            retry_with_backoff(tool, action, RetryConfig::default(), run_once).await
        } else {
            run_once().await
        }
    }

    fn finish(&self, data: Value, validated: &crate::application::token_service::ValidatedToken, request: &ToolRequest, correlation_id: CorrelationId) -> ToolResponse {
        ToolResponse {
            data,
            metadata: ToolResponseMeta {
                agent_id: validated.agent.id.0,
                agent_name: validated.agent.name.clone(),
                tool: request.tool.clone(),
                action: request.action.clone(),
                response_time_ms: 0,
            },
            correlation_id,
            rotation_recommended: validated.record.needs_rotation(Utc::now()),
            token_expires_at: validated.record.expires_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::UpstreamMode;
    use crate::domain::agent::Agent;
    use crate::domain::policy::{PolicyBinding, PolicyRecord, PolicySpec};
    use crate::infrastructure::chaos::{ChaosInjector, ChaosMode, ChaosRule};
    use crate::infrastructure::repositories::memory::{
        InMemoryAgentRepository, InMemoryAuditRepository, InMemoryCredentialRepository, InMemoryPolicyRepository,
        InMemoryQuotaRepository, InMemoryTokenRegistryRepository, InMemoryTokenRepository,
    };
    use std::collections::HashSet;

    async fn build_with(
        chaos: Arc<ChaosInjector>,
        pipeline_deadline: Duration,
    ) -> (Orchestrator, Arc<TokenService>, crate::domain::agent::AgentId, Arc<InMemoryPolicyRepository>) {
        let agent_repo = Arc::new(InMemoryAgentRepository::new());
        let token_repo = Arc::new(InMemoryTokenRepository::new());
        let registry_repo = Arc::new(InMemoryTokenRegistryRepository::new());
        let policy_repo = Arc::new(InMemoryPolicyRepository::new());
        let quota_repo = Arc::new(InMemoryQuotaRepository::new());
        let credential_repo = Arc::new(InMemoryCredentialRepository::new());
        let audit_repo: Arc<dyn AuditRepository> = Arc::new(InMemoryAuditRepository::new());

        let agent = Agent::new("agent-a".to_string(), "admin".to_string(), "default".to_string(), "pem".to_string());
        let agent_id = agent.id;
        agent_repo.save(agent).await.unwrap();

        let mut scopes = HashSet::new();
        scopes.insert("serpapi:search".to_string());
        let spec = PolicySpec { scopes, ..Default::default() };
        policy_repo.save(PolicyRecord::new(PolicyBinding::Role("default".to_string()), spec)).await.unwrap();

        let token_service = Arc::new(TokenService::new("secret".to_string(), agent_repo, token_repo, registry_repo));
        let policy_engine = Arc::new(PolicyEngine::new(policy_repo.clone(), quota_repo, "UTC".to_string()));

        let kek = base64::Engine::encode(&base64::engine::general_purpose::STANDARD, [1u8; 32]);
        let credential_vault = CredentialVault::new(&kek, credential_repo).unwrap();
        let credential_id = credential_vault.create("serpapi".to_string(), 1, b"serpapi-test-key", None).await.unwrap();
        credential_vault.activate(credential_id).await.unwrap();
        let credential_vault = Arc::new(credential_vault);

        let adapters = Arc::new(AdapterRegistry::new(UpstreamMode::Mock, reqwest::Client::new(), chaos));

        let flags = FeatureFlags { policy: true, breakers: true, retry: true, cache: true };
        let orchestrator = Orchestrator::new(
            token_service.clone(),
            policy_engine,
            credential_vault,
            adapters,
            audit_repo,
            flags,
            Duration::from_secs(6),
            Duration::from_secs(30),
            pipeline_deadline,
        );

        (orchestrator, token_service, agent_id, policy_repo)
    }

    async fn build() -> (Orchestrator, Arc<TokenService>, crate::domain::agent::AgentId, Arc<InMemoryPolicyRepository>) {
        build_with(Arc::new(ChaosInjector::new()), Duration::from_secs(20)).await
    }

    fn request(token: String, tool: &str, action: &str, params: Value) -> ToolRequest {
        ToolRequest {
            agent_token: token,
            token_id: None,
            proof_payload: None,
            tool: tool.to_string(),
            action: action.to_string(),
            params,
            caller_intent: None,
            idempotency_key: None,
        }
    }

    #[tokio::test]
    async fn happy_path_executes_the_full_pipeline() {
        let (orchestrator, token_service, agent_id, _policy_repo) = build().await;
        let (_record, token) = token_service
            .issue(agent_id, vec!["serpapi".to_string()], vec![], Utc::now() + chrono::Duration::hours(1))
            .await
            .unwrap();

        let response = orchestrator
            .execute(request(token, "serpapi", "search", serde_json::json!({"q": "rust"})), CorrelationId::new())
            .await
            .unwrap();
        assert_eq!(response.metadata.tool, "serpapi");
        assert!(response.data["organic_results"][0]["title"].as_str().unwrap().contains("rust"));
    }

    #[tokio::test]
    async fn unscoped_tool_is_denied() {
        let (orchestrator, token_service, agent_id, _policy_repo) = build().await;
        let (_record, token) = token_service
            .issue(agent_id, vec!["serpapi".to_string()], vec![], Utc::now() + chrono::Duration::hours(1))
            .await
            .unwrap();

        let result = orchestrator
            .execute(request(token, "gmail_send", "send", serde_json::json!({"to":"a","subject":"b","body":"c"})), CorrelationId::new())
            .await;
        assert!(matches!(result, Err(GatewayError::PolicyDenied { .. })));
    }

    #[tokio::test]
    async fn reused_idempotency_key_with_a_different_body_conflicts() {
        let (orchestrator, token_service, agent_id, _policy_repo) = build().await;
        let (_record, token) = token_service
            .issue(agent_id, vec!["serpapi".to_string()], vec![], Utc::now() + chrono::Duration::hours(1))
            .await
            .unwrap();

        let mut first = request(token.clone(), "serpapi", "search", serde_json::json!({"q": "rust"}));
        first.idempotency_key = Some("key-1".to_string());
        orchestrator.execute(first, CorrelationId::new()).await.unwrap();

        let mut second = request(token, "serpapi", "search", serde_json::json!({"q": "different query"}));
        second.idempotency_key = Some("key-1".to_string());
        let result = orchestrator.execute(second, CorrelationId::new()).await;
        assert!(matches!(result, Err(GatewayError::IdempotencyConflict)));
    }

    #[tokio::test]
    async fn draining_rejects_new_requests() {
        let (orchestrator, token_service, agent_id, _policy_repo) = build().await;
        let (_record, token) = token_service
            .issue(agent_id, vec!["serpapi".to_string()], vec![], Utc::now() + chrono::Duration::hours(1))
            .await
            .unwrap();
        orchestrator.begin_draining();
        let result = orchestrator.execute(request(token, "serpapi", "search", serde_json::json!({"q": "rust"})), CorrelationId::new()).await;
        assert!(matches!(result, Err(GatewayError::ServiceUnavailable)));
    }

    #[tokio::test]
    async fn pipeline_deadline_cancels_a_request_stuck_in_a_chaos_sleep() {
        let chaos = Arc::new(ChaosInjector::new());
        chaos.set("serpapi", ChaosRule { mode: ChaosMode::Jitter, pct: 1.0 });
        let (orchestrator, token_service, agent_id, _policy_repo) = build_with(chaos, Duration::from_millis(20)).await;
        let (_record, token) = token_service
            .issue(agent_id, vec!["serpapi".to_string()], vec![], Utc::now() + chrono::Duration::hours(1))
            .await
            .unwrap();

        let result = orchestrator.execute(request(token, "serpapi", "search", serde_json::json!({"q": "rust"})), CorrelationId::new()).await;
        assert!(matches!(result, Err(GatewayError::Cancelled)));
    }
}
