// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use std::sync::Arc;
use std::time::Duration;

use aegis_gateway::application::credential_vault::CredentialVault;
use aegis_gateway::application::orchestrator::{FeatureFlags, Orchestrator};
use aegis_gateway::application::policy_engine::PolicyEngine;
use aegis_gateway::application::token_service::TokenService;
use aegis_gateway::config::Config;
use aegis_gateway::infrastructure::adapters::registry::AdapterRegistry;
use aegis_gateway::infrastructure::chaos::ChaosInjector;
use aegis_gateway::infrastructure::observability;
use aegis_gateway::infrastructure::repositories::memory::{
    InMemoryAgentRepository, InMemoryAuditRepository, InMemoryCredentialRepository, InMemoryPolicyRepository,
    InMemoryQuotaRepository, InMemoryTokenRegistryRepository, InMemoryTokenRepository,
};
use aegis_gateway::presentation::api;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;
    observability::init(std::env::var("LOG_FORMAT").as_deref() == Ok("json"))?;

    if config.is_test_bypass_unsafe() {
        tracing::warn!("starting with FF_TEST_BYPASS enabled against a live upstream; readiness will report degraded");
    }

    let agent_repo = Arc::new(InMemoryAgentRepository::new());
    let token_repo = Arc::new(InMemoryTokenRepository::new());
    let registry_repo = Arc::new(InMemoryTokenRegistryRepository::new());
    let policy_repo = Arc::new(InMemoryPolicyRepository::new());
    let quota_repo = Arc::new(InMemoryQuotaRepository::new());
    let credential_repo = Arc::new(InMemoryCredentialRepository::new());
    let audit_repo = Arc::new(InMemoryAuditRepository::new());

    let token_service = Arc::new(TokenService::new(config.signing_secret.clone(), agent_repo, token_repo, registry_repo));
    let policy_engine = Arc::new(PolicyEngine::new(policy_repo, quota_repo, config.default_timezone.clone()));
    let credential_vault = Arc::new(CredentialVault::new(&config.kek_base64, credential_repo)?);

    let chaos = Arc::new(ChaosInjector::new());
    chaos.set_enabled(config.ff_chaos);
    let http_client = reqwest::Client::builder().timeout(Duration::from_millis(config.http_timeout_ms)).build()?;
    let adapters = Arc::new(AdapterRegistry::new(config.upstream_mode, http_client, chaos));

    let flags = FeatureFlags {
        policy: config.ff_policy,
        breakers: config.ff_breakers,
        retry: config.ff_retry,
        cache: config.ff_cache,
    };

    let orchestrator = Arc::new(Orchestrator::new(
        token_service,
        policy_engine,
        credential_vault,
        adapters,
        audit_repo,
        flags,
        Duration::from_millis(config.http_timeout_ms),
        Duration::from_secs(30),
        Duration::from_millis(config.pipeline_deadline_ms),
    ));

    let app = api::router(orchestrator.clone());

    let addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string());
    let listener = tokio::net::TcpListener::bind(addr.as_str()).await?;
    tracing::info!(%addr, "aegis-gatewayd listening");

    let shutdown = async {
        let _ = tokio::signal::ctrl_c().await;
        tracing::info!("shutdown signal received, draining in-flight requests");
        orchestrator.begin_draining();
        tokio::time::sleep(orchestrator.drain_deadline()).await;
    };

    axum::serve(listener, app).with_graceful_shutdown(shutdown).await?;
    Ok(())
}
