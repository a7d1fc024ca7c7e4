// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//
// End-to-end coverage of the HTTP entry point: builds the real orchestrator
// wiring (in-memory repositories, mock upstream adapters) and drives it
// through `presentation::api::router` with `tower::ServiceExt::oneshot`,
// the way the teacher's integration suite drives its workflow engine against
// real in-memory repositories rather than mocking the seam under test.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use aegis_gateway::application::credential_vault::CredentialVault;
use aegis_gateway::application::orchestrator::{FeatureFlags, Orchestrator};
use aegis_gateway::application::policy_engine::PolicyEngine;
use aegis_gateway::application::token_service::TokenService;
use aegis_gateway::config::UpstreamMode;
use aegis_gateway::domain::agent::Agent;
use aegis_gateway::domain::policy::{PolicyBinding, PolicyRecord, PolicySpec};
use aegis_gateway::infrastructure::adapters::registry::AdapterRegistry;
use aegis_gateway::infrastructure::chaos::ChaosInjector;
use aegis_gateway::infrastructure::repositories::memory::{
    InMemoryAgentRepository, InMemoryAuditRepository, InMemoryCredentialRepository, InMemoryPolicyRepository,
    InMemoryQuotaRepository, InMemoryTokenRegistryRepository, InMemoryTokenRepository,
};
use aegis_gateway::presentation::api;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use tower::ServiceExt;

async fn test_stack() -> (axum::Router, String) {
    let agent_repo = Arc::new(InMemoryAgentRepository::new());
    let token_repo = Arc::new(InMemoryTokenRepository::new());
    let registry_repo = Arc::new(InMemoryTokenRegistryRepository::new());
    let policy_repo = Arc::new(InMemoryPolicyRepository::new());
    let quota_repo = Arc::new(InMemoryQuotaRepository::new());
    let credential_repo = Arc::new(InMemoryCredentialRepository::new());
    let audit_repo = Arc::new(InMemoryAuditRepository::new());

    let agent = Agent::new("agent-a".to_string(), "admin".to_string(), "default".to_string(), "pem".to_string());
    let agent_id = agent.id;
    agent_repo.save(agent).await.unwrap();

    let mut scopes = HashSet::new();
    scopes.insert("serpapi:search".to_string());
    let spec = PolicySpec { scopes, ..Default::default() };
    policy_repo.save(PolicyRecord::new(PolicyBinding::Role("default".to_string()), spec)).await.unwrap();

    let token_service = Arc::new(TokenService::new("test-secret".to_string(), agent_repo, token_repo, registry_repo));
    let policy_engine = Arc::new(PolicyEngine::new(policy_repo, quota_repo, "UTC".to_string()));

    let kek = base64::Engine::encode(&base64::engine::general_purpose::STANDARD, [7u8; 32]);
    let credential_vault = CredentialVault::new(&kek, credential_repo).unwrap();
    let credential_id = credential_vault.create("serpapi".to_string(), 1, b"serpapi-test-key", None).await.unwrap();
    credential_vault.activate(credential_id).await.unwrap();

    let adapters = Arc::new(AdapterRegistry::new(UpstreamMode::Mock, reqwest::Client::new(), Arc::new(ChaosInjector::new())));

    let flags = FeatureFlags { policy: true, breakers: true, retry: true, cache: true };
    let orchestrator = Arc::new(Orchestrator::new(
        token_service.clone(),
        policy_engine,
        Arc::new(credential_vault),
        adapters,
        audit_repo,
        flags,
        Duration::from_secs(6),
        Duration::from_secs(30),
        Duration::from_secs(20),
    ));

    let (_, opaque_token) = token_service
        .issue(agent_id, vec!["serpapi".to_string()], vec![], chrono::Utc::now() + chrono::Duration::hours(1))
        .await
        .unwrap();

    (api::router(orchestrator), opaque_token)
}

#[tokio::test]
async fn invoking_a_permitted_tool_returns_200_with_correlation_header() {
    let (router, opaque_token) = test_stack().await;

    let body = serde_json::json!({
        "agent_token": opaque_token,
        "tool": "serpapi",
        "action": "search",
        "params": { "query": "rust async runtimes" },
    });

    let request = Request::builder()
        .method("POST")
        .uri("/v1/tools/invoke")
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(&body).unwrap()))
        .unwrap();

    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-correlation-id"));

    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let parsed: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(parsed["success"], true);
    assert_eq!(parsed["metadata"]["tool"], "serpapi");
}

#[tokio::test]
async fn invoking_an_unscoped_tool_returns_403() {
    let (router, opaque_token) = test_stack().await;

    let body = serde_json::json!({
        "agent_token": opaque_token,
        "tool": "gmail_send",
        "action": "send",
        "params": { "to": "nobody@example.com", "subject": "hi", "body": "hi" },
    });

    let request = Request::builder()
        .method("POST")
        .uri("/v1/tools/invoke")
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(&body).unwrap()))
        .unwrap();

    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn malformed_json_body_is_rejected_before_reaching_the_orchestrator() {
    let (router, _) = test_stack().await;

    let request = Request::builder()
        .method("POST")
        .uri("/v1/tools/invoke")
        .header("content-type", "application/json")
        .body(Body::from("not json"))
        .unwrap();

    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}
