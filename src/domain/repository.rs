// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//
// Repository pattern: one narrow trait per aggregate root (spec §4.3, §9).
// The persistent store itself is an external collaborator (spec §1); these
// traits are the only contract the core requires of it. The default
// implementations in `infrastructure::repositories` are in-process and
// single-node; a relational backing is compatible as long as it honours the
// two transactional operations called out below.

use async_trait::async_trait;
use thiserror::Error;

use super::agent::{Agent, AgentId};
use super::audit::AuditLogEntry;
use super::credential::{CredentialId, ToolCredential};
use super::policy::{PolicyBinding, PolicyId, PolicyRecord, QuotaCounter};
use super::token::{TokenId, TokenRecord, TokenRegistryEntry};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("entity not found: {0}")]
    NotFound(String),
    #[error("storage backend error: {0}")]
    Backend(String),
}

#[async_trait]
pub trait AgentRepository: Send + Sync {
    async fn save(&self, agent: Agent) -> Result<(), StoreError>;
    async fn find_by_id(&self, id: AgentId) -> Result<Option<Agent>, StoreError>;
}

#[async_trait]
pub trait TokenRepository: Send + Sync {
    async fn save(&self, record: TokenRecord) -> Result<(), StoreError>;
    async fn find_by_id(&self, id: TokenId) -> Result<Option<TokenRecord>, StoreError>;
    async fn revoke(&self, id: TokenId) -> Result<(), StoreError>;
}

#[async_trait]
pub trait TokenRegistryRepository: Send + Sync {
    async fn save(&self, entry: TokenRegistryEntry) -> Result<(), StoreError>;
    async fn find_by_token_id(&self, id: TokenId) -> Result<Option<TokenRegistryEntry>, StoreError>;
    async fn revoke(&self, id: TokenId) -> Result<(), StoreError>;
}

#[async_trait]
pub trait PolicyRepository: Send + Sync {
    async fn save(&self, record: PolicyRecord) -> Result<(), StoreError>;
    async fn find_for_binding(&self, binding: &PolicyBinding) -> Result<Vec<PolicyRecord>, StoreError>;
}

/// Quota counters require the one genuinely transactional operation in this
/// core beyond credential activation (spec §4.3, §5): a single atomic
/// increment-and-compare-against-limit, auto-resetting the window boundary.
#[async_trait]
pub trait QuotaRepository: Send + Sync {
    /// Atomically increments the counter for `(policy_id, quota_key)`,
    /// creating/resetting it if absent or past `reset_at`, and returns the
    /// post-increment counter. Callers compare `current` against the rule's
    /// `limit` themselves (the repository has no notion of the limit).
    async fn increment(
        &self,
        policy_id: PolicyId,
        quota_key: &str,
        window: chrono::Duration,
        now: chrono::DateTime<chrono::Utc>,
    ) -> Result<QuotaCounter, StoreError>;
}

#[async_trait]
pub trait CredentialRepository: Send + Sync {
    async fn save(&self, credential: ToolCredential) -> Result<(), StoreError>;
    async fn find_by_id(&self, id: CredentialId) -> Result<Option<ToolCredential>, StoreError>;
    async fn find_active(&self, tool: &str) -> Result<Option<ToolCredential>, StoreError>;
    async fn list(&self, tool: &str) -> Result<Vec<ToolCredential>, StoreError>;
    /// Atomically flips `target` to active and every other credential of the
    /// same tool to inactive (spec §3, §4.2 invariant).
    async fn activate(&self, target: CredentialId) -> Result<(), StoreError>;
    async fn delete(&self, id: CredentialId) -> Result<(), StoreError>;
}

#[async_trait]
pub trait AuditRepository: Send + Sync {
    async fn record(&self, entry: AuditLogEntry) -> Result<(), StoreError>;
}
