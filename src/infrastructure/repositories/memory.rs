// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//
// Reference, single-process repository implementations (spec §4.3). The
// persistent store is an external collaborator per spec §1; these exist so
// the core is runnable and testable without one. Everything here is
// eventually-consistent except `QuotaRepository::increment` and
// `CredentialRepository::activate`, which are the two operations spec §4.3
// calls out as genuinely transactional.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;

use crate::domain::agent::{Agent, AgentId};
use crate::domain::audit::AuditLogEntry;
use crate::domain::credential::{CredentialId, ToolCredential};
use crate::domain::policy::{PolicyBinding, PolicyId, PolicyRecord, QuotaCounter};
use crate::domain::repository::*;
use crate::domain::token::{TokenId, TokenRecord, TokenRegistryEntry};

#[derive(Default)]
pub struct InMemoryAgentRepository {
    agents: DashMap<AgentId, Agent>,
}

impl InMemoryAgentRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AgentRepository for InMemoryAgentRepository {
    async fn save(&self, agent: Agent) -> Result<(), StoreError> {
        self.agents.insert(agent.id, agent);
        Ok(())
    }

    async fn find_by_id(&self, id: AgentId) -> Result<Option<Agent>, StoreError> {
        Ok(self.agents.get(&id).map(|a| a.clone()))
    }
}

#[derive(Default)]
pub struct InMemoryTokenRepository {
    tokens: DashMap<TokenId, TokenRecord>,
}

impl InMemoryTokenRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TokenRepository for InMemoryTokenRepository {
    async fn save(&self, record: TokenRecord) -> Result<(), StoreError> {
        self.tokens.insert(record.id, record);
        Ok(())
    }

    async fn find_by_id(&self, id: TokenId) -> Result<Option<TokenRecord>, StoreError> {
        Ok(self.tokens.get(&id).map(|t| t.clone()))
    }

    async fn revoke(&self, id: TokenId) -> Result<(), StoreError> {
        let mut entry = self.tokens.get_mut(&id).ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        entry.revoked = true;
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryTokenRegistryRepository {
    entries: DashMap<TokenId, TokenRegistryEntry>,
}

impl InMemoryTokenRegistryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TokenRegistryRepository for InMemoryTokenRegistryRepository {
    async fn save(&self, entry: TokenRegistryEntry) -> Result<(), StoreError> {
        self.entries.insert(entry.token_id, entry);
        Ok(())
    }

    async fn find_by_token_id(&self, id: TokenId) -> Result<Option<TokenRegistryEntry>, StoreError> {
        Ok(self.entries.get(&id).map(|e| e.clone()))
    }

    async fn revoke(&self, id: TokenId) -> Result<(), StoreError> {
        let mut entry = self.entries.get_mut(&id).ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        entry.is_revoked = true;
        entry.revoked_at = Some(Utc::now());
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryPolicyRepository {
    records: DashMap<PolicyId, PolicyRecord>,
}

impl InMemoryPolicyRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PolicyRepository for InMemoryPolicyRepository {
    async fn save(&self, record: PolicyRecord) -> Result<(), StoreError> {
        self.records.insert(record.id, record);
        Ok(())
    }

    async fn find_for_binding(&self, binding: &PolicyBinding) -> Result<Vec<PolicyRecord>, StoreError> {
        Ok(self.records.iter().filter(|r| &r.binding == binding).map(|r| r.value().clone()).collect())
    }
}

/// Per-`(policy_id, quota_key)` counters, each behind its own lock so
/// concurrent increments on different keys never contend (spec §5).
#[derive(Default)]
pub struct InMemoryQuotaRepository {
    counters: DashMap<(PolicyId, String), Arc<Mutex<QuotaCounter>>>,
}

impl InMemoryQuotaRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl QuotaRepository for InMemoryQuotaRepository {
    async fn increment(
        &self,
        policy_id: PolicyId,
        quota_key: &str,
        window: Duration,
        now: DateTime<Utc>,
    ) -> Result<QuotaCounter, StoreError> {
        let slot = self
            .counters
            .entry((policy_id, quota_key.to_string()))
            .or_insert_with(|| {
                Arc::new(Mutex::new(QuotaCounter {
                    id: uuid::Uuid::new_v4(),
                    policy_id,
                    quota_key: quota_key.to_string(),
                    current: 0,
                    reset_at: now + window,
                }))
            })
            .clone();

        let mut counter = slot.lock();
        if now >= counter.reset_at {
            counter.current = 0;
            counter.reset_at = now + window;
        }
        counter.current += 1;
        Ok(counter.clone())
    }
}

#[derive(Default)]
pub struct InMemoryCredentialRepository {
    credentials: DashMap<CredentialId, ToolCredential>,
    /// Serializes activation per tool (spec §4.2, §5: activations are
    /// serialized per tool).
    activation_locks: DashMap<String, Arc<Mutex<()>>>,
}

impl InMemoryCredentialRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_for(&self, tool: &str) -> Arc<Mutex<()>> {
        self.activation_locks.entry(tool.to_string()).or_insert_with(|| Arc::new(Mutex::new(()))).clone()
    }
}

#[async_trait]
impl CredentialRepository for InMemoryCredentialRepository {
    async fn save(&self, credential: ToolCredential) -> Result<(), StoreError> {
        self.credentials.insert(credential.id, credential);
        Ok(())
    }

    async fn find_by_id(&self, id: CredentialId) -> Result<Option<ToolCredential>, StoreError> {
        Ok(self.credentials.get(&id).map(|c| c.clone()))
    }

    async fn find_active(&self, tool: &str) -> Result<Option<ToolCredential>, StoreError> {
        Ok(self.credentials.iter().find(|c| c.tool == tool && c.is_active).map(|c| c.clone()))
    }

    async fn list(&self, tool: &str) -> Result<Vec<ToolCredential>, StoreError> {
        Ok(self.credentials.iter().filter(|c| c.tool == tool).map(|c| c.clone()).collect())
    }

    async fn activate(&self, target: CredentialId) -> Result<(), StoreError> {
        let tool = self
            .credentials
            .get(&target)
            .map(|c| c.tool.clone())
            .ok_or_else(|| StoreError::NotFound(target.0.to_string()))?;

        let lock = self.lock_for(&tool);
        let _guard = lock.lock();

        for mut entry in self.credentials.iter_mut() {
            if entry.tool == tool {
                if entry.id == target {
                    entry.activate();
                } else if entry.is_active {
                    entry.deactivate();
                }
            }
        }
        Ok(())
    }

    async fn delete(&self, id: CredentialId) -> Result<(), StoreError> {
        self.credentials.remove(&id).ok_or_else(|| StoreError::NotFound(id.0.to_string()))?;
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryAuditRepository {
    entries: Mutex<Vec<AuditLogEntry>>,
}

impl InMemoryAuditRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> Vec<AuditLogEntry> {
        self.entries.lock().clone()
    }
}

#[async_trait]
impl AuditRepository for InMemoryAuditRepository {
    async fn record(&self, entry: AuditLogEntry) -> Result<(), StoreError> {
        self.entries.lock().push(entry);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn quota_increment_auto_resets_past_window_boundary() {
        let repo = InMemoryQuotaRepository::new();
        let policy_id = PolicyId::new();
        let t0 = Utc::now();
        let first = repo.increment(policy_id, "serpapi:search|OneHour", Duration::hours(1), t0).await.unwrap();
        assert_eq!(first.current, 1);

        let past_reset = first.reset_at + Duration::seconds(1);
        let after_reset = repo.increment(policy_id, "serpapi:search|OneHour", Duration::hours(1), past_reset).await.unwrap();
        assert_eq!(after_reset.current, 1);
    }

    #[tokio::test]
    async fn activation_deactivates_prior_active_credential() {
        let repo = InMemoryCredentialRepository::new();
        let c1 = ToolCredential::new("openai".to_string(), 1, "blob1".to_string(), None);
        let c2 = ToolCredential::new("openai".to_string(), 2, "blob2".to_string(), None);
        let (id1, id2) = (c1.id, c2.id);
        repo.save(c1).await.unwrap();
        repo.save(c2).await.unwrap();

        repo.activate(id1).await.unwrap();
        assert!(repo.find_by_id(id1).await.unwrap().unwrap().is_active);

        repo.activate(id2).await.unwrap();
        assert!(!repo.find_by_id(id1).await.unwrap().unwrap().is_active);
        assert!(repo.find_by_id(id2).await.unwrap().unwrap().is_active);
    }
}
