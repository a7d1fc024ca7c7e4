// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::agent::AgentId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TokenId(pub Uuid);

impl TokenId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TokenId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TokenId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The signed payload embedded in every issued token (spec §4.4).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenPayload {
    pub token_id: TokenId,
    pub agent_id: AgentId,
    pub agent_name: String,
    pub tools: Vec<String>,
    pub permissions: Vec<String>,
    pub expires_at: DateTime<Utc>,
    pub nonce: Uuid,
    pub issued_at: DateTime<Utc>,
}

/// Per-issued-token record (spec §3). One-to-one with what the caller holds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenRecord {
    pub id: TokenId,
    pub agent_id: AgentId,
    pub opaque_token: String,
    pub expires_at: DateTime<Utc>,
    pub revoked: bool,
    pub issued_at: DateTime<Utc>,
}

impl TokenRecord {
    /// A token is valid iff not revoked and not yet expired (agent-active and
    /// signature checks happen separately in `TokenService::validate`).
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        !self.revoked && now < self.expires_at
    }

    /// Spec §4.4: the orchestrator recommends rotation once fewer than 15s
    /// remain before expiry.
    pub fn needs_rotation(&self, now: DateTime<Utc>) -> bool {
        (self.expires_at - now).num_seconds() < 15
    }
}

/// Provenance entry binding a `token_id` to the exact payload hash that was
/// signed (spec §3, §4.4).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenRegistryEntry {
    pub token_id: TokenId,
    pub agent_id: AgentId,
    pub payload_hash: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub is_revoked: bool,
    pub revoked_at: Option<DateTime<Utc>>,
}
