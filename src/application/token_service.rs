// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::crypto::canonical::{canonical_json, sha256_hex};
use crate::crypto::signature::{sign_token, split_token, verify_signature};
use crate::domain::agent::{Agent, AgentId};
use crate::domain::repository::{AgentRepository, TokenRegistryRepository, TokenRepository};
use crate::domain::token::{TokenId, TokenPayload, TokenRecord, TokenRegistryEntry};
use crate::error::GatewayError;
use crate::infrastructure::observability::metrics as obs;

/// Result of a successful `TokenService::validate` call: the caller's agent,
/// the decoded payload, and the stored record (so the orchestrator can check
/// rotation hints without a second lookup).
pub struct ValidatedToken {
    pub agent: Agent,
    pub payload: TokenPayload,
    pub record: TokenRecord,
}

pub struct TokenService {
    signing_secret: String,
    agent_repo: Arc<dyn AgentRepository>,
    token_repo: Arc<dyn TokenRepository>,
    registry_repo: Arc<dyn TokenRegistryRepository>,
}

impl TokenService {
    pub fn new(
        signing_secret: String,
        agent_repo: Arc<dyn AgentRepository>,
        token_repo: Arc<dyn TokenRepository>,
        registry_repo: Arc<dyn TokenRegistryRepository>,
    ) -> Self {
        Self { signing_secret, agent_repo, token_repo, registry_repo }
    }

    /// Issues a new token for `agent_id` (spec §4.4).
    pub async fn issue(
        &self,
        agent_id: AgentId,
        tools: Vec<String>,
        permissions: Vec<String>,
        expires_at: DateTime<Utc>,
    ) -> Result<(TokenRecord, String), GatewayError> {
        if expires_at <= Utc::now() {
            return Err(GatewayError::BadRequest("expires_at must be in the future".to_string()));
        }

        let agent = self
            .agent_repo
            .find_by_id(agent_id)
            .await
            .map_err(|e| GatewayError::Internal(e.to_string()))?
            .ok_or_else(|| GatewayError::BadRequest("unknown agent_id".to_string()))?;
        if !agent.is_active() {
            return Err(GatewayError::TokenAgentInactive);
        }

        let token_id = TokenId::new();
        let now = Utc::now();
        let payload = TokenPayload {
            token_id,
            agent_id,
            agent_name: agent.name.clone(),
            tools,
            permissions,
            expires_at,
            nonce: Uuid::new_v4(),
            issued_at: now,
        };

        let payload_bytes = serde_json::to_vec(&payload).map_err(|e| GatewayError::Internal(e.to_string()))?;
        let payload_hash = sha256_hex(canonical_json(&serde_json::to_value(&payload).unwrap()).as_bytes());
        let opaque_token = sign_token(&self.signing_secret, &payload_bytes);

        let record = TokenRecord {
            id: token_id,
            agent_id,
            opaque_token: opaque_token.clone(),
            expires_at,
            revoked: false,
            issued_at: now,
        };

        self.token_repo.save(record.clone()).await.map_err(|e| GatewayError::Internal(e.to_string()))?;
        self.registry_repo
            .save(TokenRegistryEntry {
                token_id,
                agent_id,
                payload_hash,
                issued_at: now,
                expires_at,
                is_revoked: false,
                revoked_at: None,
            })
            .await
            .map_err(|e| GatewayError::Internal(e.to_string()))?;

        obs::token_issued(&agent_id.to_string());
        Ok((record, opaque_token))
    }

    /// Validates an opaque token, optionally checking provenance against a
    /// caller-supplied `(token_id, proof_payload)` pair (spec §4.4).
    pub async fn validate(
        &self,
        opaque_token: &str,
        provenance: Option<(TokenId, &[u8])>,
    ) -> Result<ValidatedToken, GatewayError> {
        let (payload_b64, hmac_hex) = split_token(opaque_token).ok_or(GatewayError::TokenFormat)?;

        if !verify_signature(&self.signing_secret, payload_b64, hmac_hex) {
            obs::token_validation("signature_mismatch");
            return Err(GatewayError::TokenSignature);
        }

        let payload_bytes = base64::Engine::decode(&base64::engine::general_purpose::STANDARD, payload_b64)
            .map_err(|_| GatewayError::TokenFormat)?;
        let payload: TokenPayload = serde_json::from_slice(&payload_bytes).map_err(|_| GatewayError::TokenFormat)?;

        let now = Utc::now();
        if now >= payload.expires_at {
            obs::token_expired();
            return Err(GatewayError::TokenExpired);
        }

        let record = self
            .token_repo
            .find_by_id(payload.token_id)
            .await
            .map_err(|e| GatewayError::Internal(e.to_string()))?
            .ok_or(GatewayError::TokenFormat)?;
        if record.revoked {
            return Err(GatewayError::TokenProvenance);
        }

        let agent = self
            .agent_repo
            .find_by_id(payload.agent_id)
            .await
            .map_err(|e| GatewayError::Internal(e.to_string()))?
            .ok_or(GatewayError::TokenAgentInactive)?;
        if !agent.is_active() {
            return Err(GatewayError::TokenAgentInactive);
        }

        if let Some((token_id, proof_payload)) = provenance {
            let entry = self
                .registry_repo
                .find_by_token_id(token_id)
                .await
                .map_err(|e| GatewayError::Internal(e.to_string()))?
                .ok_or(GatewayError::TokenProvenance)?;
            if entry.is_revoked {
                return Err(GatewayError::TokenProvenance);
            }
            let proof_hash = sha256_hex(proof_payload);
            if proof_hash != entry.payload_hash {
                return Err(GatewayError::TokenProvenance);
            }
        }

        obs::token_validation("ok");
        Ok(ValidatedToken { agent, payload, record })
    }

    pub async fn revoke(&self, token_id: TokenId) -> Result<(), GatewayError> {
        self.token_repo.revoke(token_id).await.map_err(|e| GatewayError::Internal(e.to_string()))?;
        self.registry_repo.revoke(token_id).await.map_err(|e| GatewayError::Internal(e.to_string()))?;
        Ok(())
    }
}
