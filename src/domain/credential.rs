// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CredentialId(pub Uuid);

impl CredentialId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for CredentialId {
    fn default() -> Self {
        Self::new()
    }
}

/// Versioned, envelope-encrypted per-tool credential (spec §3, §4.2).
/// `encrypted_credential`/`encrypted_metadata` are base64 envelopes produced
/// by `crate::crypto::envelope`; plaintext is never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCredential {
    pub id: CredentialId,
    pub tool: String,
    pub version: u32,
    pub is_active: bool,
    pub encrypted_credential: String,
    pub encrypted_metadata: Option<String>,
    pub created_at: DateTime<Utc>,
    pub activated_at: Option<DateTime<Utc>>,
    pub deactivated_at: Option<DateTime<Utc>>,
}

impl ToolCredential {
    pub fn new(tool: String, version: u32, encrypted_credential: String, encrypted_metadata: Option<String>) -> Self {
        Self {
            id: CredentialId::new(),
            tool,
            version,
            is_active: false,
            encrypted_credential,
            encrypted_metadata,
            created_at: Utc::now(),
            activated_at: None,
            deactivated_at: None,
        }
    }

    pub fn activate(&mut self) {
        self.is_active = true;
        self.activated_at = Some(Utc::now());
    }

    pub fn deactivate(&mut self) {
        self.is_active = false;
        self.deactivated_at = Some(Utc::now());
    }
}
