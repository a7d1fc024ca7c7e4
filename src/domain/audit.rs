// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::agent::AgentId;

/// One entry per terminal pipeline transition (spec §4.8). Every failed and
/// successful request produces exactly one of these.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditLogEntry {
    pub correlation_id: Uuid,
    pub agent_id: Option<AgentId>,
    pub tool: String,
    pub action: String,
    pub status_code: u16,
    pub success: bool,
    pub duration_ms: u64,
    pub error_kind: Option<String>,
    pub policy_decision: Option<String>,
}
