// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//
// Wire request/response types (spec §6). These are the only place the crate
// speaks JSON-over-HTTP vocabulary; everything past `api.rs` uses domain and
// application types.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Deserialize)]
pub struct ToolRequestDto {
    pub agent_token: String,
    pub token_id: Option<uuid::Uuid>,
    pub proof_payload: Option<String>, // base64
    pub tool: String,
    pub action: String,
    #[serde(default = "default_params")]
    pub params: Value,
}

fn default_params() -> Value {
    Value::Object(serde_json::Map::new())
}

#[derive(Debug, Serialize)]
pub struct ToolResponseMetaDto {
    pub agent_id: uuid::Uuid,
    pub agent_name: String,
    pub tool: String,
    pub action: String,
    pub response_time_ms: u64,
}

#[derive(Debug, Serialize)]
pub struct SuccessDto {
    pub success: bool,
    pub data: Value,
    pub metadata: ToolResponseMetaDto,
}

#[derive(Debug, Serialize)]
pub struct FailureDto {
    pub error: &'static str,
    pub reason: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<u64>,
}

impl FailureDto {
    pub fn from_gateway_error(err: &crate::error::GatewayError) -> Self {
        let retry_after = match err {
            crate::error::GatewayError::RateLimited { retry_after_secs } => Some(*retry_after_secs),
            _ => None,
        };
        Self { error: err.kind(), reason: err.to_string(), details: err.details(), retry_after }
    }
}
