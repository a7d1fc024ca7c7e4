// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//
// Thin HTTP entry point (spec §6): one route that deserializes the request
// body, calls the orchestrator, and serializes the typed response. axum is
// treated as an external collaborator; no middleware stack beyond what this
// single route needs to exist.

use std::sync::Arc;

use axum::extract::State;
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use base64::Engine as _;

use crate::application::orchestrator::{Orchestrator, ToolRequest};
use crate::infrastructure::observability::correlation::CorrelationId;
use crate::presentation::dto::{FailureDto, SuccessDto, ToolRequestDto, ToolResponseMetaDto};

pub fn router(orchestrator: Arc<Orchestrator>) -> Router {
    Router::new().route("/v1/tools/invoke", post(invoke)).with_state(orchestrator)
}

async fn invoke(State(orchestrator): State<Arc<Orchestrator>>, headers: HeaderMap, Json(body): Json<ToolRequestDto>) -> Response {
    let correlation_id = CorrelationId::from_header(headers.get("x-correlation-id").and_then(|v| v.to_str().ok()));
    let caller_intent = headers.get("x-agent-intent").and_then(|v| v.to_str().ok()).map(str::to_string);
    let idempotency_key = headers.get("idempotency-key").and_then(|v| v.to_str().ok()).map(str::to_string);

    let proof_payload = match body.proof_payload.as_deref().map(|b64| base64::engine::general_purpose::STANDARD.decode(b64)) {
        Some(Ok(bytes)) => Some(bytes),
        Some(Err(_)) => {
            return error_response(correlation_id, StatusCode::BAD_REQUEST, "proof_payload must be valid base64");
        }
        None => None,
    };

    let request = ToolRequest {
        agent_token: body.agent_token,
        token_id: body.token_id.map(crate::domain::token::TokenId),
        proof_payload,
        tool: body.tool,
        action: body.action,
        params: body.params,
        caller_intent,
        idempotency_key,
    };

    match orchestrator.execute(request, correlation_id).await {
        Ok(response) => {
            let mut headers = HeaderMap::new();
            headers.insert("x-correlation-id", header_value(&response.correlation_id.to_string()));
            if response.rotation_recommended {
                headers.insert("x-token-rotation-recommended", HeaderValue::from_static("true"));
                headers.insert("x-token-expires-at", header_value(&response.token_expires_at.to_rfc3339()));
            }

            let body = SuccessDto {
                success: true,
                data: response.data,
                metadata: ToolResponseMetaDto {
                    agent_id: response.metadata.agent_id,
                    agent_name: response.metadata.agent_name,
                    tool: response.metadata.tool,
                    action: response.metadata.action,
                    response_time_ms: response.metadata.response_time_ms,
                },
            };
            (StatusCode::OK, headers, Json(body)).into_response()
        }
        Err(err) => {
            let status = StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            let mut headers = HeaderMap::new();
            headers.insert("x-correlation-id", header_value(&correlation_id.to_string()));
            (status, headers, Json(FailureDto::from_gateway_error(&err))).into_response()
        }
    }
}

fn error_response(correlation_id: CorrelationId, status: StatusCode, reason: &str) -> Response {
    let mut headers = HeaderMap::new();
    headers.insert("x-correlation-id", header_value(&correlation_id.to_string()));
    let body = FailureDto { error: "BAD_REQUEST", reason: reason.to_string(), details: None, retry_after: None };
    (status, headers, Json(body)).into_response()
}

fn header_value(s: &str) -> HeaderValue {
    HeaderValue::from_str(s).unwrap_or_else(|_| HeaderValue::from_static("invalid"))
}
