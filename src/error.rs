// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

/// Stable error taxonomy for the request execution pipeline (spec §7).
///
/// Every pipeline stage returns a `GatewayError` instead of an ad-hoc string;
/// the orchestrator maps it to a wire status once, at the edge.
#[derive(Debug, Error, Clone, Serialize)]
#[serde(tag = "error", content = "details")]
pub enum GatewayError {
    #[error("missing or invalid field: {0}")]
    BadRequest(String),

    #[error("token is malformed")]
    TokenFormat,

    #[error("token signature does not match")]
    TokenSignature,

    #[error("token has expired")]
    TokenExpired,

    #[error("owning agent is not active")]
    TokenAgentInactive,

    #[error("token provenance mismatch")]
    TokenProvenance,

    #[error("policy denied: {reason}")]
    PolicyDenied { kind: PolicyDenialKind, reason: String },

    #[error("quota exceeded: {current}/{limit}, resets at {reset_at}")]
    QuotaExceeded {
        current: u64,
        limit: u64,
        reset_at: chrono::DateTime<chrono::Utc>,
    },

    #[error("rate limited, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("parameter validation failed: {0}")]
    Validation(String),

    #[error("idempotency key reused with a different body")]
    IdempotencyConflict,

    #[error("circuit breaker open for tool {tool}")]
    BreakerOpen { tool: String },

    #[error("upstream returned a 5xx error")]
    Upstream5xx,

    #[error("upstream call timed out")]
    UpstreamTimeout,

    #[error("network error calling upstream: {0}")]
    Network(String),

    #[error("no active credential for tool {0}")]
    CredNotFound(String),

    #[error("service is draining")]
    ServiceUnavailable,

    #[error("request exceeded its pipeline deadline")]
    Cancelled,

    #[error("internal error: {0}")]
    Internal(String),
}

/// Guard-evaluation sub-kind carried by `GatewayError::PolicyDenied` and mirrored
/// in the `policy_denials_total{kind}` metric label (spec §4.5, §8).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PolicyDenialKind {
    Scope,
    Intent,
    Size,
    DomainBlocked,
    DomainNotAllowed,
    TimeWindow,
    Schedule,
    Quota,
}

impl std::fmt::Display for PolicyDenialKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl GatewayError {
    /// Maps a gateway error to the HTTP status code spec §7 assigns it.
    pub fn status_code(&self) -> u16 {
        match self {
            GatewayError::BadRequest(_) => 400,
            GatewayError::TokenFormat => 401,
            GatewayError::TokenSignature => 403,
            GatewayError::TokenExpired => 403,
            GatewayError::TokenAgentInactive => 403,
            GatewayError::TokenProvenance => 403,
            GatewayError::PolicyDenied { .. } => 403,
            GatewayError::QuotaExceeded { .. } => 429,
            GatewayError::RateLimited { .. } => 429,
            GatewayError::Validation(_) => 422,
            GatewayError::IdempotencyConflict => 409,
            GatewayError::BreakerOpen { .. } => 503,
            GatewayError::Upstream5xx => 502,
            GatewayError::UpstreamTimeout => 504,
            GatewayError::Network(_) => 502,
            GatewayError::CredNotFound(_) => 503,
            GatewayError::ServiceUnavailable => 503,
            GatewayError::Cancelled => 504,
            GatewayError::Internal(_) => 500,
        }
    }

    /// Stable, low-cardinality label for metrics and audit log `error_kind`.
    pub fn kind(&self) -> &'static str {
        match self {
            GatewayError::BadRequest(_) => "BAD_REQUEST",
            GatewayError::TokenFormat => "TOKEN_FORMAT",
            GatewayError::TokenSignature => "TOKEN_SIGNATURE",
            GatewayError::TokenExpired => "TOKEN_EXPIRED",
            GatewayError::TokenAgentInactive => "TOKEN_AGENT_INACTIVE",
            GatewayError::TokenProvenance => "TOKEN_PROVENANCE",
            GatewayError::PolicyDenied { .. } => "POLICY_DENIED",
            GatewayError::QuotaExceeded { .. } => "QUOTA_EXCEEDED",
            GatewayError::RateLimited { .. } => "RATE_LIMITED",
            GatewayError::Validation(_) => "VALIDATION",
            GatewayError::IdempotencyConflict => "IDEMPOTENCY_CONFLICT",
            GatewayError::BreakerOpen { .. } => "BREAKER_OPEN",
            GatewayError::Upstream5xx => "UPSTREAM_5XX",
            GatewayError::UpstreamTimeout => "UPSTREAM_TIMEOUT",
            GatewayError::Network(_) => "NETWORK",
            GatewayError::CredNotFound(_) => "CRED_NOT_FOUND",
            GatewayError::ServiceUnavailable => "SERVICE_UNAVAILABLE",
            GatewayError::Cancelled => "CANCELLED",
            GatewayError::Internal(_) => "INTERNAL",
        }
    }

    /// Whether the resilience fabric's retry loop (spec §4.6) is allowed to
    /// retry this error kind.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            GatewayError::Upstream5xx | GatewayError::UpstreamTimeout | GatewayError::Network(_)
        )
    }

    pub fn details(&self) -> Option<Value> {
        match self {
            GatewayError::QuotaExceeded { current, limit, reset_at } => Some(serde_json::json!({
                "current": current,
                "limit": limit,
                "reset_at": reset_at,
            })),
            GatewayError::RateLimited { retry_after_secs } => Some(serde_json::json!({
                "retry_after": retry_after_secs,
            })),
            _ => None,
        }
    }
}
