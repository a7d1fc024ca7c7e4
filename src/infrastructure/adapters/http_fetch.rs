// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::config::UpstreamMode;
use crate::domain::tool::ActionDescriptor;
use crate::error::GatewayError;
use crate::infrastructure::adapters::ToolAdapter;
use crate::infrastructure::chaos::{ChaosInjector, ChaosOutcome};

const ACTIONS: &[ActionDescriptor] = &[ActionDescriptor {
    name: "get",
    required_params: &["url"],
    cacheable: true,
    needs_credential: false,
    cache_ttl_secs: 60,
}];

/// Domain allow/block-listing for this adapter is enforced upstream by the
/// policy engine's guard check (`PolicySpec::check_guards`), not here.
pub struct HttpFetchAdapter {
    mode: UpstreamMode,
    http: reqwest::Client,
    chaos: Arc<ChaosInjector>,
}

impl HttpFetchAdapter {
    pub fn new(mode: UpstreamMode, http: reqwest::Client, chaos: Arc<ChaosInjector>) -> Self {
        Self { mode, http, chaos }
    }
}

#[async_trait]
impl ToolAdapter for HttpFetchAdapter {
    fn tool_name(&self) -> &'static str {
        "http_fetch"
    }

    fn actions(&self) -> &'static [ActionDescriptor] {
        ACTIONS
    }

    async fn invoke(&self, action: &str, params: &Value, _credential: Option<&[u8]>) -> Result<Value, GatewayError> {
        if action != "get" {
            return Err(GatewayError::Validation(format!("http_fetch has no action '{action}'")));
        }

        if let Some(outcome) = self.chaos.sample(self.tool_name()) {
            match outcome {
                ChaosOutcome::Fail(err) => return Err(err),
                ChaosOutcome::Delay(delay) => tokio::time::sleep(delay).await,
            }
        }

        let url = params.get("url").and_then(|v| v.as_str()).ok_or_else(|| GatewayError::Validation("url must be a string".to_string()))?;
        url::Url::parse(url).map_err(|e| GatewayError::Validation(format!("invalid url: {e}")))?;

        match self.mode {
            UpstreamMode::Mock => Ok(json!({ "status": 200, "body": format!("mock body for {url}") })),
            UpstreamMode::Live => {
                let response = self.http.get(url).send().await.map_err(|e| GatewayError::Network(e.to_string()))?;
                let status = response.status();
                if status.is_server_error() {
                    return Err(GatewayError::Upstream5xx);
                }
                let body = response.text().await.map_err(|e| GatewayError::Network(e.to_string()))?;
                Ok(json!({ "status": status.as_u16(), "body": body }))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_mode_returns_a_synthetic_body() {
        let adapter = HttpFetchAdapter::new(UpstreamMode::Mock, reqwest::Client::new(), Arc::new(ChaosInjector::new()));
        let result = adapter.invoke("get", &json!({"url": "https://example.com"}), None).await.unwrap();
        assert_eq!(result["status"], 200);
    }

    #[tokio::test]
    async fn invalid_url_fails_validation() {
        let adapter = HttpFetchAdapter::new(UpstreamMode::Mock, reqwest::Client::new(), Arc::new(ChaosInjector::new()));
        let result = adapter.invoke("get", &json!({"url": "not a url"}), None).await;
        assert!(matches!(result, Err(GatewayError::Validation(_))));
    }
}
