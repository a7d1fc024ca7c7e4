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
    name: "search",
    required_params: &["q"],
    cacheable: true,
    needs_credential: true,
    cache_ttl_secs: 300,
}];

pub struct SerpApiAdapter {
    mode: UpstreamMode,
    http: reqwest::Client,
    chaos: Arc<ChaosInjector>,
}

impl SerpApiAdapter {
    pub fn new(mode: UpstreamMode, http: reqwest::Client, chaos: Arc<ChaosInjector>) -> Self {
        Self { mode, http, chaos }
    }
}

#[async_trait]
impl ToolAdapter for SerpApiAdapter {
    fn tool_name(&self) -> &'static str {
        "serpapi"
    }

    fn actions(&self) -> &'static [ActionDescriptor] {
        ACTIONS
    }

    async fn invoke(&self, action: &str, params: &Value, credential: Option<&[u8]>) -> Result<Value, GatewayError> {
        if action != "search" {
            return Err(GatewayError::Validation(format!("serpapi has no action '{action}'")));
        }

        if let Some(outcome) = self.chaos.sample(self.tool_name()) {
            match outcome {
                ChaosOutcome::Fail(err) => return Err(err),
                ChaosOutcome::Delay(delay) => tokio::time::sleep(delay).await,
            }
        }

        let query = params.get("q").and_then(|v| v.as_str()).ok_or_else(|| GatewayError::Validation("q must be a string".to_string()))?;

        match self.mode {
            UpstreamMode::Mock => Ok(json!({
                "search_metadata": { "status": "Success" },
                "organic_results": [{ "title": format!("mock result for {query}"), "link": "https://example.invalid/mock" }],
            })),
            UpstreamMode::Live => {
                let api_key = credential
                    .map(|c| String::from_utf8_lossy(c).to_string())
                    .ok_or_else(|| GatewayError::CredNotFound(self.tool_name().to_string()))?;
                let response = self
                    .http
                    .get("https://serpapi.com/search")
                    .query(&[("q", query), ("api_key", api_key.as_str())])
                    .send()
                    .await
                    .map_err(|e| GatewayError::Network(e.to_string()))?;

                if response.status().is_server_error() {
                    return Err(GatewayError::Upstream5xx);
                }
                response.json::<Value>().await.map_err(|e| GatewayError::Network(e.to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_mode_echoes_the_query_without_a_credential() {
        let adapter = SerpApiAdapter::new(UpstreamMode::Mock, reqwest::Client::new(), Arc::new(ChaosInjector::new()));
        let result = adapter.invoke("search", &json!({"q": "rust async"}), None).await.unwrap();
        assert!(result["organic_results"][0]["title"].as_str().unwrap().contains("rust async"));
    }

    #[tokio::test]
    async fn unknown_action_is_rejected() {
        let adapter = SerpApiAdapter::new(UpstreamMode::Mock, reqwest::Client::new(), Arc::new(ChaosInjector::new()));
        let result = adapter.invoke("image_search", &json!({}), None).await;
        assert!(matches!(result, Err(GatewayError::Validation(_))));
    }
}
