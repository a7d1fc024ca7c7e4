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
    name: "complete",
    required_params: &["prompt"],
    cacheable: false,
    needs_credential: true,
    cache_ttl_secs: 0,
}];

pub struct OpenAiAdapter {
    mode: UpstreamMode,
    http: reqwest::Client,
    chaos: Arc<ChaosInjector>,
}

impl OpenAiAdapter {
    pub fn new(mode: UpstreamMode, http: reqwest::Client, chaos: Arc<ChaosInjector>) -> Self {
        Self { mode, http, chaos }
    }
}

#[async_trait]
impl ToolAdapter for OpenAiAdapter {
    fn tool_name(&self) -> &'static str {
        "openai"
    }

    fn actions(&self) -> &'static [ActionDescriptor] {
        ACTIONS
    }

    async fn invoke(&self, action: &str, params: &Value, credential: Option<&[u8]>) -> Result<Value, GatewayError> {
        if action != "complete" {
            return Err(GatewayError::Validation(format!("openai has no action '{action}'")));
        }

        if let Some(outcome) = self.chaos.sample(self.tool_name()) {
            match outcome {
                ChaosOutcome::Fail(err) => return Err(err),
                ChaosOutcome::Delay(delay) => tokio::time::sleep(delay).await,
            }
        }

        let prompt = params.get("prompt").and_then(|v| v.as_str()).ok_or_else(|| GatewayError::Validation("prompt must be a string".to_string()))?;

        match self.mode {
            UpstreamMode::Mock => Ok(json!({
                "choices": [{ "text": format!("mock completion for: {prompt}") }],
            })),
            UpstreamMode::Live => {
                let api_key = credential
                    .map(|c| String::from_utf8_lossy(c).to_string())
                    .ok_or_else(|| GatewayError::CredNotFound(self.tool_name().to_string()))?;
                let response = self
                    .http
                    .post("https://api.openai.com/v1/completions")
                    .bearer_auth(api_key)
                    .json(&json!({ "prompt": prompt }))
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
    async fn mock_mode_echoes_the_prompt() {
        let adapter = OpenAiAdapter::new(UpstreamMode::Mock, reqwest::Client::new(), Arc::new(ChaosInjector::new()));
        let result = adapter.invoke("complete", &json!({"prompt": "hello"}), None).await.unwrap();
        assert!(result["choices"][0]["text"].as_str().unwrap().contains("hello"));
    }
}
