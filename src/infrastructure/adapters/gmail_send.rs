// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//
// `gmail_send:send` is deliberately non-cacheable (spec §4.6: write-class
// actions must never be served from cache).

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::config::UpstreamMode;
use crate::domain::tool::ActionDescriptor;
use crate::error::GatewayError;
use crate::infrastructure::adapters::ToolAdapter;
use crate::infrastructure::chaos::{ChaosInjector, ChaosOutcome};

const ACTIONS: &[ActionDescriptor] = &[ActionDescriptor {
    name: "send",
    required_params: &["to", "subject", "body"],
    cacheable: false,
    needs_credential: true,
    cache_ttl_secs: 0,
}];

pub struct GmailSendAdapter {
    mode: UpstreamMode,
    http: reqwest::Client,
    chaos: Arc<ChaosInjector>,
}

impl GmailSendAdapter {
    pub fn new(mode: UpstreamMode, http: reqwest::Client, chaos: Arc<ChaosInjector>) -> Self {
        Self { mode, http, chaos }
    }
}

#[async_trait]
impl ToolAdapter for GmailSendAdapter {
    fn tool_name(&self) -> &'static str {
        "gmail_send"
    }

    fn actions(&self) -> &'static [ActionDescriptor] {
        ACTIONS
    }

    async fn invoke(&self, action: &str, params: &Value, credential: Option<&[u8]>) -> Result<Value, GatewayError> {
        if action != "send" {
            return Err(GatewayError::Validation(format!("gmail_send has no action '{action}'")));
        }

        if let Some(outcome) = self.chaos.sample(self.tool_name()) {
            match outcome {
                ChaosOutcome::Fail(err) => return Err(err),
                ChaosOutcome::Delay(delay) => tokio::time::sleep(delay).await,
            }
        }

        let to = params.get("to").and_then(|v| v.as_str()).ok_or_else(|| GatewayError::Validation("to must be a string".to_string()))?;

        match self.mode {
            UpstreamMode::Mock => Ok(json!({ "message_id": Uuid::new_v4().to_string(), "to": to, "status": "queued" })),
            UpstreamMode::Live => {
                let token = credential
                    .map(|c| String::from_utf8_lossy(c).to_string())
                    .ok_or_else(|| GatewayError::CredNotFound(self.tool_name().to_string()))?;
                let response = self
                    .http
                    .post("https://gmail.googleapis.com/gmail/v1/users/me/messages/send")
                    .bearer_auth(token)
                    .json(params)
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
    async fn mock_mode_queues_the_message() {
        let adapter = GmailSendAdapter::new(UpstreamMode::Mock, reqwest::Client::new(), Arc::new(ChaosInjector::new()));
        let result = adapter
            .invoke("send", &json!({"to": "a@example.com", "subject": "hi", "body": "hello"}), None)
            .await
            .unwrap();
        assert_eq!(result["status"], "queued");
    }

    #[test]
    fn action_is_declared_non_cacheable() {
        let adapter = GmailSendAdapter::new(UpstreamMode::Mock, reqwest::Client::new(), Arc::new(ChaosInjector::new()));
        assert!(!adapter.action("send").unwrap().cacheable);
    }
}
