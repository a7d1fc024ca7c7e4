// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//
// Tool adapters (spec §4.7): a uniform `invoke(action, params, creds?)`
// contract, one implementation per upstream tool, each declaring its own
// action table so the orchestrator never special-cases a tool by name.

pub mod gmail_send;
pub mod http_fetch;
pub mod openai;
pub mod registry;
pub mod serpapi;

use async_trait::async_trait;
use serde_json::Value;

use crate::domain::tool::ActionDescriptor;
use crate::error::GatewayError;

#[async_trait]
pub trait ToolAdapter: Send + Sync {
    fn tool_name(&self) -> &'static str;

    fn actions(&self) -> &'static [ActionDescriptor];

    fn action(&self, name: &str) -> Option<&'static ActionDescriptor> {
        self.actions().iter().find(|a| a.name == name)
    }

    /// Invokes `action` with already-validated `params`. `credential` is the
    /// decrypted secret bytes resolved by the credential vault, present iff
    /// the action's descriptor sets `needs_credential`.
    async fn invoke(&self, action: &str, params: &Value, credential: Option<&[u8]>) -> Result<Value, GatewayError>;
}
