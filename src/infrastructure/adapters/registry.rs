// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//
// Static adapter table (spec §9 design note): adapters are registered once
// at construction time rather than through a dynamic registration call,
// since the tool set is fixed at compile time for this gateway.

use std::collections::HashMap;
use std::sync::Arc;

use crate::config::UpstreamMode;
use crate::error::GatewayError;
use crate::infrastructure::adapters::{
    gmail_send::GmailSendAdapter, http_fetch::HttpFetchAdapter, openai::OpenAiAdapter, serpapi::SerpApiAdapter, ToolAdapter,
};
use crate::infrastructure::chaos::ChaosInjector;

pub struct AdapterRegistry {
    adapters: HashMap<&'static str, Arc<dyn ToolAdapter>>,
}

impl AdapterRegistry {
    pub fn new(mode: UpstreamMode, http: reqwest::Client, chaos: Arc<ChaosInjector>) -> Self {
        let mut adapters: HashMap<&'static str, Arc<dyn ToolAdapter>> = HashMap::new();
        adapters.insert("serpapi", Arc::new(SerpApiAdapter::new(mode, http.clone(), chaos.clone())));
        adapters.insert("http_fetch", Arc::new(HttpFetchAdapter::new(mode, http.clone(), chaos.clone())));
        adapters.insert("openai", Arc::new(OpenAiAdapter::new(mode, http.clone(), chaos.clone())));
        adapters.insert("gmail_send", Arc::new(GmailSendAdapter::new(mode, http, chaos)));
        Self { adapters }
    }

    pub fn get(&self, tool: &str) -> Result<Arc<dyn ToolAdapter>, GatewayError> {
        self.adapters.get(tool).cloned().ok_or_else(|| GatewayError::BadRequest(format!("unknown tool '{tool}'")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_known_tool_resolves() {
        let registry = AdapterRegistry::new(UpstreamMode::Mock, reqwest::Client::new(), Arc::new(ChaosInjector::new()));
        for tool in ["serpapi", "http_fetch", "openai", "gmail_send"] {
            assert!(registry.get(tool).is_ok(), "{tool} should resolve");
        }
    }

    #[test]
    fn unknown_tool_is_a_bad_request() {
        let registry = AdapterRegistry::new(UpstreamMode::Mock, reqwest::Client::new(), Arc::new(ChaosInjector::new()));
        assert!(matches!(registry.get("not-a-tool"), Err(GatewayError::BadRequest(_))));
    }
}
