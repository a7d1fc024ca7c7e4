// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use serde_json::Value;

/// Declares one action an adapter supports (spec §4.7): its parameter schema
/// (checked before invocation), whether results are cacheable, and whether a
/// `ToolCredential` must be resolved before the call is made.
#[derive(Debug, Clone)]
pub struct ActionDescriptor {
    pub name: &'static str,
    pub required_params: &'static [&'static str],
    pub cacheable: bool,
    pub needs_credential: bool,
    pub cache_ttl_secs: u64,
}

impl ActionDescriptor {
    /// Validates that every required parameter is present (spec §4.7,
    /// `VALIDATION` on failure). Type-level schema validation is out of
    /// scope (spec §1 Non-goals: JSON schema validation libraries are an
    /// external collaborator); this checks presence only.
    pub fn validate_params(&self, params: &Value) -> Result<(), String> {
        let Some(obj) = params.as_object() else {
            return Err("params must be a JSON object".to_string());
        };
        for required in self.required_params {
            if !obj.contains_key(*required) {
                return Err(format!("missing required parameter '{required}'"));
            }
        }
        Ok(())
    }
}
