// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use serde_json::Value;
use sha2::{Digest, Sha256};

/// Recursively sorts object keys and renders the value with no insignificant
/// whitespace, giving a stable byte representation used for hashes,
/// fingerprints, and policy `spec_hash` (spec §4.1).
pub fn canonical_json(value: &Value) -> String {
    let sorted = sort_keys(value);
    serde_json::to_string(&sorted).expect("canonicalized value always serializes")
}

fn sort_keys(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            let mut out = serde_json::Map::new();
            for (k, v) in entries {
                out.insert(k.clone(), sort_keys(v));
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(sort_keys).collect()),
        other => other.clone(),
    }
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    hex::encode(digest)
}

/// `hash(tool, action, canonical(params))` used as the cache/fingerprint key
/// (spec §3, §4.6).
pub fn request_fingerprint(tool: &str, action: &str, params: &Value) -> String {
    let canonical = canonical_json(params);
    sha256_hex(format!("{tool}\u{1}{action}\u{1}{canonical}").as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn reordered_keys_produce_identical_canonical_form() {
        let a = json!({"b": 1, "a": 2});
        let b = json!({"a": 2, "b": 1});
        assert_eq!(canonical_json(&a), canonical_json(&b));
    }

    #[test]
    fn nested_objects_are_sorted_recursively() {
        let a = json!({"z": {"y": 1, "x": 2}, "a": 3});
        let b = json!({"a": 3, "z": {"x": 2, "y": 1}});
        assert_eq!(canonical_json(&a), canonical_json(&b));
    }

    #[test]
    fn fingerprint_is_stable_for_equivalent_params() {
        let p1 = json!({"q": "foo", "engine": "google"});
        let p2 = json!({"engine": "google", "q": "foo"});
        assert_eq!(
            request_fingerprint("serpapi", "search", &p1),
            request_fingerprint("serpapi", "search", &p2)
        );
    }
}
