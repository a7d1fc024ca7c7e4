// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//
// Bounded LRU response cache (spec §4.6). Concurrent reads, serialized write
// per key (spec §5): the whole structure sits behind one `parking_lot::Mutex`
// since `lru::LruCache` itself is not thread-safe, mirroring how the teacher
// guards its bounded in-memory structures.

use chrono::Utc;
use lru::LruCache;
use parking_lot::Mutex;
use serde_json::Value;
use std::num::NonZeroUsize;

use crate::crypto::canonical::request_fingerprint;
use crate::domain::cache::CacheEntry;
use crate::infrastructure::observability::metrics as obs;

const DEFAULT_CAPACITY: usize = 10_000;

pub struct ResponseCache {
    inner: Mutex<LruCache<String, CacheEntry>>,
}

impl ResponseCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::new(DEFAULT_CAPACITY).unwrap());
        Self { inner: Mutex::new(LruCache::new(capacity)) }
    }

    /// `hash(tool, action, canonical(params))` (spec §4.6).
    pub fn key(tool: &str, action: &str, params: &Value) -> String {
        request_fingerprint(tool, action, params)
    }

    pub fn get(&self, tool: &str, action: &str, key: &str) -> Option<Value> {
        let mut guard = self.inner.lock();
        let entry = guard.get(key)?;
        if entry.is_expired(Utc::now()) {
            guard.pop(key);
            return None;
        }
        let value = entry.value.clone();
        obs::cache_hit(tool, action);
        Some(value)
    }

    pub fn put(&self, key: String, value: Value, ttl_secs: u64) {
        let entry = CacheEntry { key: key.clone(), value, inserted_at: Utc::now(), ttl_secs };
        self.inner.lock().put(key, entry);
    }
}

impl Default for ResponseCache {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
