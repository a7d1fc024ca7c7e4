// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use std::env;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    Missing(&'static str),
    #[error("invalid value for {name}: {value}")]
    Invalid { name: &'static str, value: String },
}

/// Upstream adapter mode (spec §6, §4.7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpstreamMode {
    Mock,
    Live,
}

/// Process configuration, loaded once at startup from environment variables
/// (spec §6). Every field here is either required (fails fast on boot) or
/// carries the documented default.
#[derive(Debug, Clone)]
pub struct Config {
    pub kek_base64: String,
    pub signing_secret: String,
    pub gateway_private_key_pem: String,
    pub http_timeout_ms: u64,
    /// Total per-request pipeline budget (spec §5); cancellation propagates
    /// into adapter I/O and aborts retry sleeps once this elapses.
    pub pipeline_deadline_ms: u64,
    pub default_timezone: String,
    pub upstream_mode: UpstreamMode,
    pub ff_policy: bool,
    pub ff_breakers: bool,
    pub ff_retry: bool,
    pub ff_cache: bool,
    pub ff_chaos: bool,
    pub ff_test_bypass: bool,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let kek_base64 = required("KEK_BASE64")?;
        let signing_secret = required("SIGNING_SECRET")?;
        let gateway_private_key_pem = required("GATEWAY_PRIVATE_KEY")?;

        let http_timeout_ms = optional_u64("HTTP_TIMEOUT_MS", 6000)?;
        let pipeline_deadline_ms = optional_u64("PIPELINE_DEADLINE_MS", 20000)?;
        let default_timezone = env::var("DEFAULT_TIMEZONE").unwrap_or_else(|_| "America/Toronto".to_string());

        let upstream_mode = match env::var("UPSTREAM_MODE").as_deref() {
            Ok("live") => UpstreamMode::Live,
            Ok("mock") | Err(_) => UpstreamMode::Mock,
            Ok(other) => {
                return Err(ConfigError::Invalid { name: "UPSTREAM_MODE", value: other.to_string() })
            }
        };

        let config = Config {
            kek_base64,
            signing_secret,
            gateway_private_key_pem,
            http_timeout_ms,
            pipeline_deadline_ms,
            default_timezone,
            upstream_mode,
            ff_policy: flag("FF_POLICY", true),
            ff_breakers: flag("FF_BREAKERS", true),
            ff_retry: flag("FF_RETRY", true),
            ff_cache: flag("FF_CACHE", true),
            ff_chaos: flag("FF_CHAOS", false),
            ff_test_bypass: flag("FF_TEST_BYPASS", false),
        };

        config.warn_on_unsafe_flags();
        Ok(config)
    }

    /// `FF_TEST_BYPASS` must never be on in a live deployment (spec §6); the
    /// source only issues a readiness warning rather than refusing to start
    /// (see Open Question in DESIGN.md).
    fn warn_on_unsafe_flags(&self) {
        if self.ff_test_bypass && self.upstream_mode == UpstreamMode::Live {
            tracing::warn!("FF_TEST_BYPASS is enabled while UPSTREAM_MODE=live; readiness check will report degraded");
        }
    }

    pub fn is_test_bypass_unsafe(&self) -> bool {
        self.ff_test_bypass && self.upstream_mode == UpstreamMode::Live
    }
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    env::var(name).map_err(|_| ConfigError::Missing(name))
}

fn optional_u64(name: &'static str, default: u64) -> Result<u64, ConfigError> {
    match env::var(name) {
        Ok(v) => v.parse().map_err(|_| ConfigError::Invalid { name, value: v }),
        Err(_) => Ok(default),
    }
}

fn flag(name: &'static str, default: bool) -> bool {
    match env::var(name).as_deref() {
        Ok("on") | Ok("true") | Ok("1") => true,
        Ok("off") | Ok("false") | Ok("0") => false,
        _ => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flag_defaults_when_unset() {
        assert!(flag("AEGIS_TEST_NONEXISTENT_FLAG", true));
        assert!(!flag("AEGIS_TEST_NONEXISTENT_FLAG", false));
    }
}
