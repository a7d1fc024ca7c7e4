// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod correlation;
pub mod metrics;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Installs the process-wide tracing subscriber and the Prometheus recorder
/// (spec §4.13, §4.14). Call once at startup, before any `tracing::` or
/// `metrics::` macro fires.
pub fn init(json_logs: bool) -> Result<(), anyhow::Error> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    if json_logs {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    PrometheusBuilder::new()
        .install()
        .map_err(|e| anyhow::anyhow!("failed to install Prometheus recorder: {e}"))?;

    metrics::describe_all();
    Ok(())
}
