//! Prometheus exporter for the ingest counters and gauges.
//!
//! `metrics-exporter-prometheus` serves its own HTTP listener, so the daemon
//! only has to install the recorder once at startup.

use std::net::SocketAddr;

use anyhow::Result;
use loghaul_core::config::MetricsConfig;
use metrics_exporter_prometheus::PrometheusBuilder;

/// `listen_addr:port` from `[metrics]`. Host names are not resolved.
pub fn metrics_listen_addr(config: &MetricsConfig) -> Result<SocketAddr> {
    format!("{}:{}", config.listen_addr, config.port)
        .parse()
        .map_err(|e| anyhow::anyhow!("invalid metrics listen address: {}", e))
}

/// Install the global recorder, bind the exporter and register descriptions.
///
/// A second call in the same process fails because the global recorder is
/// already set.
pub fn install_metrics_recorder(config: &MetricsConfig) -> Result<()> {
    let addr = metrics_listen_addr(config)?;
    if addr.ip().is_unspecified() {
        tracing::warn!(listen_addr = %addr, "metrics exporter listens on all interfaces");
    }

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| anyhow::anyhow!("failed to install metrics recorder: {}", e))?;
    loghaul_core::metrics::describe_all();

    tracing::info!(listen_addr = %addr, "metrics exporter listening");
    Ok(())
}
