//! Metrics initialization for Prometheus exporter.

use metrics::{Unit, describe_counter};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::config::MetricsConfig;
use crate::error::{Error, Result};

/// Initialize the metrics system based on configuration.
///
/// When metrics are enabled, this starts an HTTP server that exposes
/// a `/metrics` endpoint for Prometheus to scrape. When disabled, the
/// counters recorded by the capture loop are no-ops.
pub fn init(config: &MetricsConfig) -> Result<()> {
    if !config.enabled {
        return Ok(());
    }

    PrometheusBuilder::new()
        .with_http_listener(config.listen)
        .install()
        .map_err(|e| Error::Metrics(e.to_string()))?;

    describe_counter!(
        "phishguard_packets_total",
        Unit::Count,
        "Packets read from the virtual interface, by outcome"
    );
    describe_counter!(
        "phishguard_forward_failures_total",
        Unit::Count,
        "Allowed queries dropped because the upstream resolver did not answer"
    );
    describe_counter!(
        "phishguard_decode_errors_total",
        Unit::Count,
        "DNS-port packets that could not be decoded and were passed through"
    );

    Ok(())
}
