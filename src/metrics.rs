use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

/// Initialize Prometheus metrics exporter
///
/// Fails if a global recorder is already installed.
pub fn init_metrics() -> anyhow::Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| anyhow::anyhow!("Failed to install Prometheus recorder: {}", e))?;

    init_metric_descriptions();

    Ok(handle)
}

/// Initialize metric descriptions (can be called multiple times safely)
fn init_metric_descriptions() {
    describe_counter!(
        "pricing_refresh_total",
        "Completed refresh cycles by outcome"
    );
    describe_histogram!(
        "pricing_refresh_duration_seconds",
        "Refresh cycle duration in seconds"
    );
    describe_gauge!(
        "pricing_collector_records",
        "Records returned by each collector in its last run"
    );
    describe_counter!(
        "pricing_collector_failures_total",
        "Collector runs that ended in an error"
    );
    describe_gauge!(
        "pricing_cache_size",
        "Records in the currently published snapshot"
    );
    describe_gauge!(
        "pricing_service_info",
        "Service version and build information"
    );

    gauge!("pricing_service_info", "version" => env!("CARGO_PKG_VERSION")).set(1.0);
}

/// Record one collector run
pub fn record_collector(collector: &str, records: usize, failed: bool) {
    gauge!("pricing_collector_records", "collector" => collector.to_string()).set(records as f64);

    if failed {
        counter!("pricing_collector_failures_total", "collector" => collector.to_string())
            .increment(1);
    }
}

/// Record a finished refresh cycle
pub fn record_refresh(outcome: &str, duration: Duration) {
    counter!("pricing_refresh_total", "outcome" => outcome.to_string()).increment(1);
    histogram!("pricing_refresh_duration_seconds").record(duration.as_secs_f64());
}

pub fn set_cache_size(size: usize) {
    gauge!("pricing_cache_size").set(size as f64);
}
