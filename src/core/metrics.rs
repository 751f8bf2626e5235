use std::sync::OnceLock;

use metrics::Unit;
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};

use crate::core::config::Settings;

static PROM_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

const GATEWAY_BUCKETS: &[f64] = &[0.5, 1.0, 2.5, 5.0, 10.0, 20.0, 40.0, 60.0, 120.0];

/// Installs the Prometheus recorder once per process. Later calls are no-ops.
pub(crate) fn init(settings: &Settings) -> anyhow::Result<()> {
    if !settings.telemetry().prometheus_enabled || PROM_HANDLE.get().is_some() {
        return Ok(());
    }

    let handle = PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Full("ai_gateway_duration_seconds".to_string()),
            GATEWAY_BUCKETS,
        )?
        .install_recorder()?;
    let _ = PROM_HANDLE.set(handle);
    describe();
    Ok(())
}

pub(crate) fn render() -> Option<String> {
    PROM_HANDLE.get().map(|handle| handle.render())
}

fn describe() {
    metrics::describe_counter!("http_requests_total", "HTTP responses by status code");
    metrics::describe_histogram!(
        "http_request_duration_seconds",
        Unit::Seconds,
        "HTTP request latency"
    );
    metrics::describe_counter!("homework_gradings_total", "Stored gradings by outcome");
    metrics::describe_counter!("ai_gateway_requests_total", "AI gateway calls by stage and status");
    metrics::describe_histogram!(
        "ai_gateway_duration_seconds",
        Unit::Seconds,
        "AI gateway call latency by stage"
    );
    metrics::describe_counter!("student_reports_total", "Progress reports by result");
}
