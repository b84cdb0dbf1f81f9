//! Metrics collection and exposition.
//!
//! # Metrics
//! - `ppsd_startup_stage_seconds` (histogram): time spent per startup stage
//! - `ppsd_rpc_requests_total` (counter): API calls by method, status
//! - `ppsd_rpc_duration_seconds` (histogram): API latency by method
//! - `ppsd_jobs_created_total` (counter): jobs accepted by the job service

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::time::Instant;

/// Install the global Prometheus recorder.
///
/// Returns `None` if a recorder is already installed; metrics then flow to
/// that recorder and the debug listener serves an empty body.
pub fn install_recorder() -> Option<PrometheusHandle> {
    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => Some(handle),
        Err(e) => {
            tracing::warn!(error = %e, "Metrics recorder not installed");
            None
        }
    }
}

pub fn record_stage(stage: &'static str, start: Instant) {
    ::metrics::histogram!("ppsd_startup_stage_seconds", "stage" => stage)
        .record(start.elapsed().as_secs_f64());
}

pub fn record_rpc(method: &str, status: u16, start: Instant) {
    ::metrics::counter!(
        "ppsd_rpc_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    ::metrics::histogram!("ppsd_rpc_duration_seconds", "method" => method.to_string())
        .record(start.elapsed().as_secs_f64());
}

pub fn record_job_created() {
    ::metrics::counter!("ppsd_jobs_created_total").increment(1);
}
