//! Worker metrics.
//!
//! Recorded through the `metrics` facade. A Prometheus listener is only
//! installed when an address is configured.

use std::net::SocketAddr;
use std::time::Duration;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::error::{WorkerError, WorkerResult};

/// Metric names as constants for consistency.
pub mod names {
    pub const JOBS_CLAIMED_TOTAL: &str = "clipq_jobs_claimed_total";
    pub const CLAIM_RACES_LOST_TOTAL: &str = "clipq_claim_races_lost_total";
    pub const JOBS_COMPLETED_TOTAL: &str = "clipq_jobs_completed_total";
    pub const JOBS_FAILED_TOTAL: &str = "clipq_jobs_failed_total";
    pub const JOBS_ORPHANED_TOTAL: &str = "clipq_jobs_orphaned_total";
    pub const JOBS_SUPERSEDED_TOTAL: &str = "clipq_jobs_superseded_total";
    pub const JOB_DURATION_SECONDS: &str = "clipq_job_duration_seconds";
    pub const POLL_ERRORS_TOTAL: &str = "clipq_poll_errors_total";
    pub const STALE_JOBS_SWEPT_TOTAL: &str = "clipq_stale_jobs_swept_total";
}

/// Install the Prometheus recorder with a scrape listener on `addr`.
pub fn init_metrics(addr: SocketAddr) -> WorkerResult<()> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| WorkerError::config(format!("failed to start metrics listener on {}: {}", addr, e)))
}

pub fn record_claimed() {
    counter!(names::JOBS_CLAIMED_TOTAL).increment(1);
}

pub fn record_race_lost() {
    counter!(names::CLAIM_RACES_LOST_TOTAL).increment(1);
}

pub fn record_completed(duration: Duration) {
    counter!(names::JOBS_COMPLETED_TOTAL).increment(1);
    histogram!(names::JOB_DURATION_SECONDS, "outcome" => "done").record(duration.as_secs_f64());
}

pub fn record_failed(stage: &'static str, duration: Duration) {
    counter!(names::JOBS_FAILED_TOTAL, "stage" => stage).increment(1);
    histogram!(names::JOB_DURATION_SECONDS, "outcome" => "error").record(duration.as_secs_f64());
}

pub fn record_orphaned() {
    counter!(names::JOBS_ORPHANED_TOTAL).increment(1);
}

pub fn record_superseded() {
    counter!(names::JOBS_SUPERSEDED_TOTAL).increment(1);
}

pub fn record_poll_error(stage: &'static str) {
    counter!(names::POLL_ERRORS_TOTAL, "stage" => stage).increment(1);
}

pub fn record_stale_swept(count: usize) {
    counter!(names::STALE_JOBS_SWEPT_TOTAL).increment(count as u64);
}
