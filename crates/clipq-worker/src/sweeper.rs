//! Reconciliation of jobs abandoned in `processing`.
//!
//! A worker that dies or double-faults mid-job leaves the row in
//! `processing` forever. The sweep moves such rows to `error` once they have
//! not been updated for the configured timeout. Jobs are never put back to
//! `ready`: a slow worker that is still alive would otherwise see its job run
//! twice.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use clipq_models::{JobPatch, JobStatus};
use clipq_store::JobStore;

use crate::error::{WorkerError, WorkerResult};
use crate::metrics;
use crate::runner::sleep_or_shutdown;

/// Maximum jobs reconciled per sweep.
const SWEEP_BATCH: usize = 50;

/// Periodic stale job sweeper.
pub struct StaleJobSweeper {
    store: Arc<dyn JobStore>,
    timeout: Duration,
    interval: Duration,
}

impl StaleJobSweeper {
    pub fn new(store: Arc<dyn JobStore>, timeout: Duration, interval: Duration) -> Self {
        Self {
            store,
            timeout,
            interval,
        }
    }

    /// Sweep every `interval` until shutdown.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(
            timeout_secs = self.timeout.as_secs(),
            interval_secs = self.interval.as_secs(),
            "Starting stale job sweeper"
        );

        loop {
            if *shutdown.borrow() {
                break;
            }

            if let Err(e) = self.sweep_once().await {
                warn!("Stale job sweep failed: {}", e);
            }

            if !sleep_or_shutdown(self.interval, &mut shutdown).await {
                break;
            }
        }

        info!("Stale job sweeper stopped");
    }

    /// Run a single sweep; returns how many jobs were moved to `error`.
    pub async fn sweep_once(&self) -> WorkerResult<usize> {
        let age = chrono::Duration::from_std(self.timeout)
            .map_err(|e| WorkerError::config(format!("stale job timeout out of range: {}", e)))?;
        let cutoff = Utc::now() - age;

        let stale = self
            .store
            .list_stale(JobStatus::Processing, cutoff, SWEEP_BATCH)
            .await?;
        if stale.is_empty() {
            return Ok(0);
        }

        let message = format!(
            "Job timed out: no progress for {} seconds",
            self.timeout.as_secs()
        );
        let mut swept = 0;

        for job in stale {
            match self
                .store
                .update_if_status(&job.id, JobStatus::Processing, &JobPatch::failed(&message))
                .await
            {
                Ok(true) => {
                    swept += 1;
                    warn!(
                        job_id = %job.id,
                        last_update = %job.updated_at,
                        "Marked stale job as failed"
                    );
                }
                Ok(false) => {
                    debug!(job_id = %job.id, "Stale job was finalized concurrently");
                }
                Err(e) => {
                    error!(job_id = %job.id, "Failed to mark stale job as failed: {}", e);
                }
            }
        }

        metrics::record_stale_swept(swept);
        if swept > 0 {
            info!(swept, "Stale job sweep complete");
        }
        Ok(swept)
    }
}
