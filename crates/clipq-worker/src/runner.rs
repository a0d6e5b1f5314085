//! The job runner: claim, process, finalize, repeat.
//!
//! Every write after the initial select is a compare-and-set on the job's
//! status. The claim is guarded on `ready`; progress and the terminal write
//! are guarded on `processing`, so a job that another actor has already
//! finalized is never overwritten.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::watch;
use tracing::{debug, error, info, warn, Instrument};

use clipq_media::{ArtifactPipeline, ClipSpec};
use clipq_models::{Job, JobId, JobOutput, JobPatch, JobStatus};
use clipq_storage::{destination_key, Publisher};
use clipq_store::JobStore;

use crate::config::WorkerConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::logging::JobLogger;
use crate::metrics;

/// Progress recorded once the source has been fetched.
const FETCHED_PROGRESS: u8 = 50;

/// How a claimed job ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOutcome {
    /// Published and marked `done`
    Done,
    /// Marked `error` with a diagnostic
    Failed,
    /// Recording the failure failed too; the job is still `processing`
    Orphaned,
    /// Another actor finalized the job first; nothing was written
    Superseded,
}

/// Result of one loop iteration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// No `ready` job
    Idle,
    /// Another worker claimed the job between our read and our write
    LostRace(JobId),
    /// The job was claimed and driven to an outcome
    Finished { id: JobId, outcome: JobOutcome },
}

/// Sequential job runner.
pub struct JobRunner {
    config: WorkerConfig,
    store: Arc<dyn JobStore>,
    pipeline: Arc<dyn ArtifactPipeline>,
    publisher: Arc<dyn Publisher>,
    clip: ClipSpec,
}

impl JobRunner {
    pub fn new(
        config: WorkerConfig,
        store: Arc<dyn JobStore>,
        pipeline: Arc<dyn ArtifactPipeline>,
        publisher: Arc<dyn Publisher>,
    ) -> Self {
        Self {
            config,
            store,
            pipeline,
            publisher,
            clip: ClipSpec::first_clip(),
        }
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    /// Poll until `shutdown` flips to `true` or its sender is dropped.
    ///
    /// A job already in flight is finished before the loop stops.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(
            poll_interval_ms = self.config.poll_interval.as_millis() as u64,
            work_dir = %self.config.work_dir.display(),
            "Starting job runner"
        );

        loop {
            if *shutdown.borrow() {
                break;
            }

            let delay = match self.poll_once().await {
                Ok(PollOutcome::Idle) => Some(self.config.poll_interval),
                Ok(PollOutcome::LostRace(_)) | Ok(PollOutcome::Finished { .. }) => None,
                Err(e) => {
                    metrics::record_poll_error(e.stage());
                    if e.is_transient() {
                        warn!(stage = e.stage(), "Polling failed, backing off: {}", e);
                    } else {
                        error!(stage = e.stage(), "Polling failed, backing off: {}", e);
                    }
                    Some(self.config.error_backoff)
                }
            };

            if let Some(delay) = delay {
                if !sleep_or_shutdown(delay, &mut shutdown).await {
                    break;
                }
            }
        }

        info!("Job runner stopped");
    }

    /// One iteration: claim the oldest ready job and drive it to an outcome.
    ///
    /// Errors are loop-level (the claim could not be read or written) and
    /// leave every job untouched.
    pub async fn poll_once(&self) -> WorkerResult<PollOutcome> {
        let Some(job) = self.store.claim_oldest_ready().await? else {
            debug!("No ready jobs");
            return Ok(PollOutcome::Idle);
        };

        let claimed = self
            .store
            .update_if_status(&job.id, JobStatus::Ready, &JobPatch::claim())
            .await?;
        if !claimed {
            info!(job_id = %job.id, "Job was claimed by another worker");
            metrics::record_race_lost();
            return Ok(PollOutcome::LostRace(job.id));
        }
        metrics::record_claimed();

        let logger = JobLogger::new(&job.id, "clip");
        let span = logger.create_span();
        let outcome = self.process_claimed(&job, &logger).instrument(span).await;

        Ok(PollOutcome::Finished {
            id: job.id,
            outcome,
        })
    }

    /// Run a claimed job and record its terminal state.
    async fn process_claimed(&self, job: &Job, logger: &JobLogger) -> JobOutcome {
        logger.log_start(&job.source_url);
        let started = Instant::now();

        let error = match self.attempt(job, logger).await {
            Ok(outcome) => {
                match outcome {
                    JobOutcome::Done => {
                        metrics::record_completed(started.elapsed());
                        logger.log_completion("clip published");
                    }
                    JobOutcome::Superseded => {
                        metrics::record_superseded();
                        logger.log_warning("job was finalized by another actor, leaving it as is");
                    }
                    JobOutcome::Failed | JobOutcome::Orphaned => {}
                }
                return outcome;
            }
            Err(e) => e,
        };

        let stage = error.stage();
        let message = error.to_string();
        logger.log_error(stage, &message);
        metrics::record_failed(stage, started.elapsed());

        match self
            .store
            .update_if_status(&job.id, JobStatus::Processing, &JobPatch::failed(&message))
            .await
        {
            Ok(true) => JobOutcome::Failed,
            Ok(false) => {
                metrics::record_superseded();
                logger.log_warning("job was finalized by another actor before the failure was recorded");
                JobOutcome::Superseded
            }
            Err(write_error) => {
                error!(
                    job_id = %job.id,
                    stage = %stage,
                    "Could not record job failure, job left in processing: {} (original error: {})",
                    write_error,
                    message
                );
                metrics::record_orphaned();
                JobOutcome::Orphaned
            }
        }
    }

    /// Fetch, transform, publish, mark done.
    ///
    /// Returns `Superseded` as soon as a guarded write finds the job moved.
    async fn attempt(&self, job: &Job, logger: &JobLogger) -> WorkerResult<JobOutcome> {
        tokio::fs::create_dir_all(&self.config.work_dir).await?;
        let scratch = tempfile::Builder::new()
            .prefix("clipq-job-")
            .tempdir_in(&self.config.work_dir)?;

        let source = self
            .pipeline
            .fetch(&job.source_url, scratch.path())
            .await
            .map_err(WorkerError::Fetch)?;
        logger.log_progress("source fetched");

        if !self.guarded_write(&job.id, &JobPatch::progress(FETCHED_PROGRESS)).await? {
            return Ok(JobOutcome::Superseded);
        }

        let clip = self
            .pipeline
            .transform(&source, &self.clip, scratch.path())
            .await
            .map_err(WorkerError::Transform)?;
        logger.log_progress("clip extracted");

        let key = destination_key(&job.id, &self.clip.file_name);
        let url = self.publisher.publish(&clip, &key).await?;
        logger.log_progress(&format!("clip published to {}", url));

        let done = JobPatch::done(vec![JobOutput::new(url, self.clip.label.clone())]);
        if !self.guarded_write(&job.id, &done).await? {
            return Ok(JobOutcome::Superseded);
        }

        Ok(JobOutcome::Done)
    }

    async fn guarded_write(&self, id: &JobId, patch: &JobPatch) -> WorkerResult<bool> {
        Ok(self
            .store
            .update_if_status(id, JobStatus::Processing, patch)
            .await?)
    }
}

/// Sleep for `delay` unless shutdown is signalled first.
///
/// Returns `false` when the loop should stop.
pub(crate) async fn sleep_or_shutdown(delay: Duration, shutdown: &mut watch::Receiver<bool>) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(delay) => true,
        changed = shutdown.changed() => changed.is_ok() && !*shutdown.borrow(),
    }
}
