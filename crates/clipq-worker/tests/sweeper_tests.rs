//! Stale job sweep tests.

mod common;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tempfile::TempDir;
use tokio::sync::watch;

use clipq_media::FakePipeline;
use clipq_models::{Job, JobId, JobPatch, JobStatus};
use clipq_store::{InMemoryJobStore, JobStore, StoreResult};
use clipq_worker::{JobOutcome, PollOutcome, StaleJobSweeper};

use common::*;

const TIMEOUT: Duration = Duration::from_secs(600);

fn processing_job(updated_secs_ago: i64) -> Job {
    let mut job = ready_job(updated_secs_ago + 60);
    job.status = JobStatus::Processing;
    job.progress = 50;
    job.updated_at = Utc::now() - chrono::Duration::seconds(updated_secs_ago);
    job
}

#[tokio::test]
async fn stale_processing_job_is_marked_error() {
    let stale = processing_job(3_600);
    let store = Arc::new(InMemoryJobStore::with_jobs([stale.clone()]));
    let sweeper = StaleJobSweeper::new(store.clone(), TIMEOUT, Duration::from_secs(60));

    assert_eq!(sweeper.sweep_once().await.unwrap(), 1);

    let stored = store.get(&stale.id).unwrap();
    assert_eq!(stored.status, JobStatus::Error);
    assert!(stored.error.unwrap().contains("timed out"));
    assert!(stored.outputs.is_empty());
}

#[tokio::test]
async fn fresh_and_ready_jobs_are_untouched() {
    let fresh = processing_job(30);
    let mut old_ready = ready_job(7_200);
    old_ready.updated_at = Utc::now() - chrono::Duration::seconds(7_200);
    let store = Arc::new(InMemoryJobStore::with_jobs([fresh.clone(), old_ready.clone()]));
    let sweeper = StaleJobSweeper::new(store.clone(), TIMEOUT, Duration::from_secs(60));

    assert_eq!(sweeper.sweep_once().await.unwrap(), 0);
    assert_eq!(store.get(&fresh.id).unwrap().status, JobStatus::Processing);
    assert_eq!(store.get(&old_ready.id).unwrap().status, JobStatus::Ready);
    assert_eq!(store.stats().writes, 0);
}

/// Lists a job as stale even though it has since finished.
struct SnapshotStore {
    inner: Arc<InMemoryJobStore>,
    snapshot: Vec<Job>,
}

#[async_trait]
impl JobStore for SnapshotStore {
    async fn claim_oldest_ready(&self) -> StoreResult<Option<Job>> {
        self.inner.claim_oldest_ready().await
    }

    async fn update(&self, id: &JobId, patch: &JobPatch) -> StoreResult<()> {
        self.inner.update(id, patch).await
    }

    async fn update_if_status(
        &self,
        id: &JobId,
        expected: JobStatus,
        patch: &JobPatch,
    ) -> StoreResult<bool> {
        self.inner.update_if_status(id, expected, patch).await
    }

    async fn list_stale(
        &self,
        _status: JobStatus,
        _updated_before: DateTime<Utc>,
        _limit: usize,
    ) -> StoreResult<Vec<Job>> {
        Ok(self.snapshot.clone())
    }
}

#[tokio::test]
async fn job_finishing_concurrently_is_not_overwritten() {
    let job = processing_job(3_600);
    let inner = Arc::new(InMemoryJobStore::with_jobs([job.clone()]));
    inner
        .update(
            &job.id,
            &JobPatch::done(vec![clipq_models::JobOutput::new("https://cdn/clip1.mp4", "clip1")]),
        )
        .await
        .unwrap();

    let store = Arc::new(SnapshotStore {
        inner: inner.clone(),
        snapshot: vec![job.clone()],
    });
    let sweeper = StaleJobSweeper::new(store, TIMEOUT, Duration::from_secs(60));

    assert_eq!(sweeper.sweep_once().await.unwrap(), 0);
    let stored = inner.get(&job.id).unwrap();
    assert_eq!(stored.status, JobStatus::Done);
    assert_eq!(stored.outputs.len(), 1);
}

#[tokio::test]
async fn sweep_reconciles_a_double_faulted_job() {
    let work_dir = TempDir::new().unwrap();
    let job = ready_job(30);
    let inner = Arc::new(InMemoryJobStore::with_jobs([job.clone()]));
    let faulty = Arc::new(FinalizeFaultStore::new(inner.clone(), vec![JobStatus::Error]));
    let runner = runner(
        &work_dir,
        faulty,
        Arc::new(FakePipeline::failing_fetch("network unreachable")),
        Arc::new(clipq_storage::InMemoryPublisher::new()),
    );

    let outcome = runner.poll_once().await.unwrap();
    assert!(matches!(
        outcome,
        PollOutcome::Finished {
            outcome: JobOutcome::Orphaned,
            ..
        }
    ));

    // The store has recovered; a zero timeout treats the orphan as stale.
    tokio::time::sleep(Duration::from_millis(5)).await;
    let sweeper = StaleJobSweeper::new(inner.clone(), Duration::ZERO, Duration::from_secs(60));
    assert_eq!(sweeper.sweep_once().await.unwrap(), 1);

    assert_eq!(inner.get(&job.id).unwrap().status, JobStatus::Error);
    assert_monotonic(&inner.status_history(&job.id));
}

#[tokio::test(start_paused = true)]
async fn sweeper_loop_runs_periodically_until_shutdown() {
    let store = Arc::new(InMemoryJobStore::new());
    let sweeper = Arc::new(StaleJobSweeper::new(
        store.clone(),
        TIMEOUT,
        Duration::from_secs(60),
    ));
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let handle = tokio::spawn({
        let sweeper = sweeper.clone();
        async move { sweeper.run(shutdown_rx).await }
    });

    // Sweeps at 0, 60 and 120 s.
    tokio::time::sleep(Duration::from_secs(150)).await;
    shutdown_tx.send(true).unwrap();
    handle.await.unwrap();

    assert_eq!(store.stats().reads, 3);
}
