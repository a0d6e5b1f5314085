//! Store wrappers and fixtures shared by the worker tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tempfile::TempDir;
use tokio::sync::Barrier;

use clipq_media::{ArtifactPipeline, FakePipeline};
use clipq_models::{Job, JobId, JobPatch, JobStatus};
use clipq_storage::{InMemoryPublisher, Publisher};
use clipq_store::{InMemoryJobStore, JobStore, StoreError, StoreResult};
use clipq_worker::{JobRunner, WorkerConfig};

pub fn ready_job(secs_ago: i64) -> Job {
    Job::new("https://www.youtube.com/watch?v=dQw4w9WgXcQ")
        .with_created_at(Utc::now() - chrono::Duration::seconds(secs_ago))
}

pub fn test_config(work_dir: &TempDir) -> WorkerConfig {
    WorkerConfig {
        work_dir: work_dir.path().to_path_buf(),
        ..WorkerConfig::default()
    }
}

pub fn runner(
    work_dir: &TempDir,
    store: Arc<dyn JobStore>,
    pipeline: Arc<dyn ArtifactPipeline>,
    publisher: Arc<dyn Publisher>,
) -> JobRunner {
    JobRunner::new(test_config(work_dir), store, pipeline, publisher)
}

pub fn default_runner(work_dir: &TempDir, store: Arc<dyn JobStore>) -> JobRunner {
    runner(
        work_dir,
        store,
        Arc::new(FakePipeline::new()),
        Arc::new(InMemoryPublisher::new()),
    )
}

/// Status history must be a prefix of `ready, processing, {done|error}`.
pub fn assert_monotonic(history: &[JobStatus]) {
    let allowed_tails = [
        vec![JobStatus::Ready],
        vec![JobStatus::Ready, JobStatus::Processing],
        vec![JobStatus::Ready, JobStatus::Processing, JobStatus::Done],
        vec![JobStatus::Ready, JobStatus::Processing, JobStatus::Error],
    ];
    assert!(
        allowed_tails.iter().any(|allowed| allowed.as_slice() == history),
        "non-monotonic status history: {:?}",
        history
    );
}

/// Outputs are present exactly when the job is done.
pub fn assert_outputs_consistent(job: &Job) {
    assert_eq!(
        !job.outputs.is_empty(),
        job.status == JobStatus::Done,
        "outputs/status mismatch for {:?}",
        job
    );
}

/// Fails the first `failures` reads, then delegates.
pub struct FlakyStore {
    pub inner: Arc<InMemoryJobStore>,
    failures: AtomicUsize,
}

impl FlakyStore {
    pub fn new(inner: Arc<InMemoryJobStore>, failures: usize) -> Self {
        Self {
            inner,
            failures: AtomicUsize::new(failures),
        }
    }
}

#[async_trait]
impl JobStore for FlakyStore {
    async fn claim_oldest_ready(&self) -> StoreResult<Option<Job>> {
        let remaining = self.failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures.store(remaining - 1, Ordering::SeqCst);
            return Err(StoreError::unavailable("connection refused"));
        }
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
        status: JobStatus,
        updated_before: DateTime<Utc>,
        limit: usize,
    ) -> StoreResult<Vec<Job>> {
        self.inner.list_stale(status, updated_before, limit).await
    }
}

/// A competitor claims the job between our read and our write.
pub struct RacingStore {
    pub inner: Arc<InMemoryJobStore>,
}

#[async_trait]
impl JobStore for RacingStore {
    async fn claim_oldest_ready(&self) -> StoreResult<Option<Job>> {
        let job = self.inner.claim_oldest_ready().await?;
        if let Some(job) = &job {
            let won = self
                .inner
                .update_if_status(&job.id, JobStatus::Ready, &JobPatch::claim())
                .await?;
            assert!(won, "competitor should win the claim");
        }
        Ok(job)
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
        status: JobStatus,
        updated_before: DateTime<Utc>,
        limit: usize,
    ) -> StoreResult<Vec<Job>> {
        self.inner.list_stale(status, updated_before, limit).await
    }
}

/// Two workers that both read the same job before either writes.
pub struct LockstepStore {
    pub inner: Arc<InMemoryJobStore>,
    barrier: Arc<Barrier>,
}

impl LockstepStore {
    pub fn pair(inner: Arc<InMemoryJobStore>) -> (Self, Self) {
        let barrier = Arc::new(Barrier::new(2));
        (
            Self {
                inner: inner.clone(),
                barrier: barrier.clone(),
            },
            Self { inner, barrier },
        )
    }
}

#[async_trait]
impl JobStore for LockstepStore {
    async fn claim_oldest_ready(&self) -> StoreResult<Option<Job>> {
        let job = self.inner.claim_oldest_ready().await?;
        if job.is_some() {
            self.barrier.wait().await;
        }
        Ok(job)
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
        status: JobStatus,
        updated_before: DateTime<Utc>,
        limit: usize,
    ) -> StoreResult<Vec<Job>> {
        self.inner.list_stale(status, updated_before, limit).await
    }
}

/// Fails guarded writes whose patch moves the job to one of `failing`.
pub struct FinalizeFaultStore {
    pub inner: Arc<InMemoryJobStore>,
    failing: Vec<JobStatus>,
}

impl FinalizeFaultStore {
    pub fn new(inner: Arc<InMemoryJobStore>, failing: Vec<JobStatus>) -> Self {
        Self { inner, failing }
    }
}

#[async_trait]
impl JobStore for FinalizeFaultStore {
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
        if patch.status.map_or(false, |s| self.failing.contains(&s)) {
            return Err(StoreError::unavailable("connection reset by peer"));
        }
        self.inner.update_if_status(id, expected, patch).await
    }

    async fn list_stale(
        &self,
        status: JobStatus,
        updated_before: DateTime<Utc>,
        limit: usize,
    ) -> StoreResult<Vec<Job>> {
        self.inner.list_stale(status, updated_before, limit).await
    }
}
