//! In-memory job table.
//!
//! Implements the same contract as the REST backend, including an atomic
//! status guard, so the runner can be exercised without a database. Writes
//! that would break the forward-only state machine or touch a terminal job
//! are rejected as constraint violations, the way a table trigger would.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use clipq_models::{Job, JobId, JobPatch, JobStatus};

use crate::error::{StoreError, StoreResult};
use crate::store::JobStore;

/// Call counters, for asserting how a caller used the store.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct StoreStats {
    /// Read calls (`claim_oldest_ready`, `list_stale`)
    pub reads: u64,
    /// Write calls that changed a row
    pub writes: u64,
    /// Guarded writes whose guard did not hold
    pub guard_misses: u64,
}

#[derive(Default)]
struct Inner {
    jobs: HashMap<JobId, Job>,
    history: HashMap<JobId, Vec<JobStatus>>,
    stats: StoreStats,
}

/// Mutex-protected job table.
#[derive(Default)]
pub struct InMemoryJobStore {
    inner: Mutex<Inner>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the table with jobs.
    pub fn with_jobs(jobs: impl IntoIterator<Item = Job>) -> Self {
        let store = Self::new();
        for job in jobs {
            store.insert(job);
        }
        store
    }

    /// Insert (or replace) a job.
    pub fn insert(&self, job: Job) {
        let mut inner = self.lock();
        inner.history.insert(job.id.clone(), vec![job.status]);
        inner.jobs.insert(job.id.clone(), job);
    }

    pub fn get(&self, id: &JobId) -> Option<Job> {
        self.lock().jobs.get(id).cloned()
    }

    /// All jobs, oldest first.
    pub fn jobs(&self) -> Vec<Job> {
        let mut jobs: Vec<Job> = self.lock().jobs.values().cloned().collect();
        jobs.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        jobs
    }

    /// Every status a job has been in, in order.
    pub fn status_history(&self, id: &JobId) -> Vec<JobStatus> {
        self.lock().history.get(id).cloned().unwrap_or_default()
    }

    pub fn stats(&self) -> StoreStats {
        self.lock().stats
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Inner {
    fn apply(&mut self, id: &JobId, patch: &JobPatch, now: DateTime<Utc>) -> StoreResult<()> {
        let job = self
            .jobs
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(format!("jobs/{}", id)))?;

        if job.status.is_terminal() {
            return Err(StoreError::Constraint(format!(
                "job {} is {} and cannot be modified",
                id, job.status
            )));
        }
        if let Some(next) = patch.status {
            if next != job.status && !job.status.can_transition_to(next) {
                return Err(StoreError::Constraint(format!(
                    "illegal transition {} -> {} for job {}",
                    job.status, next, id
                )));
            }
        }

        if let Some(status) = patch.status {
            if status != job.status {
                self.history.entry(id.clone()).or_default().push(status);
            }
            job.status = status;
        }
        if let Some(progress) = patch.progress {
            job.progress = progress;
        }
        if let Some(outputs) = &patch.outputs {
            job.outputs = outputs.clone();
        }
        if let Some(error) = &patch.error {
            job.error = Some(error.clone());
        }
        job.updated_at = now;
        self.stats.writes += 1;
        Ok(())
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn claim_oldest_ready(&self) -> StoreResult<Option<Job>> {
        let mut inner = self.lock();
        inner.stats.reads += 1;

        Ok(inner
            .jobs
            .values()
            .filter(|job| job.status == JobStatus::Ready)
            .min_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)))
            .cloned())
    }

    async fn update(&self, id: &JobId, patch: &JobPatch) -> StoreResult<()> {
        self.lock().apply(id, patch, Utc::now())
    }

    async fn update_if_status(
        &self,
        id: &JobId,
        expected: JobStatus,
        patch: &JobPatch,
    ) -> StoreResult<bool> {
        let mut inner = self.lock();

        let current = inner.jobs.get(id).map(|job| job.status);
        if current != Some(expected) {
            inner.stats.guard_misses += 1;
            return Ok(false);
        }

        inner.apply(id, patch, Utc::now())?;
        Ok(true)
    }

    async fn list_stale(
        &self,
        status: JobStatus,
        updated_before: DateTime<Utc>,
        limit: usize,
    ) -> StoreResult<Vec<Job>> {
        let mut inner = self.lock();
        inner.stats.reads += 1;

        let mut stale: Vec<Job> = inner
            .jobs
            .values()
            .filter(|job| job.status == status && job.updated_at < updated_before)
            .cloned()
            .collect();
        stale.sort_by(|a, b| a.updated_at.cmp(&b.updated_at));
        stale.truncate(limit);
        Ok(stale)
    }
}
