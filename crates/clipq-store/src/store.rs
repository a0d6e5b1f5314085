//! The job store contract shared by every backend.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use clipq_models::{Job, JobId, JobPatch, JobStatus};

use crate::error::StoreResult;

/// Typed access to the job table.
///
/// Implementations must stamp `updated_at` in the same write as every
/// patch, and must evaluate the status guard of [`JobStore::update_if_status`]
/// atomically with the write.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// The oldest `ready` job by `created_at`, without changing it.
    async fn claim_oldest_ready(&self) -> StoreResult<Option<Job>>;

    /// Unconditional partial update.
    async fn update(&self, id: &JobId, patch: &JobPatch) -> StoreResult<()>;

    /// Compare-and-set: apply `patch` only while the job is still in
    /// `expected`. Returns `false` when the guard did not hold.
    async fn update_if_status(
        &self,
        id: &JobId,
        expected: JobStatus,
        patch: &JobPatch,
    ) -> StoreResult<bool>;

    /// Jobs in `status` last updated before `updated_before`, oldest first.
    async fn list_stale(
        &self,
        status: JobStatus,
        updated_before: DateTime<Utc>,
        limit: usize,
    ) -> StoreResult<Vec<Job>>;
}
