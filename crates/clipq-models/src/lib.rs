//! Shared data models for the clipq worker.
//!
//! This crate provides Serde-serializable types for:
//! - Job records as stored in the hosted `jobs` table
//! - The job status state machine
//! - Typed partial updates (`JobPatch`) applied by the store client

pub mod job;
pub mod job_status;
pub mod patch;

// Re-export common types
pub use job::{Job, JobId, JobOutput};
pub use job_status::{InvalidJobStatus, JobStatus};
pub use patch::JobPatch;
