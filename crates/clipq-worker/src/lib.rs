//! Clip job worker.
//!
//! This crate provides:
//! - The polling job runner with compare-and-set claiming
//! - Failure classification and guarded finalization
//! - The stale `processing` job sweep
//! - Configuration, logging and metrics setup for the binaries

pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod runner;
pub mod sweeper;

pub use config::{EnvCheck, WorkerConfig};
pub use error::{WorkerError, WorkerResult};
pub use logging::{init_tracing, JobLogger};
pub use runner::{JobOutcome, JobRunner, PollOutcome};
pub use sweeper::StaleJobSweeper;
