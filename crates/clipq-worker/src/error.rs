//! Worker error types.

use thiserror::Error;

use clipq_media::MediaError;
use clipq_storage::StorageError;
use clipq_store::StoreError;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Job store error: {0}")]
    Store(#[from] StoreError),

    /// The source could not be fetched
    #[error("{0}")]
    Fetch(#[source] MediaError),

    /// The clip could not be cut from the fetched source
    #[error("{0}")]
    Transform(#[source] MediaError),

    #[error("{0}")]
    Storage(#[from] StorageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WorkerError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Which part of the worker failed, for log fields and metric labels.
    pub fn stage(&self) -> &'static str {
        match self {
            WorkerError::Config(_) => "config",
            WorkerError::Store(_) => "store",
            WorkerError::Fetch(_) => "fetch",
            WorkerError::Transform(_) => "transform",
            WorkerError::Storage(_) => "publish",
            WorkerError::Io(_) => "io",
        }
    }

    /// Loop-level errors the runner backs off from and retries.
    pub fn is_transient(&self) -> bool {
        match self {
            WorkerError::Store(e) => e.is_retryable(),
            WorkerError::Io(_) => true,
            _ => false,
        }
    }
}
