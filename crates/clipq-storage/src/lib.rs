//! Clip publishing.
//!
//! This crate provides:
//! - The [`Publisher`] seam (upload, bucket health check)
//! - The hosted storage REST backend (default)
//! - An S3-compatible backend via the AWS SDK
//! - An in-memory publisher for tests

pub mod config;
pub mod error;
pub mod memory;
pub mod publisher;
pub mod s3;
pub mod supabase;

pub use config::{StorageConfig, DEFAULT_BUCKET};
pub use error::{StorageError, StorageResult};
pub use memory::{InMemoryPublisher, Upload};
pub use publisher::{destination_key, Publisher, CLIP_CONTENT_TYPE};
pub use s3::{S3Config, S3Storage};
pub use supabase::{SupabaseStorage, SupabaseStorageConfig};
