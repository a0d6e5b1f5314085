//! Typed partial updates for job records.
//!
//! A patch only carries the columns it changes. `updated_at` is never part
//! of a patch; the store stamps it as part of the same write.

use serde::{Deserialize, Serialize};

use crate::{JobOutput, JobStatus};

/// Partial update of a job's mutable fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<JobStatus>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<u8>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub outputs: Option<Vec<JobOutput>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl JobPatch {
    /// Ownership write: `status=processing, progress=1`.
    pub fn claim() -> Self {
        Self {
            status: Some(JobStatus::Processing),
            progress: Some(1),
            ..Default::default()
        }
    }

    /// Progress-only write.
    pub fn progress(progress: u8) -> Self {
        Self {
            progress: Some(progress.min(100)),
            ..Default::default()
        }
    }

    /// Terminal success: outputs, `progress=100` and `status=done` in one write.
    pub fn done(outputs: Vec<JobOutput>) -> Self {
        Self {
            status: Some(JobStatus::Done),
            progress: Some(100),
            outputs: Some(outputs),
            error: None,
        }
    }

    /// Terminal failure with a diagnostic.
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            status: Some(JobStatus::Error),
            error: Some(message.into()),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.status.is_none()
            && self.progress.is_none()
            && self.outputs.is_none()
            && self.error.is_none()
    }

    /// Serialize into a JSON object, adding the `updated_at` stamp.
    pub fn to_row(&self, updated_at: chrono::DateTime<chrono::Utc>) -> serde_json::Value {
        let mut row = serde_json::to_value(self).unwrap_or_else(|_| serde_json::json!({}));
        if let Some(map) = row.as_object_mut() {
            map.insert(
                "updated_at".to_string(),
                serde_json::Value::String(updated_at.to_rfc3339()),
            );
        }
        row
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_claim_patch_only_writes_status_and_progress() {
        let value = serde_json::to_value(JobPatch::claim()).unwrap();
        assert_eq!(value, serde_json::json!({"status": "processing", "progress": 1}));
    }

    #[test]
    fn test_done_patch_writes_outputs_atomically() {
        let patch = JobPatch::done(vec![JobOutput::new("https://cdn/a.mp4", "clip1")]);
        let value = serde_json::to_value(&patch).unwrap();
        assert_eq!(value["status"], "done");
        assert_eq!(value["progress"], 100);
        assert_eq!(value["outputs"][0]["label"], "clip1");
        assert!(value.get("error").is_none());
    }

    #[test]
    fn test_progress_is_clamped() {
        assert_eq!(JobPatch::progress(250).progress, Some(100));
    }

    #[test]
    fn test_to_row_stamps_updated_at() {
        let ts = chrono::Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap();
        let row = JobPatch::failed("boom").to_row(ts);
        assert_eq!(row["status"], "error");
        assert_eq!(row["error"], "boom");
        assert_eq!(row["updated_at"], "2024-05-01T10:00:00+00:00");
    }

    #[test]
    fn test_empty_patch() {
        assert!(JobPatch::default().is_empty());
        assert!(!JobPatch::progress(5).is_empty());
    }
}
