use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::QueueError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Running,
    Succeeded,
    Failed,
    Canceled,
}

impl JobStatus {
    /// Terminal statuses permit no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Succeeded | JobStatus::Failed | JobStatus::Canceled
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Running => "running",
            JobStatus::Succeeded => "succeeded",
            JobStatus::Failed => "failed",
            JobStatus::Canceled => "canceled",
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for JobStatus {
    type Err = QueueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "queued" => Ok(JobStatus::Queued),
            "running" => Ok(JobStatus::Running),
            "succeeded" => Ok(JobStatus::Succeeded),
            "failed" => Ok(JobStatus::Failed),
            "canceled" => Ok(JobStatus::Canceled),
            other => Err(QueueError::InvalidStatus(other.to_string())),
        }
    }
}

/// A persisted job record.
///
/// `locked_by` and `created_at` are bookkeeping for the store and worker
/// pool; callers see `{job_id, type, payload, status, result, retry_count}`.
#[derive(Debug, Clone, Serialize)]
pub struct Job {
    pub job_id: Uuid,
    #[serde(rename = "type")]
    pub job_type: String,
    pub payload: Value,
    pub status: JobStatus,
    pub result: Option<Value>,
    pub retry_count: u32,
    #[serde(skip_serializing)]
    pub locked_by: Option<Uuid>,
    #[serde(skip_serializing)]
    pub created_at: DateTime<Utc>,
}

impl Job {
    /// Create a fresh queued job. The type must already be normalized
    /// (trimmed, lower-cased) by the submission path.
    pub fn new(job_type: String, payload: Value) -> Self {
        Self {
            job_id: Uuid::new_v4(),
            job_type,
            payload,
            status: JobStatus::Queued,
            result: None,
            retry_count: 0,
            locked_by: None,
            created_at: Utc::now(),
        }
    }
}

/// Serialize a payload into its canonical textual form, used both as the
/// stored representation and as the dedup fingerprint (together with the
/// job type).
///
/// serde_json's map type keeps keys sorted at every nesting level (the
/// `preserve_order` feature is not enabled), so two payloads that differ
/// only in key order serialize identically.
pub fn canonical_payload(payload: &Value) -> String {
    payload.to_string()
}
