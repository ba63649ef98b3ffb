use serde_json::Value;
use uuid::Uuid;

use crate::error::{QueueError, Result};
use crate::queue::job::{canonical_payload, Job, JobStatus};
use crate::store::JobStore;

/// The caller-facing queue surface: submit, get, list, cancel.
///
/// Submission deduplicates on the `(type, canonical payload)` fingerprint;
/// cancellation is cooperative and only lands on jobs that no worker has
/// claimed yet.
#[derive(Debug, Clone)]
pub struct JobQueue {
    store: JobStore,
}

impl JobQueue {
    pub fn new(store: JobStore) -> Self {
        Self { store }
    }

    /// Submit a job. Resubmitting a semantically identical payload (key
    /// order does not matter) returns the existing record without side
    /// effects.
    pub async fn submit(&self, job_type: &str, payload: Option<Value>) -> Result<Job> {
        let job_type = job_type.trim().to_lowercase();
        if job_type.is_empty() {
            return Err(QueueError::InvalidJob("missing job type".to_string()));
        }

        let payload = payload.unwrap_or_else(|| Value::Object(Default::default()));
        let fingerprint = canonical_payload(&payload);

        if let Some(existing) = self.store.find_by_fingerprint(&job_type, &fingerprint).await? {
            tracing::debug!(job_id = %existing.job_id, job_type, "duplicate submission, returning existing job");
            return Ok(existing);
        }

        let job = Job::new(job_type.clone(), payload);
        match self.store.insert(&job).await {
            Ok(()) => {
                tracing::info!(job_id = %job.job_id, job_type, "job queued");
                Ok(job)
            }
            // Lost a dedup race between the lookup and the insert: the
            // winner's row is the canonical one.
            Err(QueueError::Conflict(id)) => self
                .store
                .find_by_fingerprint(&job_type, &fingerprint)
                .await?
                .ok_or(QueueError::Conflict(id)),
            Err(e) => Err(e),
        }
    }

    pub async fn get(&self, job_id: Uuid) -> Result<Option<Job>> {
        self.store.get(job_id).await
    }

    pub async fn list(&self, status: Option<JobStatus>, limit: u32) -> Result<Vec<Job>> {
        self.store.list(status, limit).await
    }

    /// Request cancellation. Only a still-queued job actually flips to
    /// `canceled`; a running job finishes its current attempt and a terminal
    /// job is returned unchanged. `None` means no such job.
    pub async fn cancel(&self, job_id: Uuid) -> Result<Option<Job>> {
        let Some(job) = self.store.get(job_id).await? else {
            return Ok(None);
        };
        if job.status.is_terminal() {
            return Ok(Some(job));
        }

        if self.store.cancel_if_queued(job_id).await? {
            tracing::info!(job_id = %job_id, "job canceled");
        }
        // Either we canceled it, or a concurrent claim beat us and the job
        // is running now. Report whatever the store says.
        self.store.get(job_id).await
    }
}
