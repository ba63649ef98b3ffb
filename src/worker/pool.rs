use std::sync::Arc;

use serde_json::json;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::config::QueueConfig;
use crate::error::Result;
use crate::handler::HandlerRegistry;
use crate::queue::job::JobStatus;
use crate::store::JobStore;

/// Polling coordinator driving a bounded pool of concurrent executors.
///
/// Each pool value carries a distinct worker identity; several pools (in one
/// process or many) can share a store, and the claim CAS guarantees a job is
/// only ever owned by one of them at a time.
#[derive(Clone)]
pub struct WorkerPool {
    store: JobStore,
    handlers: Arc<HandlerRegistry>,
    config: QueueConfig,
    identity: Uuid,
}

impl WorkerPool {
    pub fn new(store: JobStore, handlers: Arc<HandlerRegistry>, config: QueueConfig) -> Self {
        Self {
            store,
            handlers,
            config,
            identity: Uuid::new_v4(),
        }
    }

    /// The identity this pool claims jobs under.
    pub fn identity(&self) -> Uuid {
        self.identity
    }

    /// Run poll cycles until the token is cancelled. A cycle that cannot
    /// reach the store is logged and retried on the next tick; the loop
    /// itself never exits on store failure.
    pub async fn run(&self, shutdown: CancellationToken) {
        tracing::info!(worker = %self.identity, "worker pool started");
        let mut interval = tokio::time::interval(self.config.poll_interval);
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    tracing::info!(worker = %self.identity, "worker pool shutting down");
                    break;
                }
                _ = interval.tick() => {
                    if let Err(err) = self.poll_cycle().await {
                        tracing::warn!(worker = %self.identity, error = %err,
                            "poll cycle failed, retrying next interval");
                    }
                }
            }
        }
    }

    /// One cycle: claim up to `max_concurrency` queued jobs, dispatch them
    /// concurrently, and wait for all of them before returning. Returns how
    /// many jobs this cycle claimed.
    ///
    /// The barrier at the end bounds in-flight work: the queue drains at
    /// most `max_concurrency` jobs per cycle regardless of depth.
    pub async fn poll_cycle(&self) -> Result<usize> {
        let candidates = self
            .store
            .claimable(self.config.max_concurrency as u32)
            .await?;

        let mut tasks = JoinSet::new();
        let mut claimed = 0;
        let mut claim_failure = None;
        for job in candidates {
            // Candidates are a snapshot; the CAS decides ownership. Losing
            // it (another coordinator, or a cancel) just skips the job.
            match self.store.claim(job.job_id, self.identity).await {
                Ok(true) => {
                    claimed += 1;
                    let pool = self.clone();
                    tasks.spawn(async move { pool.execute_claimed(job.job_id).await });
                }
                Ok(false) => {
                    tracing::debug!(job_id = %job.job_id, "claim lost, skipping");
                }
                Err(err) => {
                    // Stop claiming, but fall through to the barrier: jobs
                    // already dispatched must finish and write their
                    // transitions. Dropping the JoinSet would abort them
                    // and strand their rows as running.
                    tracing::warn!(worker = %self.identity, job_id = %job.job_id,
                        error = %err, "claim failed, stopping claims for this cycle");
                    claim_failure = Some(err);
                    break;
                }
            }
        }

        while let Some(joined) = tasks.join_next().await {
            if let Err(err) = joined {
                tracing::error!(worker = %self.identity, error = %err, "executor task panicked");
            }
        }

        match claim_failure {
            Some(err) => Err(err),
            None => Ok(claimed),
        }
    }

    async fn execute_claimed(&self, job_id: Uuid) {
        if let Err(err) = self.try_execute(job_id).await {
            // A store failure mid-execution leaves the row claimed; the
            // at-least-once contract covers re-running it after recovery.
            tracing::error!(job_id = %job_id, error = %err, "store error during execution");
        }
    }

    async fn try_execute(&self, job_id: Uuid) -> Result<()> {
        // Re-read and verify ownership before running anything: the claim
        // could be stale if this coordinator was raced or the row changed
        // between listing and dispatch.
        let Some(job) = self.store.get(job_id).await? else {
            tracing::warn!(job_id = %job_id, "claimed job disappeared");
            return Ok(());
        };
        if job.status != JobStatus::Running || job.locked_by != Some(self.identity) {
            tracing::warn!(job_id = %job_id, status = %job.status, "ownership lost, aborting");
            return Ok(());
        }

        let handler = self.handlers.resolve(&job.job_type);
        match handler.execute(&job.payload).await {
            Ok(result) => {
                if self.store.mark_succeeded(job_id, self.identity, &result).await? {
                    tracing::info!(job_id = %job_id, job_type = %job.job_type, "job succeeded");
                } else {
                    tracing::warn!(job_id = %job_id, "success transition rejected by store");
                }
            }
            Err(err) if job.retry_count < self.config.retry_limit => {
                tracing::warn!(job_id = %job_id, error = %err,
                    retry_count = job.retry_count, "job attempt failed, re-queueing");
                tokio::time::sleep(self.config.retry_backoff).await;
                if !self.store.requeue_for_retry(job_id, self.identity).await? {
                    tracing::warn!(job_id = %job_id, "retry transition rejected by store");
                }
            }
            Err(err) => {
                let detail = json!({ "error": err.to_string() });
                if self.store.mark_failed(job_id, self.identity, &detail).await? {
                    tracing::warn!(job_id = %job_id, error = %err,
                        retry_count = job.retry_count, "job failed permanently");
                } else {
                    tracing::warn!(job_id = %job_id, "failure transition rejected by store");
                }
            }
        }
        Ok(())
    }
}
