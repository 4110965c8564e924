//! Job worker service for processing background jobs.
//!
//! ```text
//! JobWorker
//!     │
//!     ├─► Poll store (claim jobs via JobStore, FOR UPDATE SKIP LOCKED)
//!     ├─► Look up handler by job_type (JobRegistry)
//!     ├─► handler.handle(args)
//!     └─► Mark succeeded / failed (backoff or dead letter)
//! ```

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::job::Job;
use super::queue::JobStore;
use super::registry::JobRegistry;

/// Configuration for the job worker.
#[derive(Debug, Clone)]
pub struct JobWorkerConfig {
    /// Maximum number of jobs to claim at once
    pub batch_size: i64,
    /// How long to wait when no jobs are available
    pub poll_interval: Duration,
    /// Worker ID for this instance
    pub worker_id: String,
}

impl Default for JobWorkerConfig {
    fn default() -> Self {
        Self {
            batch_size: 10,
            poll_interval: Duration::from_secs(1),
            worker_id: format!("worker-{}", Uuid::new_v4()),
        }
    }
}

impl JobWorkerConfig {
    /// Create a new config with a specific worker ID.
    pub fn with_worker_id(worker_id: impl Into<String>) -> Self {
        Self {
            worker_id: worker_id.into(),
            ..Default::default()
        }
    }
}

/// A job worker that processes jobs from a queue.
pub struct JobWorker<S: JobStore> {
    store: Arc<S>,
    registry: Arc<JobRegistry>,
    config: JobWorkerConfig,
}

impl<S: JobStore + 'static> JobWorker<S> {
    pub fn new(store: Arc<S>, registry: Arc<JobRegistry>) -> Self {
        Self::with_config(store, registry, JobWorkerConfig::default())
    }

    pub fn with_config(store: Arc<S>, registry: Arc<JobRegistry>, config: JobWorkerConfig) -> Self {
        Self {
            store,
            registry,
            config,
        }
    }

    /// Process a single claimed job.
    async fn process_job(&self, job: Job) {
        let job_id = job.id;

        let Some(handler) = self.registry.get(&job.job_type) else {
            error!(job_id = %job_id, job_type = %job.job_type, "unknown job type");
            let msg = format!("unknown job type: {}", job.job_type);
            if let Err(e) = self.store.mark_failed(&job, &msg, false).await {
                error!(job_id = %job_id, error = %e, "failed to mark job as failed");
            }
            return;
        };

        match handler.handle(job.args.clone()).await {
            Ok(()) => {
                debug!(job_id = %job_id, job_type = %job.job_type, "job succeeded");
                if let Err(e) = self.store.mark_succeeded(job_id).await {
                    error!(job_id = %job_id, error = %e, "failed to mark job as succeeded");
                }
            }
            Err(e) => {
                warn!(
                    job_id = %job_id,
                    job_type = %job.job_type,
                    attempt = job.attempt,
                    max_attempts = job.max_attempts,
                    error = %e,
                    "job failed"
                );
                if let Err(e) = self.store.mark_failed(&job, &e.to_string(), true).await {
                    error!(job_id = %job_id, error = %e, "failed to mark job as failed");
                }
            }
        }
    }

    /// Claim and run one batch. Returns how many jobs were processed.
    pub async fn run_once(&self) -> anyhow::Result<usize> {
        let jobs = self
            .store
            .claim_ready(&self.config.worker_id, self.config.batch_size)
            .await?;
        let count = jobs.len();
        if count > 0 {
            debug!(count, "claimed jobs");
        }

        futures::future::join_all(jobs.into_iter().map(|job| self.process_job(job))).await;
        Ok(count)
    }

    /// Poll until `shutdown` is cancelled. The batch in flight is finished
    /// before returning.
    pub async fn run(self, shutdown: CancellationToken) {
        info!(
            worker_id = %self.config.worker_id,
            batch_size = self.config.batch_size,
            job_types = ?self.registry.job_types(),
            "job worker starting"
        );

        loop {
            if shutdown.is_cancelled() {
                break;
            }

            let processed = match self.run_once().await {
                Ok(n) => n,
                Err(e) => {
                    error!(error = %e, "failed to claim jobs");
                    0
                }
            };

            if processed == 0 {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = tokio::time::sleep(self.config.poll_interval) => {}
                }
            }
        }

        info!(worker_id = %self.config.worker_id, "job worker stopped");
    }
}
