//! PostgreSQL-backed job queue implementation.

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;
use tracing::debug;
use uuid::Uuid;

use super::job::{backoff_delay, Job};
use crate::kernel::{BaseJobScheduler, EnqueueResult, JobOptions};

/// Worker-side view of a job queue.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Claim up to `limit` ready jobs for `worker_id`.
    async fn claim_ready(&self, worker_id: &str, limit: i64) -> Result<Vec<Job>>;

    async fn mark_succeeded(&self, job_id: Uuid) -> Result<()>;

    /// Reschedule with backoff while attempts remain and `retryable`;
    /// otherwise dead-letter.
    async fn mark_failed(&self, job: &Job, error: &str, retryable: bool) -> Result<()>;
}

/// PostgreSQL-backed job queue.
pub struct PostgresJobQueue {
    pool: PgPool,
    lease_duration_ms: i64,
}

impl PostgresJobQueue {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            lease_duration_ms: 60_000, // 1 minute
        }
    }

    /// Create with a custom lease duration.
    pub fn with_lease_duration(pool: PgPool, lease_duration_ms: i64) -> Self {
        Self {
            pool,
            lease_duration_ms,
        }
    }
}

#[async_trait]
impl BaseJobScheduler for PostgresJobQueue {
    async fn enqueue(
        &self,
        job_type: &str,
        payload: serde_json::Value,
        options: JobOptions,
    ) -> Result<EnqueueResult> {
        // Check idempotency first
        if let Some(key) = &options.idempotency_key {
            if let Some(existing) = Job::find_active_by_idempotency_key(key, &self.pool).await? {
                debug!(job_id = %existing.id, key = %key, "job already queued");
                return Ok(EnqueueResult::Duplicate(existing.id));
            }
        }

        let job = Job::builder()
            .job_type(job_type)
            .args(payload)
            .max_attempts(options.max_attempts)
            .backoff_initial_ms(options.backoff_initial_ms)
            .build();
        let job = Job {
            idempotency_key: options.idempotency_key,
            ..job
        };

        let inserted = job.insert(&self.pool).await?;
        Ok(EnqueueResult::Created(inserted.id))
    }
}

#[async_trait]
impl JobStore for PostgresJobQueue {
    async fn claim_ready(&self, worker_id: &str, limit: i64) -> Result<Vec<Job>> {
        Job::claim_ready(limit, worker_id, self.lease_duration_ms, &self.pool).await
    }

    async fn mark_succeeded(&self, job_id: Uuid) -> Result<()> {
        Job::mark_succeeded(job_id, &self.pool).await
    }

    async fn mark_failed(&self, job: &Job, error: &str, retryable: bool) -> Result<()> {
        let retry_at = (retryable && job.attempt < job.max_attempts)
            .then(|| Utc::now() + backoff_delay(job.backoff_initial_ms, job.attempt));
        Job::mark_failed(job.id, error, retry_at, &self.pool).await
    }
}
