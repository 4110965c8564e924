//! Job model for background execution.

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use typed_builder::TypedBuilder;
use uuid::Uuid;

// ============================================================================
// Enums
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, Default)]
#[sqlx(type_name = "job_status", rename_all = "snake_case")]
pub enum JobStatus {
    #[default]
    Pending,
    Running,
    Succeeded,
    /// Attempts exhausted
    DeadLetter,
}

// ============================================================================
// Job Model
// ============================================================================

#[derive(FromRow, Debug, Clone, Serialize, Deserialize, TypedBuilder)]
#[builder(field_defaults(setter(into)))]
pub struct Job {
    #[builder(default = Uuid::now_v7())]
    pub id: Uuid,
    pub job_type: String,
    #[builder(default = serde_json::Value::Null)]
    pub args: serde_json::Value,
    #[builder(default)]
    pub status: JobStatus,

    // Retry policy
    /// Attempts made so far
    #[builder(default = 0)]
    pub attempt: i32,
    #[builder(default = 5)]
    pub max_attempts: i32,
    #[builder(default = 1500)]
    pub backoff_initial_ms: i64,
    #[builder(default, setter(strip_option))]
    pub next_run_at: Option<DateTime<Utc>>,

    // Lease management
    #[builder(default, setter(strip_option))]
    pub worker_id: Option<String>,
    #[builder(default, setter(strip_option))]
    pub lease_expires_at: Option<DateTime<Utc>>,

    #[builder(default, setter(strip_option))]
    pub idempotency_key: Option<String>,
    #[builder(default, setter(strip_option))]
    pub error_message: Option<String>,

    #[builder(default = Utc::now())]
    pub created_at: DateTime<Utc>,
    #[builder(default = Utc::now())]
    pub updated_at: DateTime<Utc>,
}

/// Delay before retry number `attempt` (1-based): `initial * 2^(attempt-1)`,
/// capped at one hour.
pub fn backoff_delay(initial_ms: i64, attempt: i32) -> Duration {
    let exponent = (attempt.max(1) - 1).min(20) as u32;
    let ms = initial_ms.saturating_mul(2i64.saturating_pow(exponent));
    Duration::milliseconds(ms.min(3_600_000))
}

// =============================================================================
// SQL Queries - ALL queries must be in models/
// =============================================================================

impl Job {
    pub async fn find_by_id(id: Uuid, pool: &PgPool) -> Result<Option<Self>> {
        sqlx::query_as::<_, Self>("SELECT * FROM jobs WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
            .map_err(Into::into)
    }

    /// Pending or running job holding `key`, if any.
    pub async fn find_active_by_idempotency_key(key: &str, pool: &PgPool) -> Result<Option<Self>> {
        sqlx::query_as::<_, Self>(
            r#"
            SELECT * FROM jobs
            WHERE idempotency_key = $1
              AND status IN ('pending', 'running')
            LIMIT 1
            "#,
        )
        .bind(key)
        .fetch_optional(pool)
        .await
        .map_err(Into::into)
    }

    pub async fn insert(&self, pool: &PgPool) -> Result<Self> {
        sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO jobs (
                id, job_type, args, status, attempt, max_attempts, backoff_initial_ms,
                next_run_at, worker_id, lease_expires_at, idempotency_key, error_message,
                created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            RETURNING *
            "#,
        )
        .bind(self.id)
        .bind(&self.job_type)
        .bind(&self.args)
        .bind(self.status)
        .bind(self.attempt)
        .bind(self.max_attempts)
        .bind(self.backoff_initial_ms)
        .bind(self.next_run_at)
        .bind(&self.worker_id)
        .bind(self.lease_expires_at)
        .bind(&self.idempotency_key)
        .bind(&self.error_message)
        .bind(self.created_at)
        .bind(self.updated_at)
        .fetch_one(pool)
        .await
        .map_err(Into::into)
    }

    /// Claim jobs atomically using FOR UPDATE SKIP LOCKED
    /// Also recovers running jobs whose lease expired
    pub async fn claim_ready(
        limit: i64,
        worker_id: &str,
        lease_duration_ms: i64,
        pool: &PgPool,
    ) -> Result<Vec<Self>> {
        sqlx::query_as::<_, Self>(
            r#"
            WITH next_jobs AS (
                SELECT id
                FROM jobs
                WHERE
                    (status = 'pending' AND (next_run_at IS NULL OR next_run_at <= NOW()))
                    OR (status = 'running' AND lease_expires_at < NOW())
                ORDER BY COALESCE(next_run_at, created_at)
                LIMIT $1
                FOR UPDATE SKIP LOCKED
            )
            UPDATE jobs
            SET
                status = 'running',
                attempt = attempt + 1,
                lease_expires_at = NOW() + ($2 || ' milliseconds')::INTERVAL,
                worker_id = $3,
                updated_at = NOW()
            WHERE id IN (SELECT id FROM next_jobs)
            RETURNING *
            "#,
        )
        .bind(limit)
        .bind(lease_duration_ms.to_string())
        .bind(worker_id)
        .fetch_all(pool)
        .await
        .map_err(Into::into)
    }

    pub async fn mark_succeeded(id: Uuid, pool: &PgPool) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE jobs
            SET status = 'succeeded', lease_expires_at = NULL, error_message = NULL, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(pool)
        .await?;

        Ok(())
    }

    /// Back to `pending` at `retry_at`, or dead-lettered when `retry_at` is
    /// `None`.
    pub async fn mark_failed(
        id: Uuid,
        error: &str,
        retry_at: Option<DateTime<Utc>>,
        pool: &PgPool,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE jobs
            SET status = CASE WHEN $3::timestamptz IS NULL THEN 'dead_letter'::job_status ELSE 'pending'::job_status END,
                next_run_at = $3,
                error_message = $2,
                lease_expires_at = NULL,
                worker_id = NULL,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(error)
        .bind(retry_at)
        .execute(pool)
        .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_from_initial_delay() {
        assert_eq!(backoff_delay(1500, 1), Duration::milliseconds(1500));
        assert_eq!(backoff_delay(1500, 2), Duration::milliseconds(3000));
        assert_eq!(backoff_delay(1500, 4), Duration::milliseconds(12000));
    }

    #[test]
    fn backoff_is_capped() {
        assert_eq!(backoff_delay(1500, 40), Duration::milliseconds(3_600_000));
    }

    #[test]
    fn builder_defaults() {
        let job = Job::builder().job_type("email.send").build();
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.attempt, 0);
        assert_eq!(job.max_attempts, 5);
    }
}
