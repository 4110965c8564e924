//! Operator remediation for rows that exhausted their retries or were
//! abandoned mid-send.

use chrono::{Duration, Utc};
use serde_json::json;
use tracing::info;

use super::job::SEND_EMAIL_JOB;
use crate::common::CoreResult;
use crate::kernel::ServerDeps;

/// Schedule a fresh delivery job for up to `limit` failed rows.
pub async fn requeue_failed(deps: &ServerDeps, limit: i64) -> CoreResult<usize> {
    let failed = deps.store.list_failed_email_outbox(limit).await?;

    let mut scheduled = 0;
    for row in &failed {
        let result = deps
            .jobs
            .enqueue(
                SEND_EMAIL_JOB,
                json!({ "outbox_id": row.id }),
                deps.settings.job_options(format!("email:{}", row.id)),
            )
            .await?;
        if result.is_created() {
            scheduled += 1;
        }
    }

    info!(found = failed.len(), scheduled, "Requeued failed emails");
    Ok(scheduled)
}

/// Move rows stuck in `sending` for longer than `older_than` to `failed`.
pub async fn release_stale_sending(deps: &ServerDeps, older_than: Duration) -> CoreResult<u64> {
    let cutoff = Utc::now() - older_than;
    let released = deps.store.release_stale_sending(cutoff).await?;
    info!(released, cutoff = %cutoff, "Released stale sending emails");
    Ok(released)
}
