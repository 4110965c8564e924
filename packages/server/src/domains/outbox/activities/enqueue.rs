//! Record an email in the outbox and schedule its delivery.

use serde_json::json;
use tracing::{debug, info};

use super::job::SEND_EMAIL_JOB;
use crate::common::CoreResult;
use crate::domains::outbox::models::{EmailOutbox, EmailStatus, EmailTemplate};
use crate::kernel::ServerDeps;

#[derive(Debug, Clone)]
pub struct EmailRequest {
    /// Business key, `<domain>:<entity id>:<variant>`
    pub dedup_key: String,
    pub to: String,
    pub template: EmailTemplate,
    pub payload: serde_json::Value,
}

/// Upsert the outbox row for `request.dedup_key` and schedule a send job.
///
/// An existing row is returned untouched. No job is scheduled for a row that
/// was already sent.
pub async fn enqueue_email(deps: &ServerDeps, request: EmailRequest) -> CoreResult<EmailOutbox> {
    let row = EmailOutbox::builder()
        .dedup_key(request.dedup_key)
        .email_type(request.template.as_str())
        .to_address(request.to)
        .payload(request.payload)
        .build();

    let row = deps.store.upsert_email_outbox(&row).await?;

    if row.status == EmailStatus::Sent {
        debug!(outbox_id = %row.id, dedup_key = %row.dedup_key, "Email already sent, not scheduling");
        return Ok(row);
    }

    let result = deps
        .jobs
        .enqueue(
            SEND_EMAIL_JOB,
            json!({ "outbox_id": row.id }),
            deps.settings.job_options(format!("email:{}", row.id)),
        )
        .await?;

    info!(
        outbox_id = %row.id,
        dedup_key = %row.dedup_key,
        job_id = %result.job_id(),
        created = result.is_created(),
        "Email delivery scheduled"
    );
    Ok(row)
}

/// Fire-and-forget [`enqueue_email`] on the background tracker.
pub fn spawn_email(deps: &ServerDeps, request: EmailRequest) {
    let task_deps = deps.clone();
    deps.spawn_background("email_enqueue", async move {
        enqueue_email(&task_deps, request).await?;
        Ok(())
    });
}
