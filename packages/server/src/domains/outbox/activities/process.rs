//! Idempotent outbox worker entry point.

use tracing::{debug, info, warn};

use crate::common::{CoreError, CoreResult, EmailOutboxId};
use crate::domains::outbox::models::{EmailStatus, EmailTemplate};
use crate::kernel::ServerDeps;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// No such row
    Missing,
    AlreadySent,
    /// Another worker holds the row in `sending`
    InFlight,
    /// Lost the claim race
    NotClaimed,
    Sent,
}

impl ProcessOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessOutcome::Missing => "missing",
            ProcessOutcome::AlreadySent => "already_sent",
            ProcessOutcome::InFlight => "in_flight",
            ProcessOutcome::NotClaimed => "not_claimed",
            ProcessOutcome::Sent => "sent",
        }
    }
}

/// Deliver one outbox row, at most once.
///
/// Safe to call any number of times for the same id. Only a failed send
/// returns an error, so the job scheduler retries it; the row is left in
/// `failed` for the next attempt to claim.
pub async fn process_by_id(deps: &ServerDeps, id: EmailOutboxId) -> CoreResult<ProcessOutcome> {
    let Some(row) = deps.store.find_email_outbox(id).await? else {
        debug!(outbox_id = %id, "Outbox row missing, nothing to do");
        return Ok(ProcessOutcome::Missing);
    };

    match row.status {
        EmailStatus::Sent => return Ok(ProcessOutcome::AlreadySent),
        EmailStatus::Sending => return Ok(ProcessOutcome::InFlight),
        EmailStatus::Pending | EmailStatus::Failed => {}
    }

    let Some(row) = deps.store.claim_email_outbox(id).await? else {
        debug!(outbox_id = %id, "Outbox row claimed by another worker");
        return Ok(ProcessOutcome::NotClaimed);
    };

    let Some(template) = EmailTemplate::from_id(&row.email_type) else {
        let error = format!("unknown email template: {}", row.email_type);
        deps.store.mark_email_failed(id, &error).await?;
        return Err(CoreError::Validation(error));
    };
    let (subject, html) = template.render(&row.payload);

    match deps.mailer.send(&row.to_address, &subject, &html).await {
        Ok(()) => {
            deps.store.mark_email_sent(id).await?;
            info!(outbox_id = %id, dedup_key = %row.dedup_key, "Email sent");
            Ok(ProcessOutcome::Sent)
        }
        Err(e) => {
            let error = e.to_string();
            warn!(outbox_id = %id, attempts = row.attempts + 1, error = %error, "Email send failed");
            deps.store.mark_email_failed(id, &error).await?;
            Err(CoreError::ExternalDeliveryFailure(error))
        }
    }
}
