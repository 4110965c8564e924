//! Single signed delivery with failure accounting.

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::domains::webhooks::models::{sign_payload, Webhook, EVENT_HEADER, SIGNATURE_HEADER};
use crate::kernel::ServerDeps;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Delivered { status: u16 },
    Failed { reason: String, disabled: bool },
}

impl DeliveryOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, DeliveryOutcome::Delivered { .. })
    }
}

/// POST `payload` to one subscriber and update its health counters.
///
/// Never returns an error: a timeout, a network error and a non-2xx answer
/// all count as one failure against the subscription.
pub async fn deliver(deps: &ServerDeps, webhook: &Webhook, event: &str, payload: &Value) -> DeliveryOutcome {
    let reason = match post_signed(deps, webhook, event, payload).await {
        Ok(status) if (200..300).contains(&status) => {
            if let Err(e) = deps.store.record_webhook_success(webhook.id).await {
                warn!(webhook_id = %webhook.id, error = %e, "Failed to record webhook success");
            }
            debug!(webhook_id = %webhook.id, event, status, "Webhook delivered");
            return DeliveryOutcome::Delivered { status };
        }
        Ok(status) => format!("non-success status {}", status),
        Err(e) => e.to_string(),
    };

    let threshold = deps.settings.webhook_failure_threshold;
    let disabled = match deps.store.record_webhook_failure(webhook.id, threshold).await {
        Ok(Some(updated)) => {
            if webhook.is_active && !updated.is_active {
                info!(
                    webhook_id = %webhook.id,
                    failure_count = updated.failure_count,
                    "Webhook disabled after repeated failures"
                );
            }
            !updated.is_active
        }
        Ok(None) => false,
        Err(e) => {
            warn!(webhook_id = %webhook.id, error = %e, "Failed to record webhook failure");
            false
        }
    };

    warn!(webhook_id = %webhook.id, url = %webhook.url, event, reason = %reason, "Webhook delivery failed");
    DeliveryOutcome::Failed { reason, disabled }
}

async fn post_signed(deps: &ServerDeps, webhook: &Webhook, event: &str, payload: &Value) -> anyhow::Result<u16> {
    let body = serde_json::to_vec(payload)?;
    let signature = sign_payload(&webhook.secret, &body)?;

    let headers = vec![
        ("Content-Type".to_string(), "application/json".to_string()),
        (SIGNATURE_HEADER.to_string(), signature),
        (EVENT_HEADER.to_string(), event.to_string()),
    ];

    let response = deps
        .webhook_client
        .post(&webhook.url, body, headers, deps.settings.webhook_timeout)
        .await?;
    Ok(response.status)
}
