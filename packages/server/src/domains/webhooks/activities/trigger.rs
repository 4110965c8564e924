//! Event fan-out to every active subscriber.

use chrono::Utc;
use futures::future::join_all;
use serde_json::{json, Value};
use tracing::{info, warn};

use super::deliver::deliver;
use crate::common::UserId;
use crate::kernel::ServerDeps;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TriggerSummary {
    pub delivered: usize,
    pub failed: usize,
}

/// Deliver `event` to all active subscriptions, in parallel.
///
/// Scoped to one owner's subscriptions when `owner` is set. Each delivery is
/// isolated; failures are logged and counted, never returned.
pub async fn trigger(deps: &ServerDeps, event: &str, data: Value, owner: Option<UserId>) -> TriggerSummary {
    let webhooks = match deps.store.list_active_webhooks_for_event(event, owner).await {
        Ok(webhooks) => webhooks,
        Err(e) => {
            warn!(event, error = %e, "Failed to load webhook subscriptions");
            return TriggerSummary::default();
        }
    };

    if webhooks.is_empty() {
        return TriggerSummary::default();
    }

    let payload = json!({
        "event": event,
        "timestamp": Utc::now().to_rfc3339(),
        "data": data,
    });

    let outcomes = join_all(webhooks.iter().map(|w| deliver(deps, w, event, &payload))).await;

    let delivered = outcomes.iter().filter(|o| o.is_delivered()).count();
    let summary = TriggerSummary {
        delivered,
        failed: outcomes.len() - delivered,
    };
    info!(event, delivered = summary.delivered, failed = summary.failed, "Webhook fan-out complete");
    summary
}

/// Fire-and-forget [`trigger`] on the background tracker.
pub fn spawn_trigger(deps: &ServerDeps, event: &'static str, data: Value, owner: Option<UserId>) {
    let task_deps = deps.clone();
    deps.spawn_background("webhook_trigger", async move {
        trigger(&task_deps, event, data, owner).await;
        Ok(())
    });
}
