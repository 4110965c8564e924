//! Subscription management for webhook owners.

use serde_json::json;
use tracing::info;
use url::Url;

use super::deliver::{deliver, DeliveryOutcome};
use crate::common::{Actor, Capability, CoreError, CoreResult, UserId, WebhookId};
use crate::domains::webhooks::models::{generate_secret, is_known_event, Webhook};
use crate::kernel::ServerDeps;

#[derive(Debug, Clone)]
pub struct RegisterWebhookInput {
    pub url: String,
    pub events: Vec<String>,
}

fn validate(input: &RegisterWebhookInput) -> CoreResult<()> {
    let url = Url::parse(&input.url)
        .map_err(|e| CoreError::Validation(format!("invalid webhook url: {}", e)))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(CoreError::Validation(format!(
            "webhook url must be http or https, got {}",
            url.scheme()
        )));
    }

    if input.events.is_empty() {
        return Err(CoreError::Validation("at least one event is required".into()));
    }
    if let Some(unknown) = input.events.iter().find(|e| !is_known_event(e)) {
        return Err(CoreError::Validation(format!("unknown event: {}", unknown)));
    }
    Ok(())
}

/// Create a subscription owned by the actor.
///
/// The returned record carries the generated secret; it is not serialized
/// anywhere else, so this is the only time the owner sees it.
pub async fn register_webhook(actor: &Actor, input: RegisterWebhookInput, deps: &ServerDeps) -> CoreResult<Webhook> {
    validate(&input)?;

    let mut events = input.events;
    events.sort();
    events.dedup();

    let webhook = Webhook::builder()
        .user_id(actor.user_id)
        .url(input.url)
        .events(events)
        .secret(generate_secret())
        .build();
    let webhook = deps.store.insert_webhook(&webhook).await?;

    info!(webhook_id = %webhook.id, user_id = %actor.user_id, "Webhook registered");
    Ok(webhook)
}

async fn load_owned(actor: &Actor, id: WebhookId, deps: &ServerDeps) -> CoreResult<Webhook> {
    let webhook = deps
        .store
        .find_webhook(id)
        .await?
        .ok_or_else(|| CoreError::not_found("webhook", id))?;

    actor
        .can(Capability::OwnResource(webhook.user_id))
        .check(deps)
        .await?;
    Ok(webhook)
}

/// Enable or disable a subscription. Re-enabling clears the failure count.
pub async fn set_webhook_active(actor: &Actor, id: WebhookId, active: bool, deps: &ServerDeps) -> CoreResult<Webhook> {
    load_owned(actor, id, deps).await?;

    let updated = deps
        .store
        .set_webhook_active(id, active)
        .await?
        .ok_or_else(|| CoreError::not_found("webhook", id))?;

    info!(webhook_id = %id, active, "Webhook activation changed");
    Ok(updated)
}

/// Replace the signing secret and return the new one.
pub async fn rotate_webhook_secret(actor: &Actor, id: WebhookId, deps: &ServerDeps) -> CoreResult<String> {
    load_owned(actor, id, deps).await?;

    let secret = generate_secret();
    deps.store
        .set_webhook_secret(id, &secret)
        .await?
        .ok_or_else(|| CoreError::not_found("webhook", id))?;

    info!(webhook_id = %id, "Webhook secret rotated");
    Ok(secret)
}

pub async fn list_webhooks(actor: &Actor, owner: UserId, deps: &ServerDeps) -> CoreResult<Vec<Webhook>> {
    actor.can(Capability::OwnResource(owner)).check(deps).await?;
    Ok(deps.store.list_webhooks_for_owner(owner).await?)
}

/// Deliver a `webhook.test` event to one subscription and report the result.
pub async fn send_test_webhook(actor: &Actor, id: WebhookId, deps: &ServerDeps) -> CoreResult<DeliveryOutcome> {
    let webhook = load_owned(actor, id, deps).await?;

    let payload = json!({
        "event": "webhook.test",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "data": { "webhook_id": webhook.id },
    });
    Ok(deliver(deps, &webhook, "webhook.test", &payload).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(url: &str, events: &[&str]) -> RegisterWebhookInput {
        RegisterWebhookInput {
            url: url.to_string(),
            events: events.iter().map(|e| e.to_string()).collect(),
        }
    }

    #[test]
    fn accepts_https_with_known_events() {
        assert!(validate(&input("https://partner.example/hooks", &["pet.status_changed"])).is_ok());
        assert!(validate(&input("http://localhost:9000/in", &["webhook.test"])).is_ok());
    }

    #[test]
    fn rejects_bad_urls_and_events() {
        assert!(matches!(
            validate(&input("ftp://partner.example", &["webhook.test"])),
            Err(CoreError::Validation(_))
        ));
        assert!(matches!(
            validate(&input("not a url", &["webhook.test"])),
            Err(CoreError::Validation(_))
        ));
        assert!(matches!(
            validate(&input("https://partner.example", &[])),
            Err(CoreError::Validation(_))
        ));
        let err = validate(&input("https://partner.example", &["pet.deleted"])).unwrap_err();
        assert!(err.to_string().contains("pet.deleted"));
    }
}
