//! Webhook actions - fan-out, delivery and subscription management

mod deliver;
mod manage;
mod trigger;

pub use deliver::{deliver, DeliveryOutcome};
pub use manage::{
    list_webhooks, register_webhook, rotate_webhook_secret, send_test_webhook,
    set_webhook_active, RegisterWebhookInput,
};
pub use trigger::{spawn_trigger, trigger, TriggerSummary};
