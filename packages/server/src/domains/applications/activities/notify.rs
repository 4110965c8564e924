//! Side effects fanned out after an application write.
//!
//! Everything here runs on the background tracker; nothing can fail the
//! write that triggered it.

use serde_json::{json, Value};

use crate::domains::applications::models::{Application, ApplicationStatus};
use crate::domains::outbox::{self, EmailRequest, EmailTemplate};
use crate::domains::{shelters, webhooks};
use crate::kernel::{shelter_room, user_room, ServerDeps};

fn event_data(application: &Application) -> Value {
    json!({
        "application_id": application.id,
        "pet_id": application.pet_id,
        "adopter_id": application.adopter_id,
        "shelter_id": application.shelter_id,
        "status": application.status,
        "version": application.version,
    })
}

fn publish(deps: &ServerDeps, room: String, event: &'static str, data: Value) {
    let realtime = deps.realtime.clone();
    deps.spawn_background("application_realtime", async move {
        realtime.publish(&room, event, data).await;
        Ok(())
    });
}

/// Webhook to the shelter owner's subscriptions plus the shelter dashboard.
pub async fn application_event(deps: &ServerDeps, event: &'static str, application: &Application) {
    let data = event_data(application);
    let owner = shelters::activities::owner_of(deps, application.shelter_id).await;
    webhooks::activities::spawn_trigger(deps, event, data.clone(), owner);
    publish(deps, shelter_room(application.shelter_id), event, data);
}

/// Reviewer changed the status: tell the shelter's subscribers, the adopter's
/// session and the adopter's inbox.
pub async fn status_changed(deps: &ServerDeps, application: &Application) {
    let data = event_data(application);
    let owner = shelters::activities::owner_of(deps, application.shelter_id).await;
    webhooks::activities::spawn_trigger(deps, "application.status_changed", data.clone(), owner);
    publish(deps, user_room(application.adopter_id), "application.status_changed", data);

    let task_deps = deps.clone();
    let application = application.clone();
    deps.spawn_background("application_status_email", async move {
        send_status_email(&task_deps, &application).await
    });
}

async fn send_status_email(deps: &ServerDeps, application: &Application) -> anyhow::Result<()> {
    let adopter = deps
        .store
        .find_user(application.adopter_id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("adopter {} not found", application.adopter_id))?;
    let pet_name = deps
        .store
        .find_pet(application.pet_id)
        .await?
        .map(|p| p.name)
        .unwrap_or_default();

    let status: ApplicationStatus = application.status;
    outbox::enqueue_email(
        deps,
        EmailRequest {
            dedup_key: format!("application-status:{}:{}", application.id, status),
            to: adopter.email,
            template: EmailTemplate::ApplicationStatus,
            payload: json!({
                "pet_name": pet_name,
                "status": status,
                "adopter_name": adopter.display_name,
                "notes": application.notes,
            }),
        },
    )
    .await?;
    Ok(())
}
