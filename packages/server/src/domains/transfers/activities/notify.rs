use serde_json::{json, Value};

use crate::common::UserId;
use crate::domains::outbox::{self, EmailRequest, EmailTemplate};
use crate::domains::transfers::models::TransferRequest;
use crate::domains::webhooks;
use crate::kernel::{shelter_room, ServerDeps};

fn event_data(request: &TransferRequest) -> Value {
    json!({
        "transfer_id": request.id,
        "pet_id": request.pet_id,
        "from_shelter_id": request.from_shelter_id,
        "to_shelter_id": request.to_shelter_id,
        "status": request.status,
    })
}

/// Webhook to `owner`'s subscriptions and realtime to both shelters.
pub fn transfer_event(deps: &ServerDeps, event: &'static str, request: &TransferRequest, owner: UserId) {
    let data = event_data(request);
    webhooks::activities::spawn_trigger(deps, event, data.clone(), Some(owner));

    let realtime = deps.realtime.clone();
    let rooms = [
        shelter_room(request.from_shelter_id),
        shelter_room(request.to_shelter_id),
    ];
    deps.spawn_background("transfer_realtime", async move {
        for room in rooms {
            realtime.publish(&room, event, data.clone()).await;
        }
        Ok(())
    });
}

/// Tell the requester how their transfer was decided.
pub fn decision_email(deps: &ServerDeps, request: &TransferRequest) {
    let task_deps = deps.clone();
    let request = request.clone();
    deps.spawn_background("transfer_decision_email", async move {
        let requester = task_deps
            .store
            .find_user(request.requested_by)
            .await?
            .ok_or_else(|| anyhow::anyhow!("requester {} not found", request.requested_by))?;
        let pet_name = task_deps
            .store
            .find_pet(request.pet_id)
            .await?
            .map(|p| p.name)
            .unwrap_or_default();
        let to_shelter_name = task_deps
            .store
            .find_shelter(request.to_shelter_id)
            .await?
            .map(|s| s.name)
            .unwrap_or_default();

        outbox::enqueue_email(
            &task_deps,
            EmailRequest {
                dedup_key: format!("transfer-decision:{}:{}", request.id, request.status),
                to: requester.email,
                template: EmailTemplate::TransferDecision,
                payload: json!({
                    "pet_name": pet_name,
                    "decision": request.status,
                    "to_shelter_name": to_shelter_name,
                    "note": request.decision_note,
                }),
            },
        )
        .await?;
        Ok(())
    });
}
