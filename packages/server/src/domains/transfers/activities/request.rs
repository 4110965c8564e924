use serde_json::json;
use tracing::info;

use super::notify;
use crate::common::{Actor, Capability, CoreError, CoreResult, PetId, ShelterId};
use crate::domains::audit;
use crate::domains::transfers::models::TransferRequest;
use crate::kernel::ServerDeps;

#[derive(Debug, Clone)]
pub struct RequestTransferInput {
    pub pet_id: PetId,
    pub to_shelter_id: ShelterId,
}

/// Open a transfer of a pet from its current shelter to another one.
pub async fn request_transfer(
    actor: &Actor,
    input: RequestTransferInput,
    deps: &ServerDeps,
) -> CoreResult<TransferRequest> {
    let pet = deps
        .store
        .find_pet(input.pet_id)
        .await?
        .ok_or_else(|| CoreError::not_found("pet", input.pet_id))?;
    let from = pet.shelter_id;

    actor.can(Capability::ShelterStaff(from)).check(deps).await?;

    if from == input.to_shelter_id {
        return Err(CoreError::Validation(
            "source and destination shelter are the same".into(),
        ));
    }
    if !pet.is_active {
        return Err(CoreError::Validation(format!("pet {} is not active", pet.id)));
    }

    let target = deps
        .store
        .find_shelter(input.to_shelter_id)
        .await?
        .ok_or_else(|| CoreError::not_found("shelter", input.to_shelter_id))?;
    if !target.is_active {
        return Err(CoreError::Validation(format!("shelter {} is not active", target.id)));
    }

    if let Some(pending) = deps.store.find_pending_transfer_for_pet(pet.id).await? {
        return Err(CoreError::Conflict(format!(
            "transfer {} is already pending for pet {}",
            pending.id, pet.id
        )));
    }

    let request = deps
        .store
        .insert_transfer_request(&TransferRequest::pending(pet.id, from, target.id, actor.user_id))
        .await?;

    info!(transfer_id = %request.id, pet_id = %pet.id, from = %from, to = %target.id, "Transfer requested");

    audit::record(
        deps,
        Some(actor.user_id),
        "transfer.requested",
        "transfer_request",
        request.id,
        json!({ "pet_id": pet.id, "from": from, "to": target.id }),
    )
    .await;
    notify::transfer_event(deps, "transfer.requested", &request, target.owner_id);

    Ok(request)
}
