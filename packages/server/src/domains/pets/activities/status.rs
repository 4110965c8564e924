//! Pet status changes through the transition table.

use chrono::Utc;
use serde_json::json;
use tracing::info;

use crate::common::{Actor, Capability, CoreError, CoreResult, PetId, UserId};
use crate::domains::pets::machines::{requires_vet_release, validate_transition};
use crate::domains::pets::models::{Pet, PetStatus};
use crate::domains::{audit, shelters, webhooks};
use crate::kernel::{shelter_room, ServerDeps};

/// Staff-initiated status change.
pub async fn update_pet_status(
    actor: &Actor,
    pet_id: PetId,
    to: PetStatus,
    deps: &ServerDeps,
) -> CoreResult<Pet> {
    let pet = deps
        .store
        .find_pet(pet_id)
        .await?
        .ok_or_else(|| CoreError::not_found("pet", pet_id))?;

    actor
        .can(Capability::ShelterStaff(pet.shelter_id))
        .check(deps)
        .await?;

    apply_pet_transition(deps, &pet, to, Some(actor.user_id)).await
}

/// Validate and apply `pet.status -> to`, then fan out the change.
///
/// Callers have done their own authorization. The write is conditional on
/// the pet still being in the status that was validated.
pub async fn apply_pet_transition(
    deps: &ServerDeps,
    pet: &Pet,
    to: PetStatus,
    actor_id: Option<UserId>,
) -> CoreResult<Pet> {
    let updated = write_pet_transition(deps, pet, to).await?;
    announce_pet_transition(deps, pet.status, &updated, actor_id).await;
    Ok(updated)
}

/// The conditional write of a transition, with no audit or fan-out.
pub(crate) async fn write_pet_transition(
    deps: &ServerDeps,
    pet: &Pet,
    to: PetStatus,
) -> CoreResult<Pet> {
    let from = pet.status;
    validate_transition(from, to)?;

    if requires_vet_release(from, to) && !deps.store.has_approved_vet_approval(pet.id).await? {
        return Err(CoreError::ReleaseGate);
    }

    let adoption_date = (to == PetStatus::Adopted).then(Utc::now);
    deps.store
        .update_pet_status_if(pet.id, from, to, adoption_date)
        .await?
        .ok_or_else(|| CoreError::Conflict(format!("pet {} is no longer {}", pet.id, from)))
}

/// Audit, webhooks and realtime for a transition that has been written.
pub(crate) async fn announce_pet_transition(
    deps: &ServerDeps,
    from: PetStatus,
    updated: &Pet,
    actor_id: Option<UserId>,
) {
    let to = updated.status;
    info!(pet_id = %updated.id, from = %from, to = %to, "Pet status changed");

    let details = json!({ "from": from, "to": to });
    audit::record(deps, actor_id, "pet.status_changed", "pet", updated.id, details).await;

    let data = json!({ "pet_id": updated.id, "shelter_id": updated.shelter_id, "from": from, "to": to });
    let owner = shelters::activities::owner_of(deps, updated.shelter_id).await;
    webhooks::activities::spawn_trigger(deps, "pet.status_changed", data.clone(), owner);

    let realtime = deps.realtime.clone();
    let room = shelter_room(updated.shelter_id);
    deps.spawn_background("pet_status_realtime", async move {
        realtime.publish(&room, "pet.status_changed", data).await;
        Ok(())
    });
}
