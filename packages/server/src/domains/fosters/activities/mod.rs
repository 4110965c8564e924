//! Foster actions - volunteers and pet placements

use serde_json::json;
use tracing::{info, warn};

use crate::common::{Actor, Capability, CoreError, CoreResult, FosterAssignmentId, FosterId, PetId, ShelterId, UserId};
use crate::domains::audit;
use crate::domains::fosters::models::{Foster, FosterAssignment, FosterAssignmentStatus};
use crate::domains::pets::activities::apply_pet_transition;
use crate::domains::pets::machines::can_transition;
use crate::domains::pets::models::PetStatus;
use crate::kernel::ServerDeps;

/// Enroll a user as a foster for a shelter. The phone is stored encrypted.
pub async fn register_foster(
    actor: &Actor,
    user_id: UserId,
    shelter_id: ShelterId,
    phone: Option<&str>,
    deps: &ServerDeps,
) -> CoreResult<Foster> {
    actor.can(Capability::ShelterStaff(shelter_id)).check(deps).await?;

    deps.store
        .find_user(user_id)
        .await?
        .ok_or_else(|| CoreError::not_found("user", user_id))?;

    let phone = deps
        .cipher
        .encrypt_opt(phone.map(str::trim).filter(|p| !p.is_empty()))
        .map_err(|e| CoreError::Store(e.into()))?;

    let foster = deps.store.insert_foster(&Foster::new(user_id, shelter_id, phone)).await?;

    info!(foster_id = %foster.id, shelter_id = %shelter_id, "Foster registered");
    audit::record(deps, Some(actor.user_id), "foster.registered", "foster", foster.id, json!({ "user_id": user_id })).await;
    Ok(foster)
}

/// Place a pet with a foster of the same shelter.
///
/// The pet moves to `fostered` when its current status allows it; otherwise
/// the placement is recorded and the status is left alone.
pub async fn assign_foster(
    actor: &Actor,
    foster_id: FosterId,
    pet_id: PetId,
    deps: &ServerDeps,
) -> CoreResult<FosterAssignment> {
    let pet = deps
        .store
        .find_pet(pet_id)
        .await?
        .ok_or_else(|| CoreError::not_found("pet", pet_id))?;

    actor
        .can(Capability::ShelterStaff(pet.shelter_id))
        .check(deps)
        .await?;

    let foster = deps
        .store
        .find_foster(foster_id)
        .await?
        .ok_or_else(|| CoreError::not_found("foster", foster_id))?;
    if !foster.is_active || foster.shelter_id != pet.shelter_id {
        return Err(CoreError::Validation(format!(
            "foster {} cannot take pets from shelter {}",
            foster.id, pet.shelter_id
        )));
    }

    let existing = deps.store.list_foster_assignments_for_pet(pet.id).await?;
    if existing.iter().any(|a| a.status == FosterAssignmentStatus::Active) {
        return Err(CoreError::Conflict(format!("pet {} is already in foster care", pet.id)));
    }

    let assignment = deps
        .store
        .insert_foster_assignment(&FosterAssignment::start(foster.id, pet.id, pet.shelter_id))
        .await?;

    info!(assignment_id = %assignment.id, pet_id = %pet.id, foster_id = %foster.id, "Pet placed in foster care");

    if can_transition(pet.status, PetStatus::Fostered) {
        if let Err(e) = apply_pet_transition(deps, &pet, PetStatus::Fostered, Some(actor.user_id)).await {
            warn!(pet_id = %pet.id, error = %e, "Foster placement recorded but pet status unchanged");
        }
    }

    audit::record(
        deps,
        Some(actor.user_id),
        "foster.assigned",
        "foster_assignment",
        assignment.id,
        json!({ "pet_id": pet.id, "foster_id": foster.id }),
    )
    .await;
    Ok(assignment)
}

/// Close a placement. A pet still marked `fostered` goes back to `available`.
pub async fn end_foster_assignment(
    actor: &Actor,
    assignment_id: FosterAssignmentId,
    deps: &ServerDeps,
) -> CoreResult<FosterAssignment> {
    let assignment = deps
        .store
        .find_foster_assignment(assignment_id)
        .await?
        .ok_or_else(|| CoreError::not_found("foster_assignment", assignment_id))?;

    actor
        .can(Capability::ShelterStaff(assignment.shelter_id))
        .check(deps)
        .await?;

    let ended = deps
        .store
        .end_foster_assignment(assignment_id)
        .await?
        .ok_or_else(|| CoreError::Conflict(format!("foster assignment {} already ended", assignment_id)))?;

    if let Some(pet) = deps.store.find_pet(ended.pet_id).await? {
        if pet.status == PetStatus::Fostered {
            if let Err(e) = apply_pet_transition(deps, &pet, PetStatus::Available, Some(actor.user_id)).await {
                warn!(pet_id = %pet.id, error = %e, "Foster placement ended but pet status unchanged");
            }
        }
    }

    audit::record(
        deps,
        Some(actor.user_id),
        "foster.ended",
        "foster_assignment",
        assignment_id,
        json!({ "pet_id": ended.pet_id }),
    )
    .await;
    Ok(ended)
}
