use serde_json::json;
use tracing::{info, warn};

use crate::common::{Actor, Capability, CoreError, CoreResult, PetId, ShelterId};
use crate::domains::audit;
use crate::domains::pets::models::Pet;
use crate::kernel::ServerDeps;

#[derive(Debug, Clone)]
pub struct IntakePetInput {
    pub shelter_id: ShelterId,
    pub name: String,
    pub species: String,
}

/// Register a new animal at a shelter, starting in `intake`.
pub async fn intake_pet(actor: &Actor, input: IntakePetInput, deps: &ServerDeps) -> CoreResult<Pet> {
    actor
        .can(Capability::ShelterStaff(input.shelter_id))
        .check(deps)
        .await?;

    let shelter = deps
        .store
        .find_shelter(input.shelter_id)
        .await?
        .ok_or_else(|| CoreError::not_found("shelter", input.shelter_id))?;
    if !shelter.is_active {
        return Err(CoreError::Validation(format!("shelter {} is not active", shelter.id)));
    }
    if input.name.trim().is_empty() {
        return Err(CoreError::Validation("pet name is required".into()));
    }

    let pet = Pet::intake(shelter.id, input.name.trim(), input.species.trim());
    let pet = deps.store.insert_pet(&pet).await?;

    if let Err(e) = deps.store.adjust_shelter_occupancy(shelter.id, 1).await {
        warn!(shelter_id = %shelter.id, error = %e, "Failed to bump shelter occupancy");
    }

    info!(pet_id = %pet.id, shelter_id = %shelter.id, "Pet intake recorded");
    audit::record(
        deps,
        Some(actor.user_id),
        "pet.intake",
        "pet",
        pet.id,
        json!({ "shelter_id": shelter.id, "species": pet.species }),
    )
    .await;
    Ok(pet)
}

/// Hide a pet. Pets are never deleted.
pub async fn deactivate_pet(actor: &Actor, pet_id: PetId, deps: &ServerDeps) -> CoreResult<Pet> {
    let pet = deps
        .store
        .find_pet(pet_id)
        .await?
        .ok_or_else(|| CoreError::not_found("pet", pet_id))?;

    actor
        .can(Capability::ShelterStaff(pet.shelter_id))
        .check(deps)
        .await?;

    if !pet.is_active {
        return Ok(pet);
    }

    let updated = deps
        .store
        .deactivate_pet(pet_id)
        .await?
        .ok_or_else(|| CoreError::not_found("pet", pet_id))?;

    if let Err(e) = deps.store.adjust_shelter_occupancy(pet.shelter_id, -1).await {
        warn!(shelter_id = %pet.shelter_id, error = %e, "Failed to lower shelter occupancy");
    }

    audit::record(deps, Some(actor.user_id), "pet.deactivated", "pet", pet_id, json!({})).await;
    Ok(updated)
}
