//! Shelter actions - tenant setup and staff membership

use serde_json::json;
use tracing::{info, warn};

use crate::common::{Actor, Capability, CoreError, CoreResult, ShelterId, UserId};
use crate::domains::audit;
use crate::domains::shelters::models::{Shelter, StaffApplication};
use crate::kernel::ServerDeps;

/// Create a shelter owned by the actor. The owner becomes approved staff.
pub async fn create_shelter(
    actor: &Actor,
    name: &str,
    capacity: i32,
    deps: &ServerDeps,
) -> CoreResult<Shelter> {
    if name.trim().is_empty() {
        return Err(CoreError::Validation("shelter name is required".into()));
    }
    if capacity < 0 {
        return Err(CoreError::Validation("capacity cannot be negative".into()));
    }

    let shelter = deps
        .store
        .insert_shelter(&Shelter::new(name.trim(), actor.user_id, capacity))
        .await?;
    deps.store
        .insert_staff_application(&StaffApplication::approved(actor.user_id, shelter.id))
        .await?;

    info!(shelter_id = %shelter.id, owner_id = %actor.user_id, "Shelter created");
    audit::record(deps, Some(actor.user_id), "shelter.created", "shelter", shelter.id, json!({ "name": shelter.name })).await;
    Ok(shelter)
}

/// Grant `user_id` staff access to a shelter. Existing staff may add staff.
pub async fn add_staff_member(
    actor: &Actor,
    shelter_id: ShelterId,
    user_id: UserId,
    deps: &ServerDeps,
) -> CoreResult<StaffApplication> {
    actor.can(Capability::ShelterStaff(shelter_id)).check(deps).await?;

    let membership = deps
        .store
        .insert_staff_application(&StaffApplication::approved(user_id, shelter_id))
        .await?;

    audit::record(
        deps,
        Some(actor.user_id),
        "shelter.staff_added",
        "shelter",
        shelter_id,
        json!({ "user_id": user_id }),
    )
    .await;
    Ok(membership)
}

/// Owner of the shelter, used to scope webhook fan-out.
pub async fn owner_of(deps: &ServerDeps, shelter_id: ShelterId) -> Option<UserId> {
    match deps.store.find_shelter(shelter_id).await {
        Ok(shelter) => shelter.map(|s| s.owner_id),
        Err(e) => {
            warn!(shelter_id = %shelter_id, error = %e, "Failed to load shelter owner");
            None
        }
    }
}
