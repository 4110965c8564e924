//! Reviewer status updates, version guarded.

use serde_json::json;
use tracing::{info, warn};

use super::{guard::apply_if_version, notify};
use crate::common::{Actor, ApplicationId, Capability, CoreError, CoreResult};
use crate::domains::applications::models::{Application, ApplicationStatus, ApplicationStatusUpdate};
use crate::domains::audit;
use crate::domains::pets::activities::{announce_pet_transition, write_pet_transition};
use crate::domains::pets::models::PetStatus;
use crate::kernel::ServerDeps;

#[derive(Debug, Clone)]
pub struct ReviewInput {
    pub status: ApplicationStatus,
    /// Version the reviewer last saw; required
    pub expected_version: Option<i32>,
    pub notes: Option<String>,
}

/// Move an application to a new status on behalf of shelter staff.
///
/// Decided applications (`approved`, `rejected`) cannot change. Approving
/// also moves the pet to `adopted`. The pet is written first, so of two
/// approvals for the same pet only one gets past that write; if the version
/// guard then refuses the application, the pet is put back.
pub async fn update_application_status(
    actor: &Actor,
    id: ApplicationId,
    input: ReviewInput,
    deps: &ServerDeps,
) -> CoreResult<Application> {
    if input.expected_version.is_none() {
        return Err(CoreError::MissingVersion);
    }

    let application = deps
        .store
        .find_application(id)
        .await?
        .ok_or_else(|| CoreError::not_found("application", id))?;

    actor
        .can(Capability::ShelterStaff(application.shelter_id))
        .check(deps)
        .await?;

    if application.status.is_terminal() {
        return Err(CoreError::invalid_transition(
            "application",
            application.status,
            input.status,
        ));
    }

    let adopted = if input.status == ApplicationStatus::Approved {
        let pet = deps
            .store
            .find_pet(application.pet_id)
            .await?
            .ok_or_else(|| CoreError::not_found("pet", application.pet_id))?;
        let written = write_pet_transition(deps, &pet, PetStatus::Adopted).await?;
        Some((pet.status, written))
    } else {
        None
    };

    let update = ApplicationStatusUpdate {
        status: input.status,
        reviewed_by: Some(actor.user_id),
        notes: input.notes,
    };
    let updated = match apply_if_version(deps.store.as_ref(), id, input.expected_version, &update).await {
        Ok(updated) => updated,
        Err(e) => {
            if let Some((from, pet)) = &adopted {
                match deps.store.revert_pet_adoption(pet.id, *from).await {
                    Ok(Some(_)) => {}
                    Ok(None) => warn!(pet_id = %pet.id, "Pet left adopted before it could be put back"),
                    Err(revert) => warn!(
                        pet_id = %pet.id,
                        error = %revert,
                        "Failed to put pet back after refused approval"
                    ),
                }
            }
            return Err(e);
        }
    };

    info!(
        application_id = %id,
        from = %application.status,
        to = %updated.status,
        version = updated.version,
        "Application status updated"
    );

    if let Some((from, pet)) = adopted {
        announce_pet_transition(deps, from, &pet, Some(actor.user_id)).await;
    }

    audit::record(
        deps,
        Some(actor.user_id),
        "application.status_changed",
        "application",
        id,
        json!({
            "from": application.status,
            "to": updated.status,
            "version": updated.version,
        }),
    )
    .await;
    notify::status_changed(deps, &updated).await;

    Ok(updated)
}
