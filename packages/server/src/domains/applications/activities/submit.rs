use serde_json::json;
use tracing::info;

use super::notify;
use crate::common::{Actor, ApplicationId, AuthError, Capability, CoreError, CoreResult, PetId};
use crate::common::auth::resolve_effective_shelter_access;
use crate::domains::applications::models::Application;
use crate::domains::audit;
use crate::kernel::ServerDeps;

#[derive(Debug, Clone)]
pub struct SubmitApplicationInput {
    pub pet_id: PetId,
    /// Free-text note to the shelter; stored encrypted
    pub message: Option<String>,
}

/// Submit an adoption application for a pet.
///
/// One open application per (pet, adopter); a rejected one does not count.
pub async fn submit_application(
    actor: &Actor,
    input: SubmitApplicationInput,
    deps: &ServerDeps,
) -> CoreResult<Application> {
    let pet = deps
        .store
        .find_pet(input.pet_id)
        .await?
        .ok_or_else(|| CoreError::not_found("pet", input.pet_id))?;

    if !pet.is_active || !pet.status.accepts_applications() {
        return Err(CoreError::Validation(format!(
            "pet {} is not accepting applications ({})",
            pet.id, pet.status
        )));
    }

    if let Some(existing) = deps
        .store
        .find_open_application(pet.id, actor.user_id)
        .await?
    {
        return Err(CoreError::Conflict(format!(
            "open application {} already exists for this pet",
            existing.id
        )));
    }

    let message = deps
        .cipher
        .encrypt_opt(input.message.as_deref().map(str::trim).filter(|m| !m.is_empty()))
        .map_err(|e| CoreError::Store(e.into()))?;

    let application = Application::submitted(pet.id, actor.user_id, pet.shelter_id, message);
    let application = deps.store.insert_application(&application).await?;

    info!(
        application_id = %application.id,
        pet_id = %pet.id,
        adopter_id = %actor.user_id,
        "Application submitted"
    );

    audit::record(
        deps,
        Some(actor.user_id),
        "application.submitted",
        "application",
        application.id,
        json!({ "pet_id": pet.id }),
    )
    .await;
    notify::application_event(deps, "application.submitted", &application).await;

    Ok(application)
}

/// Decrypted adopter message, for the adopter and the shelter's staff.
pub async fn read_application_message(
    actor: &Actor,
    id: ApplicationId,
    deps: &ServerDeps,
) -> CoreResult<Option<String>> {
    let application = deps
        .store
        .find_application(id)
        .await?
        .ok_or_else(|| CoreError::not_found("application", id))?;

    let is_adopter = actor.user_id == application.adopter_id;
    if !is_adopter
        && !resolve_effective_shelter_access(actor, application.shelter_id, deps.store.as_ref()).await?
    {
        return Err(AuthError::PermissionDenied(
            Capability::ShelterStaff(application.shelter_id).rule(),
        )
        .into());
    }

    deps.cipher
        .decrypt_opt(application.message.as_deref())
        .map_err(|e| CoreError::Store(e.into()))
}
