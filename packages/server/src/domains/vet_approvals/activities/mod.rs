//! Vet approval actions - request a medical release, record the decision

use serde_json::json;
use tracing::info;

use crate::common::{Actor, Capability, CoreError, CoreResult, PetId};
use crate::domains::audit;
use crate::domains::outbox::{spawn_email, EmailRequest, EmailTemplate};
use crate::domains::pets::models::PetStatus;
use crate::domains::vet_approvals::models::{VetApproval, VetApprovalStatus};
use crate::kernel::ServerDeps;

/// Ask a vet to sign off on releasing a pet from medical hold.
///
/// The vet gets an email with a one-time decision link.
pub async fn request_vet_approval(
    actor: &Actor,
    pet_id: PetId,
    vet_email: &str,
    deps: &ServerDeps,
) -> CoreResult<VetApproval> {
    let pet = deps
        .store
        .find_pet(pet_id)
        .await?
        .ok_or_else(|| CoreError::not_found("pet", pet_id))?;

    actor
        .can(Capability::ShelterStaff(pet.shelter_id))
        .check(deps)
        .await?;

    let vet_email = vet_email.trim();
    if !vet_email.contains('@') {
        return Err(CoreError::Validation(format!("invalid vet email: {}", vet_email)));
    }
    if pet.status != PetStatus::MedicalHold {
        return Err(CoreError::Validation(format!(
            "pet {} is {}, not medical_hold",
            pet.id, pet.status
        )));
    }
    if deps.store.find_pending_vet_approval_for_pet(pet.id).await?.is_some() {
        return Err(CoreError::Conflict(format!(
            "pet {} already has a pending vet approval",
            pet.id
        )));
    }

    let approval = deps
        .store
        .insert_vet_approval(&VetApproval::pending(pet.id, vet_email, actor.user_id))
        .await?;

    info!(approval_id = %approval.id, pet_id = %pet.id, "Vet approval requested");

    let shelter_name = deps
        .store
        .find_shelter(pet.shelter_id)
        .await?
        .map(|s| s.name)
        .unwrap_or_default();
    let decision_url = format!(
        "{}/vet-approvals/{}",
        deps.settings.public_base_url.trim_end_matches('/'),
        approval.token
    );
    spawn_email(
        deps,
        EmailRequest {
            dedup_key: format!("vet-approval:{}:request", approval.id),
            to: approval.vet_email.clone(),
            template: EmailTemplate::VetApprovalRequest,
            payload: json!({
                "pet_name": pet.name,
                "shelter_name": shelter_name,
                "decision_url": decision_url,
            }),
        },
    );

    audit::record(
        deps,
        Some(actor.user_id),
        "vet_approval.requested",
        "pet",
        pet.id,
        json!({ "approval_id": approval.id, "vet_email": approval.vet_email }),
    )
    .await;
    Ok(approval)
}

/// Record the vet's decision. Each token decides exactly once.
pub async fn decide_vet_approval(
    token: &str,
    approve: bool,
    note: Option<&str>,
    deps: &ServerDeps,
) -> CoreResult<VetApproval> {
    let status = if approve {
        VetApprovalStatus::Approved
    } else {
        VetApprovalStatus::Rejected
    };

    let Some(decided) = deps.store.decide_vet_approval(token, status, note).await? else {
        return match deps.store.find_vet_approval_by_token(token).await? {
            Some(existing) => Err(CoreError::Conflict(format!("already {}", existing.status))),
            None => Err(CoreError::not_found("vet_approval", "token")),
        };
    };

    info!(approval_id = %decided.id, pet_id = %decided.pet_id, status = %status, "Vet approval decided");
    audit::record(
        deps,
        None,
        "vet_approval.decided",
        "pet",
        decided.pet_id,
        json!({ "approval_id": decided.id, "status": status, "note": note }),
    )
    .await;
    Ok(decided)
}
