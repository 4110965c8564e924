use serde_json::json;
use tracing::{info, warn};

use super::{claim_for_decision, notify};
use crate::common::{Actor, Capability, CoreError, CoreResult, TransferRequestId};
use crate::domains::audit;
use crate::domains::transfers::models::{TransferRequest, TransferStatus};
use crate::domains::shelters;
use crate::kernel::ServerDeps;

/// Decline a pending transfer. Claimed like an approval, then decided in one
/// conditional write; nothing moves, so there is nothing to undo.
pub async fn reject_transfer(
    actor: &Actor,
    id: TransferRequestId,
    note: Option<&str>,
    deps: &ServerDeps,
) -> CoreResult<TransferRequest> {
    let request = deps
        .store
        .find_transfer_request(id)
        .await?
        .ok_or_else(|| CoreError::not_found("transfer_request", id))?;

    actor
        .can(Capability::ShelterStaff(request.to_shelter_id))
        .check(deps)
        .await?;

    if request.status != TransferStatus::Pending {
        return Err(CoreError::Conflict(format!("already {}", request.status)));
    }

    claim_for_decision(deps, id, actor.user_id).await?;

    let decided = deps
        .store
        .decide_transfer_request(id, TransferStatus::Rejected, actor.user_id, note)
        .await;
    let rejected = match decided {
        Ok(Some(rejected)) => rejected,
        Ok(None) => {
            return Err(CoreError::Conflict(format!(
                "transfer {} is already being decided",
                id
            )))
        }
        Err(e) => {
            if let Err(release) = deps.store.release_transfer_claim(id, actor.user_id).await {
                warn!(transfer_id = %id, error = %release, "Failed to release transfer claim");
            }
            return Err(e.into());
        }
    };

    info!(transfer_id = %id, "Transfer rejected");

    audit::record(
        deps,
        Some(actor.user_id),
        "transfer.rejected",
        "transfer_request",
        id,
        json!({ "pet_id": rejected.pet_id, "note": note }),
    )
    .await;

    if let Some(owner) = shelters::activities::owner_of(deps, rejected.from_shelter_id).await {
        notify::transfer_event(deps, "transfer.rejected", &rejected, owner);
    }
    notify::decision_email(deps, &rejected);

    Ok(rejected)
}
