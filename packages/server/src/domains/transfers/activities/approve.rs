//! Transfer approval as a compensating saga.
//!
//! The store has no multi-record transaction, so each mutation commits on its
//! own and the saga undoes the completed ones if a later step fails. Undo
//! restores the values captured in the snapshot taken before the first write.
//!
//! The decider claims the request before the first move. A concurrent
//! approver loses the claim and never touches the pet, so it cannot undo the
//! winner's moves.

use std::sync::Arc;

use anyhow::anyhow;
use serde_json::json;
use tracing::{info, warn};

use super::{claim_for_decision, notify};
use crate::common::{Actor, Capability, CoreError, CoreResult, PetId, ShelterId, TransferRequestId, UserId};
use crate::domains::audit;
use crate::domains::transfers::models::{TransferRequest, TransferStatus};
use crate::kernel::store::EntityStore;
use crate::kernel::{Saga, ServerDeps};

/// State before the saga touches anything.
#[derive(Debug, Clone, Copy)]
struct Snapshot {
    pet_id: PetId,
    from: ShelterId,
    to: ShelterId,
    from_occupancy: i32,
    to_occupancy: i32,
}

/// Approve a pending transfer and move the pet, its applications and its
/// foster assignments to the destination shelter.
///
/// The decider must be staff of the destination shelter. Any failing step
/// rolls back the completed ones and surfaces as `SagaStepFailure`.
pub async fn approve_transfer(
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

    let pet = deps
        .store
        .find_pet(request.pet_id)
        .await?
        .ok_or_else(|| CoreError::not_found("pet", request.pet_id))?;
    if pet.shelter_id != request.from_shelter_id {
        return Err(CoreError::Conflict(format!(
            "pet {} is no longer at shelter {}",
            pet.id, request.from_shelter_id
        )));
    }

    let source = deps
        .store
        .find_shelter(request.from_shelter_id)
        .await?
        .ok_or_else(|| CoreError::not_found("shelter", request.from_shelter_id))?;
    let target = deps
        .store
        .find_shelter(request.to_shelter_id)
        .await?
        .ok_or_else(|| CoreError::not_found("shelter", request.to_shelter_id))?;
    if !target.is_active {
        return Err(CoreError::Validation(format!("shelter {} is not active", target.id)));
    }

    claim_for_decision(deps, id, actor.user_id).await?;

    let snapshot = Snapshot {
        pet_id: pet.id,
        from: source.id,
        to: target.id,
        from_occupancy: source.current_occupancy,
        to_occupancy: target.current_occupancy,
    };

    let saga = transfer_saga(
        deps.store.clone(),
        snapshot,
        id,
        actor.user_id,
        note.map(str::to_string),
    );

    if let Err(e) = saga.run().await {
        warn!(transfer_id = %id, pet_id = %pet.id, error = %e, "Transfer rolled back");
        if let Err(release) = deps.store.release_transfer_claim(id, actor.user_id).await {
            warn!(transfer_id = %id, error = %release, "Failed to release transfer claim");
        }
        audit::record(
            deps,
            Some(actor.user_id),
            "transfer.rolled_back",
            "transfer_request",
            id,
            json!({ "error": e.to_string() }),
        )
        .await;
        return Err(e);
    }

    let approved = deps
        .store
        .find_transfer_request(id)
        .await?
        .ok_or_else(|| CoreError::not_found("transfer_request", id))?;

    info!(
        transfer_id = %id,
        pet_id = %pet.id,
        from = %snapshot.from,
        to = %snapshot.to,
        "Transfer approved"
    );

    audit::record(
        deps,
        Some(actor.user_id),
        "transfer.approved",
        "transfer_request",
        id,
        json!({ "pet_id": pet.id, "from": snapshot.from, "to": snapshot.to, "note": note }),
    )
    .await;
    notify::transfer_event(deps, "transfer.approved", &approved, source.owner_id);
    notify::decision_email(deps, &approved);

    Ok(approved)
}

fn transfer_saga(
    store: Arc<dyn EntityStore>,
    snap: Snapshot,
    id: TransferRequestId,
    decided_by: UserId,
    note: Option<String>,
) -> Saga {
    let (s1, s1c) = (store.clone(), store.clone());
    let (s2, s2c) = (store.clone(), store.clone());
    let (s3, s3c) = (store.clone(), store.clone());
    let (s4, s4c) = (store.clone(), store.clone());
    let (s5, s5c) = (store.clone(), store.clone());
    let s6 = store;

    Saga::new("pet_transfer")
        .step(
            "set_pet_shelter",
            move || async move {
                s1.set_pet_shelter(snap.pet_id, snap.to)
                    .await?
                    .ok_or_else(|| anyhow!("pet {} not found", snap.pet_id))?;
                Ok(())
            },
            move || async move {
                s1c.set_pet_shelter(snap.pet_id, snap.from).await?;
                Ok(())
            },
        )
        .step(
            "reassign_applications",
            move || async move {
                s2.reassign_applications_for_pet(snap.pet_id, snap.to).await?;
                Ok(())
            },
            move || async move {
                s2c.reassign_applications_for_pet(snap.pet_id, snap.from).await?;
                Ok(())
            },
        )
        .step(
            "reassign_foster_assignments",
            move || async move {
                s3.reassign_foster_assignments_for_pet(snap.pet_id, snap.to).await?;
                Ok(())
            },
            move || async move {
                s3c.reassign_foster_assignments_for_pet(snap.pet_id, snap.from).await?;
                Ok(())
            },
        )
        .step(
            "decrement_source_occupancy",
            move || async move {
                s4.adjust_shelter_occupancy(snap.from, -1).await?;
                Ok(())
            },
            move || async move {
                s4c.set_shelter_occupancy(snap.from, snap.from_occupancy).await?;
                Ok(())
            },
        )
        .step(
            "increment_target_occupancy",
            move || async move {
                s5.adjust_shelter_occupancy(snap.to, 1).await?;
                Ok(())
            },
            move || async move {
                s5c.set_shelter_occupancy(snap.to, snap.to_occupancy).await?;
                Ok(())
            },
        )
        .final_step("mark_approved", move || async move {
            s6.decide_transfer_request(id, TransferStatus::Approved, decided_by, note.as_deref())
                .await?
                .ok_or_else(|| anyhow!("transfer {} is no longer pending under this claim", id))?;
            Ok(())
        })
}
