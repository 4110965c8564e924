//! Transfer actions - request, saga-backed approval, rejection

mod approve;
mod notify;
mod reject;
mod request;

pub use approve::approve_transfer;
pub use reject::reject_transfer;
pub use request::{request_transfer, RequestTransferInput};

use chrono::{Duration, Utc};

use crate::common::{CoreError, CoreResult, TransferRequestId, UserId};
use crate::domains::transfers::models::{TransferRequest, TransferStatus};
use crate::kernel::ServerDeps;

/// A claim older than this is treated as abandoned by a crashed decider.
const CLAIM_LEASE_MINUTES: i64 = 5;

/// Take the decision claim on a pending request, or explain who has it.
async fn claim_for_decision(
    deps: &ServerDeps,
    id: TransferRequestId,
    by: UserId,
) -> CoreResult<TransferRequest> {
    let stale_before = Utc::now() - Duration::minutes(CLAIM_LEASE_MINUTES);
    if let Some(claimed) = deps.store.claim_transfer_request(id, by, stale_before).await? {
        return Ok(claimed);
    }

    let current = deps
        .store
        .find_transfer_request(id)
        .await?
        .ok_or_else(|| CoreError::not_found("transfer_request", id))?;
    Err(CoreError::Conflict(match current.status {
        TransferStatus::Pending => format!("transfer {} is already being decided", id),
        decided => format!("already {}", decided),
    }))
}
