//! Entity store - persistence boundary for every aggregate.
//!
//! Every method is a single-record operation. Conditional writes return the
//! updated record, or `None` when the condition did not hold; callers never
//! read-modify-write. There is no cross-record transaction here: multi-record
//! consistency is the job of the transfer saga.
//!
//! Two implementations:
//! - [`PostgresStore`] delegates to the `models/` SQL
//! - [`MemoryStore`] keeps mutex-guarded tables for tests and local runs

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PostgresStore;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::common::{
    ApplicationId, EmailOutboxId, FosterAssignmentId, FosterId, PetId, ShelterId,
    TransferRequestId, UserId, WebhookId,
};
use crate::domains::applications::models::{Application, ApplicationStatusUpdate};
use crate::domains::audit::models::AuditLog;
use crate::domains::fosters::models::{Foster, FosterAssignment};
use crate::domains::outbox::models::EmailOutbox;
use crate::domains::pets::models::{Pet, PetStatus};
use crate::domains::shelters::models::{Shelter, StaffApplication};
use crate::domains::transfers::models::{TransferRequest, TransferStatus};
use crate::domains::users::models::User;
use crate::domains::vet_approvals::models::{VetApproval, VetApprovalStatus};
use crate::domains::webhooks::models::Webhook;

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn insert_user(&self, user: &User) -> Result<User>;
    async fn find_user(&self, id: UserId) -> Result<Option<User>>;
}

#[async_trait]
pub trait ShelterStore: Send + Sync {
    async fn insert_shelter(&self, shelter: &Shelter) -> Result<Shelter>;
    async fn find_shelter(&self, id: ShelterId) -> Result<Option<Shelter>>;
    /// Atomic `current_occupancy += delta`, floored at zero.
    async fn adjust_shelter_occupancy(&self, id: ShelterId, delta: i32) -> Result<Option<Shelter>>;
    async fn set_shelter_occupancy(&self, id: ShelterId, value: i32) -> Result<Option<Shelter>>;
    async fn insert_staff_application(&self, application: &StaffApplication) -> Result<StaffApplication>;
    async fn has_approved_staff_membership(&self, user_id: UserId, shelter_id: ShelterId) -> Result<bool>;
}

#[async_trait]
pub trait PetStore: Send + Sync {
    async fn insert_pet(&self, pet: &Pet) -> Result<Pet>;
    async fn find_pet(&self, id: PetId) -> Result<Option<Pet>>;
    /// Conditional on the pet still being in `from`.
    async fn update_pet_status_if(
        &self,
        id: PetId,
        from: PetStatus,
        to: PetStatus,
        adoption_date: Option<DateTime<Utc>>,
    ) -> Result<Option<Pet>>;
    /// `adopted -> to`, clearing the adoption date.
    async fn revert_pet_adoption(&self, id: PetId, to: PetStatus) -> Result<Option<Pet>>;
    async fn set_pet_shelter(&self, id: PetId, shelter_id: ShelterId) -> Result<Option<Pet>>;
    async fn deactivate_pet(&self, id: PetId) -> Result<Option<Pet>>;
}

#[async_trait]
pub trait ApplicationStore: Send + Sync {
    async fn insert_application(&self, application: &Application) -> Result<Application>;
    async fn find_application(&self, id: ApplicationId) -> Result<Option<Application>>;
    async fn find_open_application(&self, pet_id: PetId, adopter_id: UserId) -> Result<Option<Application>>;
    async fn list_applications_for_pet(&self, pet_id: PetId) -> Result<Vec<Application>>;
    /// Compare-and-swap on `(id, version)`; bumps the version.
    async fn update_application_if_version(
        &self,
        id: ApplicationId,
        expected_version: i32,
        update: &ApplicationStatusUpdate,
    ) -> Result<Option<Application>>;
    async fn reassign_applications_for_pet(&self, pet_id: PetId, shelter_id: ShelterId) -> Result<u64>;
}

#[async_trait]
pub trait FosterStore: Send + Sync {
    async fn insert_foster(&self, foster: &Foster) -> Result<Foster>;
    async fn find_foster(&self, id: FosterId) -> Result<Option<Foster>>;
    async fn insert_foster_assignment(&self, assignment: &FosterAssignment) -> Result<FosterAssignment>;
    async fn find_foster_assignment(&self, id: FosterAssignmentId) -> Result<Option<FosterAssignment>>;
    async fn list_foster_assignments_for_pet(&self, pet_id: PetId) -> Result<Vec<FosterAssignment>>;
    async fn end_foster_assignment(&self, id: FosterAssignmentId) -> Result<Option<FosterAssignment>>;
    async fn reassign_foster_assignments_for_pet(&self, pet_id: PetId, shelter_id: ShelterId) -> Result<u64>;
}

#[async_trait]
pub trait TransferStore: Send + Sync {
    async fn insert_transfer_request(&self, request: &TransferRequest) -> Result<TransferRequest>;
    async fn find_transfer_request(&self, id: TransferRequestId) -> Result<Option<TransferRequest>>;
    async fn find_pending_transfer_for_pet(&self, pet_id: PetId) -> Result<Option<TransferRequest>>;
    /// Marks a `pending` request as being decided by `by`. Succeeds only if
    /// nobody holds the claim or the holder claimed before `stale_before`.
    async fn claim_transfer_request(
        &self,
        id: TransferRequestId,
        by: UserId,
        stale_before: DateTime<Utc>,
    ) -> Result<Option<TransferRequest>>;
    /// Drops `by`'s claim on a request that is still `pending`.
    async fn release_transfer_claim(&self, id: TransferRequestId, by: UserId) -> Result<Option<TransferRequest>>;
    /// Conditional on the request still being `pending` and claimed by
    /// `decided_by`.
    async fn decide_transfer_request(
        &self,
        id: TransferRequestId,
        status: TransferStatus,
        decided_by: UserId,
        note: Option<&str>,
    ) -> Result<Option<TransferRequest>>;
}

#[async_trait]
pub trait VetApprovalStore: Send + Sync {
    async fn insert_vet_approval(&self, approval: &VetApproval) -> Result<VetApproval>;
    async fn find_vet_approval_by_token(&self, token: &str) -> Result<Option<VetApproval>>;
    async fn find_pending_vet_approval_for_pet(&self, pet_id: PetId) -> Result<Option<VetApproval>>;
    async fn has_approved_vet_approval(&self, pet_id: PetId) -> Result<bool>;
    /// Claims the `pending` row for `token`.
    async fn decide_vet_approval(
        &self,
        token: &str,
        status: VetApprovalStatus,
        note: Option<&str>,
    ) -> Result<Option<VetApproval>>;
}

#[async_trait]
pub trait OutboxStore: Send + Sync {
    /// Set-on-insert keyed by `dedup_key`: an existing row is returned as-is.
    async fn upsert_email_outbox(&self, row: &EmailOutbox) -> Result<EmailOutbox>;
    async fn find_email_outbox(&self, id: EmailOutboxId) -> Result<Option<EmailOutbox>>;
    async fn find_email_outbox_by_dedup_key(&self, dedup_key: &str) -> Result<Option<EmailOutbox>>;
    /// `pending|failed -> sending`
    async fn claim_email_outbox(&self, id: EmailOutboxId) -> Result<Option<EmailOutbox>>;
    /// `sending -> sent`
    async fn mark_email_sent(&self, id: EmailOutboxId) -> Result<Option<EmailOutbox>>;
    /// any non-sent -> `failed`
    async fn mark_email_failed(&self, id: EmailOutboxId, error: &str) -> Result<Option<EmailOutbox>>;
    async fn list_failed_email_outbox(&self, limit: i64) -> Result<Vec<EmailOutbox>>;
    async fn release_stale_sending(&self, older_than: DateTime<Utc>) -> Result<u64>;
}

#[async_trait]
pub trait WebhookStore: Send + Sync {
    async fn insert_webhook(&self, webhook: &Webhook) -> Result<Webhook>;
    async fn find_webhook(&self, id: WebhookId) -> Result<Option<Webhook>>;
    async fn list_webhooks_for_owner(&self, user_id: UserId) -> Result<Vec<Webhook>>;
    async fn list_active_webhooks_for_event(&self, event: &str, owner: Option<UserId>) -> Result<Vec<Webhook>>;
    async fn record_webhook_success(&self, id: WebhookId) -> Result<Option<Webhook>>;
    /// Increment and, at `threshold`, deactivate in the same write.
    async fn record_webhook_failure(&self, id: WebhookId, threshold: i32) -> Result<Option<Webhook>>;
    async fn set_webhook_active(&self, id: WebhookId, active: bool) -> Result<Option<Webhook>>;
    async fn set_webhook_secret(&self, id: WebhookId, secret: &str) -> Result<Option<Webhook>>;
}

#[async_trait]
pub trait AuditStore: Send + Sync {
    async fn insert_audit_log(&self, entry: &AuditLog) -> Result<AuditLog>;
    async fn list_audit_logs_for_entity(&self, entity_type: &str, entity_id: Uuid) -> Result<Vec<AuditLog>>;
}

/// The full store surface handed around in `ServerDeps`.
pub trait EntityStore:
    UserStore
    + ShelterStore
    + PetStore
    + ApplicationStore
    + FosterStore
    + TransferStore
    + VetApprovalStore
    + OutboxStore
    + WebhookStore
    + AuditStore
{
}

impl<T> EntityStore for T where
    T: UserStore
        + ShelterStore
        + PetStore
        + ApplicationStore
        + FosterStore
        + TransferStore
        + VetApprovalStore
        + OutboxStore
        + WebhookStore
        + AuditStore
{
}
