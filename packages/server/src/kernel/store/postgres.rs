use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::{
    ApplicationStore, AuditStore, FosterStore, OutboxStore, PetStore, ShelterStore, TransferStore,
    UserStore, VetApprovalStore, WebhookStore,
};
use crate::common::{
    ApplicationId, EmailOutboxId, FosterAssignmentId, FosterId, PetId, ShelterId,
    TransferRequestId, UniqueViolation, UserId, WebhookId,
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

/// PostgreSQL-backed entity store. All SQL lives on the models.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Turn a partial-unique-index rejection into a [`UniqueViolation`] naming
/// `rule`; other errors pass through.
fn unique_violation(err: anyhow::Error, rule: &str) -> anyhow::Error {
    match err.downcast_ref::<sqlx::Error>() {
        Some(sqlx::Error::Database(db)) if db.is_unique_violation() => UniqueViolation {
            rule: rule.to_string(),
            constraint: db.constraint().map(str::to_string),
        }
        .into(),
        _ => err,
    }
}

#[async_trait]
impl UserStore for PostgresStore {
    async fn insert_user(&self, user: &User) -> Result<User> {
        user.insert(&self.pool).await
    }

    async fn find_user(&self, id: UserId) -> Result<Option<User>> {
        User::find_by_id(id, &self.pool).await
    }
}

#[async_trait]
impl ShelterStore for PostgresStore {
    async fn insert_shelter(&self, shelter: &Shelter) -> Result<Shelter> {
        shelter.insert(&self.pool).await
    }

    async fn find_shelter(&self, id: ShelterId) -> Result<Option<Shelter>> {
        Shelter::find_by_id(id, &self.pool).await
    }

    async fn adjust_shelter_occupancy(&self, id: ShelterId, delta: i32) -> Result<Option<Shelter>> {
        Shelter::adjust_occupancy(id, delta, &self.pool).await
    }

    async fn set_shelter_occupancy(&self, id: ShelterId, value: i32) -> Result<Option<Shelter>> {
        Shelter::set_occupancy(id, value, &self.pool).await
    }

    async fn insert_staff_application(&self, application: &StaffApplication) -> Result<StaffApplication> {
        application.insert(&self.pool).await
    }

    async fn has_approved_staff_membership(&self, user_id: UserId, shelter_id: ShelterId) -> Result<bool> {
        StaffApplication::is_approved_member(user_id, shelter_id, &self.pool).await
    }
}

#[async_trait]
impl PetStore for PostgresStore {
    async fn insert_pet(&self, pet: &Pet) -> Result<Pet> {
        pet.insert(&self.pool).await
    }

    async fn find_pet(&self, id: PetId) -> Result<Option<Pet>> {
        Pet::find_by_id(id, &self.pool).await
    }

    async fn update_pet_status_if(
        &self,
        id: PetId,
        from: PetStatus,
        to: PetStatus,
        adoption_date: Option<DateTime<Utc>>,
    ) -> Result<Option<Pet>> {
        Pet::update_status_if(id, from, to, adoption_date, &self.pool).await
    }

    async fn revert_pet_adoption(&self, id: PetId, to: PetStatus) -> Result<Option<Pet>> {
        Pet::revert_adoption(id, to, &self.pool).await
    }

    async fn set_pet_shelter(&self, id: PetId, shelter_id: ShelterId) -> Result<Option<Pet>> {
        Pet::set_shelter(id, shelter_id, &self.pool).await
    }

    async fn deactivate_pet(&self, id: PetId) -> Result<Option<Pet>> {
        Pet::deactivate(id, &self.pool).await
    }
}

#[async_trait]
impl ApplicationStore for PostgresStore {
    async fn insert_application(&self, application: &Application) -> Result<Application> {
        application
            .insert(&self.pool)
            .await
            .map_err(|e| unique_violation(e, "an open application already exists for this pet"))
    }

    async fn find_application(&self, id: ApplicationId) -> Result<Option<Application>> {
        Application::find_by_id(id, &self.pool).await
    }

    async fn find_open_application(&self, pet_id: PetId, adopter_id: UserId) -> Result<Option<Application>> {
        Application::find_open(pet_id, adopter_id, &self.pool).await
    }

    async fn list_applications_for_pet(&self, pet_id: PetId) -> Result<Vec<Application>> {
        Application::find_by_pet(pet_id, &self.pool).await
    }

    async fn update_application_if_version(
        &self,
        id: ApplicationId,
        expected_version: i32,
        update: &ApplicationStatusUpdate,
    ) -> Result<Option<Application>> {
        Application::update_if_version(id, expected_version, update, &self.pool).await
    }

    async fn reassign_applications_for_pet(&self, pet_id: PetId, shelter_id: ShelterId) -> Result<u64> {
        Application::reassign_shelter_for_pet(pet_id, shelter_id, &self.pool).await
    }
}

#[async_trait]
impl FosterStore for PostgresStore {
    async fn insert_foster(&self, foster: &Foster) -> Result<Foster> {
        foster.insert(&self.pool).await
    }

    async fn find_foster(&self, id: FosterId) -> Result<Option<Foster>> {
        Foster::find_by_id(id, &self.pool).await
    }

    async fn insert_foster_assignment(&self, assignment: &FosterAssignment) -> Result<FosterAssignment> {
        assignment.insert(&self.pool).await
    }

    async fn find_foster_assignment(&self, id: FosterAssignmentId) -> Result<Option<FosterAssignment>> {
        FosterAssignment::find_by_id(id, &self.pool).await
    }

    async fn list_foster_assignments_for_pet(&self, pet_id: PetId) -> Result<Vec<FosterAssignment>> {
        FosterAssignment::find_by_pet(pet_id, &self.pool).await
    }

    async fn end_foster_assignment(&self, id: FosterAssignmentId) -> Result<Option<FosterAssignment>> {
        FosterAssignment::end(id, &self.pool).await
    }

    async fn reassign_foster_assignments_for_pet(&self, pet_id: PetId, shelter_id: ShelterId) -> Result<u64> {
        FosterAssignment::reassign_shelter_for_pet(pet_id, shelter_id, &self.pool).await
    }
}

#[async_trait]
impl TransferStore for PostgresStore {
    async fn insert_transfer_request(&self, request: &TransferRequest) -> Result<TransferRequest> {
        request
            .insert(&self.pool)
            .await
            .map_err(|e| unique_violation(e, "a transfer is already pending for this pet"))
    }

    async fn find_transfer_request(&self, id: TransferRequestId) -> Result<Option<TransferRequest>> {
        TransferRequest::find_by_id(id, &self.pool).await
    }

    async fn find_pending_transfer_for_pet(&self, pet_id: PetId) -> Result<Option<TransferRequest>> {
        TransferRequest::find_pending_for_pet(pet_id, &self.pool).await
    }

    async fn claim_transfer_request(
        &self,
        id: TransferRequestId,
        by: UserId,
        stale_before: DateTime<Utc>,
    ) -> Result<Option<TransferRequest>> {
        TransferRequest::claim(id, by, stale_before, &self.pool).await
    }

    async fn release_transfer_claim(&self, id: TransferRequestId, by: UserId) -> Result<Option<TransferRequest>> {
        TransferRequest::release_claim(id, by, &self.pool).await
    }

    async fn decide_transfer_request(
        &self,
        id: TransferRequestId,
        status: TransferStatus,
        decided_by: UserId,
        note: Option<&str>,
    ) -> Result<Option<TransferRequest>> {
        TransferRequest::decide(id, status, decided_by, note, &self.pool).await
    }
}

#[async_trait]
impl VetApprovalStore for PostgresStore {
    async fn insert_vet_approval(&self, approval: &VetApproval) -> Result<VetApproval> {
        approval
            .insert(&self.pool)
            .await
            .map_err(|e| unique_violation(e, "a vet approval is already pending for this pet"))
    }

    async fn find_vet_approval_by_token(&self, token: &str) -> Result<Option<VetApproval>> {
        VetApproval::find_by_token(token, &self.pool).await
    }

    async fn find_pending_vet_approval_for_pet(&self, pet_id: PetId) -> Result<Option<VetApproval>> {
        VetApproval::find_pending_for_pet(pet_id, &self.pool).await
    }

    async fn has_approved_vet_approval(&self, pet_id: PetId) -> Result<bool> {
        VetApproval::has_approved(pet_id, &self.pool).await
    }

    async fn decide_vet_approval(
        &self,
        token: &str,
        status: VetApprovalStatus,
        note: Option<&str>,
    ) -> Result<Option<VetApproval>> {
        VetApproval::decide(token, status, note, &self.pool).await
    }
}

#[async_trait]
impl OutboxStore for PostgresStore {
    async fn upsert_email_outbox(&self, row: &EmailOutbox) -> Result<EmailOutbox> {
        row.upsert(&self.pool).await
    }

    async fn find_email_outbox(&self, id: EmailOutboxId) -> Result<Option<EmailOutbox>> {
        EmailOutbox::find_by_id(id, &self.pool).await
    }

    async fn find_email_outbox_by_dedup_key(&self, dedup_key: &str) -> Result<Option<EmailOutbox>> {
        EmailOutbox::find_by_dedup_key(dedup_key, &self.pool).await
    }

    async fn claim_email_outbox(&self, id: EmailOutboxId) -> Result<Option<EmailOutbox>> {
        EmailOutbox::claim(id, &self.pool).await
    }

    async fn mark_email_sent(&self, id: EmailOutboxId) -> Result<Option<EmailOutbox>> {
        EmailOutbox::mark_sent(id, &self.pool).await
    }

    async fn mark_email_failed(&self, id: EmailOutboxId, error: &str) -> Result<Option<EmailOutbox>> {
        EmailOutbox::mark_failed(id, error, &self.pool).await
    }

    async fn list_failed_email_outbox(&self, limit: i64) -> Result<Vec<EmailOutbox>> {
        EmailOutbox::find_failed(limit, &self.pool).await
    }

    async fn release_stale_sending(&self, older_than: DateTime<Utc>) -> Result<u64> {
        EmailOutbox::release_stale_sending(older_than, &self.pool).await
    }
}

#[async_trait]
impl WebhookStore for PostgresStore {
    async fn insert_webhook(&self, webhook: &Webhook) -> Result<Webhook> {
        webhook.insert(&self.pool).await
    }

    async fn find_webhook(&self, id: WebhookId) -> Result<Option<Webhook>> {
        Webhook::find_by_id(id, &self.pool).await
    }

    async fn list_webhooks_for_owner(&self, user_id: UserId) -> Result<Vec<Webhook>> {
        Webhook::find_by_owner(user_id, &self.pool).await
    }

    async fn list_active_webhooks_for_event(&self, event: &str, owner: Option<UserId>) -> Result<Vec<Webhook>> {
        Webhook::find_active_for_event(event, owner, &self.pool).await
    }

    async fn record_webhook_success(&self, id: WebhookId) -> Result<Option<Webhook>> {
        Webhook::record_success(id, &self.pool).await
    }

    async fn record_webhook_failure(&self, id: WebhookId, threshold: i32) -> Result<Option<Webhook>> {
        Webhook::record_failure(id, threshold, &self.pool).await
    }

    async fn set_webhook_active(&self, id: WebhookId, active: bool) -> Result<Option<Webhook>> {
        Webhook::set_active(id, active, &self.pool).await
    }

    async fn set_webhook_secret(&self, id: WebhookId, secret: &str) -> Result<Option<Webhook>> {
        Webhook::set_secret(id, secret, &self.pool).await
    }
}

#[async_trait]
impl AuditStore for PostgresStore {
    async fn insert_audit_log(&self, entry: &AuditLog) -> Result<AuditLog> {
        entry.insert(&self.pool).await
    }

    async fn list_audit_logs_for_entity(&self, entity_type: &str, entity_id: Uuid) -> Result<Vec<AuditLog>> {
        AuditLog::find_for_entity(entity_type, entity_id, &self.pool).await
    }
}
