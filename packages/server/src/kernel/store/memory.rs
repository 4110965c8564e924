//! In-memory entity store.
//!
//! Each method takes the table lock once, so every conditional write is as
//! atomic here as the single-statement SQL it mirrors. Uniqueness rules that
//! Postgres enforces with indexes are checked on insert.
//!
//! Fault injection: `inject_failure("op_name")` makes that method return an
//! error, optionally after letting a number of calls through first.
//!
//! `yield_between_calls()` makes every method yield to the scheduler before
//! touching the tables, like a real store awaiting the network. Concurrent
//! tests turn it on so racing callers actually interleave.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
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
use crate::domains::fosters::models::{Foster, FosterAssignment, FosterAssignmentStatus};
use crate::domains::outbox::models::{EmailOutbox, EmailStatus};
use crate::domains::pets::models::{Pet, PetStatus};
use crate::domains::shelters::models::{Shelter, StaffApplication, StaffApplicationStatus};
use crate::domains::transfers::models::{TransferRequest, TransferStatus};
use crate::domains::users::models::User;
use crate::domains::vet_approvals::models::{VetApproval, VetApprovalStatus};
use crate::domains::webhooks::models::Webhook;

#[derive(Default)]
struct Tables {
    users: HashMap<UserId, User>,
    shelters: HashMap<ShelterId, Shelter>,
    staff_applications: Vec<StaffApplication>,
    pets: HashMap<PetId, Pet>,
    applications: HashMap<ApplicationId, Application>,
    fosters: HashMap<FosterId, Foster>,
    foster_assignments: HashMap<FosterAssignmentId, FosterAssignment>,
    transfer_requests: HashMap<TransferRequestId, TransferRequest>,
    vet_approvals: Vec<VetApproval>,
    email_outbox: HashMap<EmailOutboxId, EmailOutbox>,
    webhooks: HashMap<WebhookId, Webhook>,
    audit_logs: Vec<AuditLog>,
}

/// Calls to let through before failing.
#[derive(Debug, Clone, Copy)]
struct Fault {
    pass_first: usize,
}

#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    faults: Mutex<HashMap<String, Fault>>,
    yield_each_call: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every call to `op` fails until cleared.
    pub fn inject_failure(&self, op: &str) {
        self.inject_failure_after(op, 0);
    }

    /// `op` succeeds `pass_first` more times, then fails.
    pub fn inject_failure_after(&self, op: &str, pass_first: usize) {
        self.faults_lock().insert(op.to_string(), Fault { pass_first });
    }

    pub fn clear_failures(&self) {
        self.faults_lock().clear();
    }

    /// Yield before every call so concurrent callers interleave.
    pub fn yield_between_calls(&self) {
        self.yield_each_call.store(true, Ordering::Relaxed);
    }

    fn faults_lock(&self) -> MutexGuard<'_, HashMap<String, Fault>> {
        self.faults.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn tables(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Entry point of every store method.
    async fn enter(&self, op: &str) -> Result<()> {
        if self.yield_each_call.load(Ordering::Relaxed) {
            tokio::task::yield_now().await;
        }
        self.check_fault(op)
    }

    fn check_fault(&self, op: &str) -> Result<()> {
        let mut faults = self.faults_lock();
        if let Some(fault) = faults.get_mut(op) {
            if fault.pass_first == 0 {
                bail!("injected failure: {}", op);
            }
            fault.pass_first -= 1;
        }
        Ok(())
    }

    // Inspection helpers for tests

    pub fn all_email_outbox(&self) -> Vec<EmailOutbox> {
        let mut rows: Vec<_> = self.tables().email_outbox.values().cloned().collect();
        rows.sort_by_key(|r| r.created_at);
        rows
    }

    pub fn all_audit_logs(&self) -> Vec<AuditLog> {
        self.tables().audit_logs.clone()
    }

    /// Force an outbox row into a state, e.g. to simulate a crashed worker.
    pub fn put_email_outbox(&self, row: EmailOutbox) {
        self.tables().email_outbox.insert(row.id, row);
    }

    /// Overwrite an application row, e.g. to start from a given version.
    pub fn put_application(&self, application: Application) {
        self.tables().applications.insert(application.id, application);
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn insert_user(&self, user: &User) -> Result<User> {
        self.enter("insert_user").await?;
        let mut t = self.tables();
        if t.users.values().any(|u| u.email == user.email) {
            bail!("duplicate user email: {}", user.email);
        }
        t.users.insert(user.id, user.clone());
        Ok(user.clone())
    }

    async fn find_user(&self, id: UserId) -> Result<Option<User>> {
        self.enter("find_user").await?;
        Ok(self.tables().users.get(&id).cloned())
    }
}

#[async_trait]
impl ShelterStore for MemoryStore {
    async fn insert_shelter(&self, shelter: &Shelter) -> Result<Shelter> {
        self.enter("insert_shelter").await?;
        self.tables().shelters.insert(shelter.id, shelter.clone());
        Ok(shelter.clone())
    }

    async fn find_shelter(&self, id: ShelterId) -> Result<Option<Shelter>> {
        self.enter("find_shelter").await?;
        Ok(self.tables().shelters.get(&id).cloned())
    }

    async fn adjust_shelter_occupancy(&self, id: ShelterId, delta: i32) -> Result<Option<Shelter>> {
        self.enter("adjust_shelter_occupancy").await?;
        let mut t = self.tables();
        Ok(t.shelters.get_mut(&id).map(|s| {
            s.current_occupancy = (s.current_occupancy + delta).max(0);
            s.updated_at = Utc::now();
            s.clone()
        }))
    }

    async fn set_shelter_occupancy(&self, id: ShelterId, value: i32) -> Result<Option<Shelter>> {
        self.enter("set_shelter_occupancy").await?;
        let mut t = self.tables();
        Ok(t.shelters.get_mut(&id).map(|s| {
            s.current_occupancy = value.max(0);
            s.updated_at = Utc::now();
            s.clone()
        }))
    }

    async fn insert_staff_application(&self, application: &StaffApplication) -> Result<StaffApplication> {
        self.enter("insert_staff_application").await?;
        self.tables().staff_applications.push(application.clone());
        Ok(application.clone())
    }

    async fn has_approved_staff_membership(&self, user_id: UserId, shelter_id: ShelterId) -> Result<bool> {
        self.enter("has_approved_staff_membership").await?;
        Ok(self.tables().staff_applications.iter().any(|a| {
            a.user_id == user_id
                && a.shelter_id == shelter_id
                && a.status == StaffApplicationStatus::Approved
        }))
    }
}

#[async_trait]
impl PetStore for MemoryStore {
    async fn insert_pet(&self, pet: &Pet) -> Result<Pet> {
        self.enter("insert_pet").await?;
        self.tables().pets.insert(pet.id, pet.clone());
        Ok(pet.clone())
    }

    async fn find_pet(&self, id: PetId) -> Result<Option<Pet>> {
        self.enter("find_pet").await?;
        Ok(self.tables().pets.get(&id).cloned())
    }

    async fn update_pet_status_if(
        &self,
        id: PetId,
        from: PetStatus,
        to: PetStatus,
        adoption_date: Option<DateTime<Utc>>,
    ) -> Result<Option<Pet>> {
        self.enter("update_pet_status_if").await?;
        let mut t = self.tables();
        Ok(t.pets.get_mut(&id).filter(|p| p.status == from).map(|p| {
            p.status = to;
            if adoption_date.is_some() {
                p.adoption_date = adoption_date;
            }
            p.updated_at = Utc::now();
            p.clone()
        }))
    }

    async fn revert_pet_adoption(&self, id: PetId, to: PetStatus) -> Result<Option<Pet>> {
        self.enter("revert_pet_adoption").await?;
        let mut t = self.tables();
        Ok(t.pets
            .get_mut(&id)
            .filter(|p| p.status == PetStatus::Adopted)
            .map(|p| {
                p.status = to;
                p.adoption_date = None;
                p.updated_at = Utc::now();
                p.clone()
            }))
    }

    async fn set_pet_shelter(&self, id: PetId, shelter_id: ShelterId) -> Result<Option<Pet>> {
        self.enter("set_pet_shelter").await?;
        let mut t = self.tables();
        Ok(t.pets.get_mut(&id).map(|p| {
            p.shelter_id = shelter_id;
            p.updated_at = Utc::now();
            p.clone()
        }))
    }

    async fn deactivate_pet(&self, id: PetId) -> Result<Option<Pet>> {
        self.enter("deactivate_pet").await?;
        let mut t = self.tables();
        Ok(t.pets.get_mut(&id).map(|p| {
            p.is_active = false;
            p.updated_at = Utc::now();
            p.clone()
        }))
    }
}

#[async_trait]
impl ApplicationStore for MemoryStore {
    async fn insert_application(&self, application: &Application) -> Result<Application> {
        self.enter("insert_application").await?;
        let mut t = self.tables();
        let clash = t.applications.values().any(|a| {
            a.pet_id == application.pet_id
                && a.adopter_id == application.adopter_id
                && a.status.is_open()
        });
        if clash && application.status.is_open() {
            return Err(UniqueViolation::new("an open application already exists for this pet").into());
        }
        t.applications.insert(application.id, application.clone());
        Ok(application.clone())
    }

    async fn find_application(&self, id: ApplicationId) -> Result<Option<Application>> {
        self.enter("find_application").await?;
        Ok(self.tables().applications.get(&id).cloned())
    }

    async fn find_open_application(&self, pet_id: PetId, adopter_id: UserId) -> Result<Option<Application>> {
        self.enter("find_open_application").await?;
        Ok(self
            .tables()
            .applications
            .values()
            .find(|a| a.pet_id == pet_id && a.adopter_id == adopter_id && a.status.is_open())
            .cloned())
    }

    async fn list_applications_for_pet(&self, pet_id: PetId) -> Result<Vec<Application>> {
        self.enter("list_applications_for_pet").await?;
        let mut apps: Vec<_> = self
            .tables()
            .applications
            .values()
            .filter(|a| a.pet_id == pet_id)
            .cloned()
            .collect();
        apps.sort_by_key(|a| a.created_at);
        Ok(apps)
    }

    async fn update_application_if_version(
        &self,
        id: ApplicationId,
        expected_version: i32,
        update: &ApplicationStatusUpdate,
    ) -> Result<Option<Application>> {
        self.enter("update_application_if_version").await?;
        let mut t = self.tables();
        Ok(t
            .applications
            .get_mut(&id)
            .filter(|a| a.version == expected_version)
            .map(|a| {
                let now = Utc::now();
                a.status = update.status;
                if update.reviewed_by.is_some() {
                    a.reviewed_by = update.reviewed_by;
                }
                if update.notes.is_some() {
                    a.notes = update.notes.clone();
                }
                a.reviewed_at = Some(now);
                a.version += 1;
                a.updated_at = now;
                a.clone()
            }))
    }

    async fn reassign_applications_for_pet(&self, pet_id: PetId, shelter_id: ShelterId) -> Result<u64> {
        self.enter("reassign_applications_for_pet").await?;
        let mut t = self.tables();
        let mut changed = 0;
        for app in t.applications.values_mut().filter(|a| a.pet_id == pet_id) {
            app.shelter_id = shelter_id;
            app.updated_at = Utc::now();
            changed += 1;
        }
        Ok(changed)
    }
}

#[async_trait]
impl FosterStore for MemoryStore {
    async fn insert_foster(&self, foster: &Foster) -> Result<Foster> {
        self.enter("insert_foster").await?;
        self.tables().fosters.insert(foster.id, foster.clone());
        Ok(foster.clone())
    }

    async fn find_foster(&self, id: FosterId) -> Result<Option<Foster>> {
        self.enter("find_foster").await?;
        Ok(self.tables().fosters.get(&id).cloned())
    }

    async fn insert_foster_assignment(&self, assignment: &FosterAssignment) -> Result<FosterAssignment> {
        self.enter("insert_foster_assignment").await?;
        self.tables()
            .foster_assignments
            .insert(assignment.id, assignment.clone());
        Ok(assignment.clone())
    }

    async fn find_foster_assignment(&self, id: FosterAssignmentId) -> Result<Option<FosterAssignment>> {
        self.enter("find_foster_assignment").await?;
        Ok(self.tables().foster_assignments.get(&id).cloned())
    }

    async fn list_foster_assignments_for_pet(&self, pet_id: PetId) -> Result<Vec<FosterAssignment>> {
        self.enter("list_foster_assignments_for_pet").await?;
        let mut rows: Vec<_> = self
            .tables()
            .foster_assignments
            .values()
            .filter(|a| a.pet_id == pet_id)
            .cloned()
            .collect();
        rows.sort_by_key(|a| a.started_at);
        Ok(rows)
    }

    async fn end_foster_assignment(&self, id: FosterAssignmentId) -> Result<Option<FosterAssignment>> {
        self.enter("end_foster_assignment").await?;
        let mut t = self.tables();
        Ok(t
            .foster_assignments
            .get_mut(&id)
            .filter(|a| a.status == FosterAssignmentStatus::Active)
            .map(|a| {
                a.status = FosterAssignmentStatus::Ended;
                a.ended_at = Some(Utc::now());
                a.clone()
            }))
    }

    async fn reassign_foster_assignments_for_pet(&self, pet_id: PetId, shelter_id: ShelterId) -> Result<u64> {
        self.enter("reassign_foster_assignments_for_pet").await?;
        let mut t = self.tables();
        let mut changed = 0;
        for row in t.foster_assignments.values_mut().filter(|a| a.pet_id == pet_id) {
            row.shelter_id = shelter_id;
            changed += 1;
        }
        Ok(changed)
    }
}

#[async_trait]
impl TransferStore for MemoryStore {
    async fn insert_transfer_request(&self, request: &TransferRequest) -> Result<TransferRequest> {
        self.enter("insert_transfer_request").await?;
        let mut t = self.tables();
        if request.status == TransferStatus::Pending
            && t.transfer_requests
                .values()
                .any(|r| r.pet_id == request.pet_id && r.status == TransferStatus::Pending)
        {
            return Err(UniqueViolation::new("a transfer is already pending for this pet").into());
        }
        t.transfer_requests.insert(request.id, request.clone());
        Ok(request.clone())
    }

    async fn find_transfer_request(&self, id: TransferRequestId) -> Result<Option<TransferRequest>> {
        self.enter("find_transfer_request").await?;
        Ok(self.tables().transfer_requests.get(&id).cloned())
    }

    async fn find_pending_transfer_for_pet(&self, pet_id: PetId) -> Result<Option<TransferRequest>> {
        self.enter("find_pending_transfer_for_pet").await?;
        Ok(self
            .tables()
            .transfer_requests
            .values()
            .find(|r| r.pet_id == pet_id && r.status == TransferStatus::Pending)
            .cloned())
    }

    async fn claim_transfer_request(
        &self,
        id: TransferRequestId,
        by: UserId,
        stale_before: DateTime<Utc>,
    ) -> Result<Option<TransferRequest>> {
        self.enter("claim_transfer_request").await?;
        let mut t = self.tables();
        Ok(t
            .transfer_requests
            .get_mut(&id)
            .filter(|r| r.status == TransferStatus::Pending)
            .filter(|r| r.claimed_by.is_none() || r.claimed_at.is_some_and(|at| at < stale_before))
            .map(|r| {
                r.claimed_by = Some(by);
                r.claimed_at = Some(Utc::now());
                r.clone()
            }))
    }

    async fn release_transfer_claim(&self, id: TransferRequestId, by: UserId) -> Result<Option<TransferRequest>> {
        self.enter("release_transfer_claim").await?;
        let mut t = self.tables();
        Ok(t
            .transfer_requests
            .get_mut(&id)
            .filter(|r| r.status == TransferStatus::Pending && r.claimed_by == Some(by))
            .map(|r| {
                r.claimed_by = None;
                r.claimed_at = None;
                r.clone()
            }))
    }

    async fn decide_transfer_request(
        &self,
        id: TransferRequestId,
        status: TransferStatus,
        decided_by: UserId,
        note: Option<&str>,
    ) -> Result<Option<TransferRequest>> {
        self.enter("decide_transfer_request").await?;
        let mut t = self.tables();
        Ok(t
            .transfer_requests
            .get_mut(&id)
            .filter(|r| r.status == TransferStatus::Pending && r.claimed_by == Some(decided_by))
            .map(|r| {
                r.status = status;
                r.decided_by = Some(decided_by);
                r.decision_note = note.map(str::to_string);
                r.decided_at = Some(Utc::now());
                r.clone()
            }))
    }
}

#[async_trait]
impl VetApprovalStore for MemoryStore {
    async fn insert_vet_approval(&self, approval: &VetApproval) -> Result<VetApproval> {
        self.enter("insert_vet_approval").await?;
        let mut t = self.tables();
        if t.vet_approvals.iter().any(|v| v.token == approval.token) {
            bail!("duplicate vet approval token");
        }
        if approval.status == VetApprovalStatus::Pending
            && t.vet_approvals
                .iter()
                .any(|v| v.pet_id == approval.pet_id && v.status == VetApprovalStatus::Pending)
        {
            return Err(UniqueViolation::new("a vet approval is already pending for this pet").into());
        }
        t.vet_approvals.push(approval.clone());
        Ok(approval.clone())
    }

    async fn find_vet_approval_by_token(&self, token: &str) -> Result<Option<VetApproval>> {
        self.enter("find_vet_approval_by_token").await?;
        Ok(self
            .tables()
            .vet_approvals
            .iter()
            .find(|v| v.token == token)
            .cloned())
    }

    async fn find_pending_vet_approval_for_pet(&self, pet_id: PetId) -> Result<Option<VetApproval>> {
        self.enter("find_pending_vet_approval_for_pet").await?;
        Ok(self
            .tables()
            .vet_approvals
            .iter()
            .find(|v| v.pet_id == pet_id && v.status == VetApprovalStatus::Pending)
            .cloned())
    }

    async fn has_approved_vet_approval(&self, pet_id: PetId) -> Result<bool> {
        self.enter("has_approved_vet_approval").await?;
        Ok(self
            .tables()
            .vet_approvals
            .iter()
            .any(|v| v.pet_id == pet_id && v.status == VetApprovalStatus::Approved))
    }

    async fn decide_vet_approval(
        &self,
        token: &str,
        status: VetApprovalStatus,
        note: Option<&str>,
    ) -> Result<Option<VetApproval>> {
        self.enter("decide_vet_approval").await?;
        let mut t = self.tables();
        Ok(t
            .vet_approvals
            .iter_mut()
            .find(|v| v.token == token && v.status == VetApprovalStatus::Pending)
            .map(|v| {
                v.status = status;
                v.note = note.map(str::to_string);
                v.decided_at = Some(Utc::now());
                v.clone()
            }))
    }
}

#[async_trait]
impl OutboxStore for MemoryStore {
    async fn upsert_email_outbox(&self, row: &EmailOutbox) -> Result<EmailOutbox> {
        self.enter("upsert_email_outbox").await?;
        let mut t = self.tables();
        if let Some(existing) = t
            .email_outbox
            .values()
            .find(|r| r.dedup_key == row.dedup_key)
        {
            return Ok(existing.clone());
        }
        t.email_outbox.insert(row.id, row.clone());
        Ok(row.clone())
    }

    async fn find_email_outbox(&self, id: EmailOutboxId) -> Result<Option<EmailOutbox>> {
        self.enter("find_email_outbox").await?;
        Ok(self.tables().email_outbox.get(&id).cloned())
    }

    async fn find_email_outbox_by_dedup_key(&self, dedup_key: &str) -> Result<Option<EmailOutbox>> {
        self.enter("find_email_outbox_by_dedup_key").await?;
        Ok(self
            .tables()
            .email_outbox
            .values()
            .find(|r| r.dedup_key == dedup_key)
            .cloned())
    }

    async fn claim_email_outbox(&self, id: EmailOutboxId) -> Result<Option<EmailOutbox>> {
        self.enter("claim_email_outbox").await?;
        let mut t = self.tables();
        Ok(t
            .email_outbox
            .get_mut(&id)
            .filter(|r| r.status.is_claimable())
            .map(|r| {
                r.status = EmailStatus::Sending;
                r.updated_at = Utc::now();
                r.clone()
            }))
    }

    async fn mark_email_sent(&self, id: EmailOutboxId) -> Result<Option<EmailOutbox>> {
        self.enter("mark_email_sent").await?;
        let mut t = self.tables();
        Ok(t
            .email_outbox
            .get_mut(&id)
            .filter(|r| r.status == EmailStatus::Sending)
            .map(|r| {
                let now = Utc::now();
                r.status = EmailStatus::Sent;
                r.attempts += 1;
                r.sent_at = Some(now);
                r.last_error = None;
                r.updated_at = now;
                r.clone()
            }))
    }

    async fn mark_email_failed(&self, id: EmailOutboxId, error: &str) -> Result<Option<EmailOutbox>> {
        self.enter("mark_email_failed").await?;
        let mut t = self.tables();
        Ok(t
            .email_outbox
            .get_mut(&id)
            .filter(|r| r.status != EmailStatus::Sent)
            .map(|r| {
                r.status = EmailStatus::Failed;
                r.attempts += 1;
                r.last_error = Some(error.to_string());
                r.updated_at = Utc::now();
                r.clone()
            }))
    }

    async fn list_failed_email_outbox(&self, limit: i64) -> Result<Vec<EmailOutbox>> {
        self.enter("list_failed_email_outbox").await?;
        let mut rows: Vec<_> = self
            .tables()
            .email_outbox
            .values()
            .filter(|r| r.status == EmailStatus::Failed)
            .cloned()
            .collect();
        rows.sort_by_key(|r| r.updated_at);
        rows.truncate(limit.max(0) as usize);
        Ok(rows)
    }

    async fn release_stale_sending(&self, older_than: DateTime<Utc>) -> Result<u64> {
        self.enter("release_stale_sending").await?;
        let mut t = self.tables();
        let mut released = 0;
        for row in t
            .email_outbox
            .values_mut()
            .filter(|r| r.status == EmailStatus::Sending && r.updated_at < older_than)
        {
            row.status = EmailStatus::Failed;
            row.last_error = Some("released: stuck in sending".to_string());
            row.updated_at = Utc::now();
            released += 1;
        }
        Ok(released)
    }
}

#[async_trait]
impl WebhookStore for MemoryStore {
    async fn insert_webhook(&self, webhook: &Webhook) -> Result<Webhook> {
        self.enter("insert_webhook").await?;
        self.tables().webhooks.insert(webhook.id, webhook.clone());
        Ok(webhook.clone())
    }

    async fn find_webhook(&self, id: WebhookId) -> Result<Option<Webhook>> {
        self.enter("find_webhook").await?;
        Ok(self.tables().webhooks.get(&id).cloned())
    }

    async fn list_webhooks_for_owner(&self, user_id: UserId) -> Result<Vec<Webhook>> {
        self.enter("list_webhooks_for_owner").await?;
        let mut hooks: Vec<_> = self
            .tables()
            .webhooks
            .values()
            .filter(|w| w.user_id == user_id)
            .cloned()
            .collect();
        hooks.sort_by_key(|w| w.created_at);
        Ok(hooks)
    }

    async fn list_active_webhooks_for_event(&self, event: &str, owner: Option<UserId>) -> Result<Vec<Webhook>> {
        self.enter("list_active_webhooks_for_event").await?;
        let mut hooks: Vec<_> = self
            .tables()
            .webhooks
            .values()
            .filter(|w| w.is_active && w.subscribes_to(event))
            .filter(|w| owner.map_or(true, |o| w.user_id == o))
            .cloned()
            .collect();
        hooks.sort_by_key(|w| w.created_at);
        Ok(hooks)
    }

    async fn record_webhook_success(&self, id: WebhookId) -> Result<Option<Webhook>> {
        self.enter("record_webhook_success").await?;
        let mut t = self.tables();
        Ok(t.webhooks.get_mut(&id).map(|w| {
            let now = Utc::now();
            w.failure_count = 0;
            w.last_triggered_at = Some(now);
            w.updated_at = now;
            w.clone()
        }))
    }

    async fn record_webhook_failure(&self, id: WebhookId, threshold: i32) -> Result<Option<Webhook>> {
        self.enter("record_webhook_failure").await?;
        let mut t = self.tables();
        Ok(t.webhooks.get_mut(&id).map(|w| {
            let now = Utc::now();
            w.failure_count += 1;
            if w.failure_count >= threshold {
                w.is_active = false;
            }
            w.last_triggered_at = Some(now);
            w.updated_at = now;
            w.clone()
        }))
    }

    async fn set_webhook_active(&self, id: WebhookId, active: bool) -> Result<Option<Webhook>> {
        self.enter("set_webhook_active").await?;
        let mut t = self.tables();
        Ok(t.webhooks.get_mut(&id).map(|w| {
            w.is_active = active;
            if active {
                w.failure_count = 0;
            }
            w.updated_at = Utc::now();
            w.clone()
        }))
    }

    async fn set_webhook_secret(&self, id: WebhookId, secret: &str) -> Result<Option<Webhook>> {
        self.enter("set_webhook_secret").await?;
        let mut t = self.tables();
        Ok(t.webhooks.get_mut(&id).map(|w| {
            w.secret = secret.to_string();
            w.updated_at = Utc::now();
            w.clone()
        }))
    }
}

#[async_trait]
impl AuditStore for MemoryStore {
    async fn insert_audit_log(&self, entry: &AuditLog) -> Result<AuditLog> {
        self.enter("insert_audit_log").await?;
        self.tables().audit_logs.push(entry.clone());
        Ok(entry.clone())
    }

    async fn list_audit_logs_for_entity(&self, entity_type: &str, entity_id: Uuid) -> Result<Vec<AuditLog>> {
        self.enter("list_audit_logs_for_entity").await?;
        Ok(self
            .tables()
            .audit_logs
            .iter()
            .filter(|l| l.entity_type == entity_type && l.entity_id == entity_id)
            .cloned()
            .collect())
    }
}
