//! Typed ID definitions for all domain entities.
//!
//! Each entity gets a marker type and a `*Id` alias over [`Id`]. The aliases
//! are the API; the markers only exist to keep the ids apart at compile time.

pub use super::id::Id;

// ============================================================================
// Entity marker types
// ============================================================================

pub struct User;
pub struct Shelter;
pub struct StaffApplication;
pub struct Pet;
pub struct Application;
pub struct Foster;
pub struct FosterAssignment;
pub struct TransferRequest;
pub struct VetApproval;
pub struct EmailOutbox;
pub struct Webhook;
pub struct AuditLog;

// ============================================================================
// Type aliases - the primary API
// ============================================================================

pub type UserId = Id<User>;
pub type ShelterId = Id<Shelter>;
pub type StaffApplicationId = Id<StaffApplication>;
pub type PetId = Id<Pet>;
pub type ApplicationId = Id<Application>;
pub type FosterId = Id<Foster>;
pub type FosterAssignmentId = Id<FosterAssignment>;
pub type TransferRequestId = Id<TransferRequest>;
pub type VetApprovalId = Id<VetApproval>;
pub type EmailOutboxId = Id<EmailOutbox>;
pub type WebhookId = Id<Webhook>;
pub type AuditLogId = Id<AuditLog>;
