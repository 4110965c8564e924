pub mod vet_approval;

pub use vet_approval::{generate_token, VetApproval, VetApprovalStatus};
