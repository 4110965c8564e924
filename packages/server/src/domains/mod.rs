// Business domains
pub mod applications;
pub mod audit;
pub mod fosters;
pub mod outbox;
pub mod pets;
pub mod shelters;
pub mod transfers;
pub mod users;
pub mod vet_approvals;
pub mod webhooks;
