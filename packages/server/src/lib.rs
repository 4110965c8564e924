// Shelter adoption platform - workflow core
//
// This crate holds the transactional workflow layer of the adoption platform:
// optimistic locking for application review, the email outbox, the webhook
// engine and the pet transfer saga, plus the entity models they operate on.
//
// Domains live in domains/*, infrastructure (store, jobs, transports) in kernel/.

pub mod common;
pub mod config;
pub mod domains;
pub mod kernel;
pub mod server;

pub use config::*;
