//! Outbox actions - enqueue, idempotent processing and remediation

mod enqueue;
mod job;
mod process;
mod remediation;

pub use enqueue::{enqueue_email, spawn_email, EmailRequest};
pub use job::{SendEmailJob, SEND_EMAIL_JOB};
pub use process::{process_by_id, ProcessOutcome};
pub use remediation::{release_stale_sending, requeue_failed};
