pub mod activities;
pub mod models;

pub use activities::{
    enqueue_email, process_by_id, release_stale_sending, requeue_failed, spawn_email,
    EmailRequest, ProcessOutcome, SendEmailJob, SEND_EMAIL_JOB,
};
pub use models::{EmailOutbox, EmailStatus, EmailTemplate};
