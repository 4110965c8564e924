//! Job infrastructure for background execution.
//!
//! - [`PostgresJobQueue`] - database-backed queue, implements `BaseJobScheduler`
//! - [`JobWorker`] - long-running service that polls and executes jobs
//! - [`JobRegistry`] - job type to handler mapping
//! - [`Job`] - job model with its SQL
//!
//! Job handlers live in their domains (e.g. the outbox `SendEmailJob`); this
//! module only provides the plumbing.

mod job;
mod queue;
mod registry;
mod worker;

pub use job::{backoff_delay, Job, JobStatus};
pub use queue::{JobStore, PostgresJobQueue};
pub use registry::{JobHandler, JobRegistry};
pub use worker::{JobWorker, JobWorkerConfig};
