//! Kernel module - server infrastructure and dependencies.

pub mod deps;
pub mod jobs;
pub mod mail;
pub mod saga;
pub mod store;
pub mod stream_hub;
pub mod test_dependencies;
pub mod traits;
pub mod webhook_client;

pub use deps::{ServerDeps, WorkflowSettings};
pub use jobs::{JobHandler, JobRegistry, JobWorker, JobWorkerConfig, PostgresJobQueue};
pub use mail::{HttpMailTransport, LogMailTransport};
pub use saga::Saga;
pub use store::{EntityStore, MemoryStore, PostgresStore};
pub use stream_hub::{shelter_room, user_room, StreamHub};
pub use test_dependencies::TestDependencies;
pub use traits::*;
pub use webhook_client::ReqwestWebhookClient;
