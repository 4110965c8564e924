//! Server dependencies for activities (using traits for testability)
//!
//! This module provides the central dependency container used by all domain
//! activities. All external services use trait abstractions so tests can
//! swap in the in-memory store and the mocks from `test_dependencies`.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::task::TaskTracker;
use tracing::{debug, warn};

use crate::common::auth::HasAuthContext;
use crate::common::FieldCipher;
use crate::config::Config;
use crate::kernel::store::EntityStore;
use crate::kernel::{
    BaseJobScheduler, BaseMailTransport, BaseRealtime, BaseWebhookClient, JobOptions,
};

/// Tunables for delivery and retries.
#[derive(Debug, Clone)]
pub struct WorkflowSettings {
    pub webhook_timeout: Duration,
    /// Failed deliveries before a webhook is disabled; a success resets the count
    pub webhook_failure_threshold: i32,
    pub job_max_attempts: i32,
    pub job_backoff_initial_ms: i64,
    /// Base URL used in links sent to vets
    pub public_base_url: String,
}

impl Default for WorkflowSettings {
    fn default() -> Self {
        Self {
            webhook_timeout: Duration::from_secs(10),
            webhook_failure_threshold: 10,
            job_max_attempts: 5,
            job_backoff_initial_ms: 1500,
            public_base_url: "http://localhost:8080".to_string(),
        }
    }
}

impl WorkflowSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            webhook_timeout: Duration::from_secs(config.webhook_timeout_secs),
            webhook_failure_threshold: config.webhook_failure_threshold,
            job_max_attempts: config.job_max_attempts,
            job_backoff_initial_ms: config.job_backoff_initial_ms,
            public_base_url: config.public_base_url.clone(),
        }
    }

    /// Retry policy for a job keyed by `idempotency_key`.
    pub fn job_options(&self, idempotency_key: impl Into<String>) -> JobOptions {
        JobOptions {
            idempotency_key: Some(idempotency_key.into()),
            max_attempts: self.job_max_attempts,
            backoff_initial_ms: self.job_backoff_initial_ms,
        }
    }
}

/// Server dependencies accessible to activities (using traits for testability)
#[derive(Clone)]
pub struct ServerDeps {
    pub store: Arc<dyn EntityStore>,
    pub jobs: Arc<dyn BaseJobScheduler>,
    pub mailer: Arc<dyn BaseMailTransport>,
    pub webhook_client: Arc<dyn BaseWebhookClient>,
    pub realtime: Arc<dyn BaseRealtime>,
    /// Field-level encryption for phones and adopter messages
    pub cipher: Arc<FieldCipher>,
    /// Fire-and-forget work spawned after a primary mutation
    pub background: TaskTracker,
    pub settings: WorkflowSettings,
}

impl ServerDeps {
    /// Create new ServerDeps with the given dependencies
    pub fn new(
        store: Arc<dyn EntityStore>,
        jobs: Arc<dyn BaseJobScheduler>,
        mailer: Arc<dyn BaseMailTransport>,
        webhook_client: Arc<dyn BaseWebhookClient>,
        realtime: Arc<dyn BaseRealtime>,
        cipher: Arc<FieldCipher>,
        settings: WorkflowSettings,
    ) -> Self {
        Self {
            store,
            jobs,
            mailer,
            webhook_client,
            realtime,
            cipher,
            background: TaskTracker::new(),
            settings,
        }
    }

    /// Run `task` on the background tracker. Errors are logged, never
    /// returned to the caller that spawned it.
    pub fn spawn_background<F>(&self, name: &'static str, task: F)
    where
        F: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.background.spawn(async move {
            match task.await {
                Ok(()) => debug!(task = name, "background task finished"),
                Err(e) => warn!(task = name, error = %e, "background task failed"),
            }
        });
    }

    /// Wait for every background task spawned so far.
    ///
    /// Used at shutdown and by tests that assert on side effects. The tracker
    /// is reopened afterwards so the deps stay usable.
    pub async fn drain_background(&self) {
        self.background.close();
        self.background.wait().await;
        self.background.reopen();
    }
}

/// Implement HasAuthContext for ServerDeps to enable authorization checks
impl HasAuthContext for ServerDeps {
    fn entity_store(&self) -> &dyn EntityStore {
        self.store.as_ref()
    }
}
