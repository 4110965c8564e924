// Trait definitions for dependency injection
//
// These are INFRASTRUCTURE traits only - no business logic.
// Business logic (outbox processing, webhook fan-out) lives in domain
// activities that use these traits.
//
// Naming convention: Base* for trait names (e.g., BaseMailTransport)

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use uuid::Uuid;

// =============================================================================
// Mail Transport Trait (Infrastructure)
// =============================================================================

#[async_trait]
pub trait BaseMailTransport: Send + Sync {
    /// Send one email. Blocking from the caller's point of view; may fail.
    async fn send(&self, to: &str, subject: &str, html: &str) -> Result<()>;
}

// =============================================================================
// Webhook HTTP Client Trait (Infrastructure)
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WebhookResponse {
    pub status: u16,
}

impl WebhookResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[async_trait]
pub trait BaseWebhookClient: Send + Sync {
    /// POST `body` to `url`. Exceeding `timeout` is an error.
    async fn post(
        &self,
        url: &str,
        body: Vec<u8>,
        headers: Vec<(String, String)>,
        timeout: Duration,
    ) -> Result<WebhookResponse>;
}

// =============================================================================
// Realtime Fan-out Trait (Infrastructure)
// =============================================================================

#[async_trait]
pub trait BaseRealtime: Send + Sync {
    /// Best-effort publish to everyone in `room` (e.g. `user:<id>`).
    async fn publish(&self, room: &str, event: &str, payload: serde_json::Value);
}

// =============================================================================
// Job Scheduler Trait (Infrastructure)
// =============================================================================

#[derive(Debug, Clone)]
pub struct JobOptions {
    /// At most one pending/running job per key
    pub idempotency_key: Option<String>,
    pub max_attempts: i32,
    /// First retry delay; doubles per attempt
    pub backoff_initial_ms: i64,
}

impl Default for JobOptions {
    fn default() -> Self {
        Self {
            idempotency_key: None,
            max_attempts: 5,
            backoff_initial_ms: 1500,
        }
    }
}

/// Result type for enqueue operations that handles idempotency.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueResult {
    /// Job was enqueued, returns new job ID
    Created(Uuid),
    /// A pending/running job with the same idempotency key exists
    Duplicate(Uuid),
}

impl EnqueueResult {
    pub fn job_id(&self) -> Uuid {
        match self {
            EnqueueResult::Created(id) | EnqueueResult::Duplicate(id) => *id,
        }
    }

    pub fn is_created(&self) -> bool {
        matches!(self, EnqueueResult::Created(_))
    }
}

#[async_trait]
pub trait BaseJobScheduler: Send + Sync {
    /// Enqueue a job; handlers are invoked at least once.
    async fn enqueue(
        &self,
        job_type: &str,
        payload: serde_json::Value,
        options: JobOptions,
    ) -> Result<EnqueueResult>;
}
