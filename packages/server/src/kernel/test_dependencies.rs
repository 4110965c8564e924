// TestDependencies - mock implementations for testing
//
// Provides mock services that can be injected into ServerDeps for tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use uuid::Uuid;

use super::jobs::JobRegistry;
use super::store::EntityStore;
use super::{
    BaseJobScheduler, BaseMailTransport, BaseRealtime, BaseWebhookClient, EnqueueResult,
    JobOptions, ServerDeps, WebhookResponse, WorkflowSettings,
};
use crate::common::FieldCipher;

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

// =============================================================================
// Spy Mail Transport
// =============================================================================

#[derive(Debug, Clone)]
pub struct SentEmail {
    pub to: String,
    pub subject: String,
    pub html: String,
}

#[derive(Default)]
pub struct SpyMailTransport {
    sent: Arc<Mutex<Vec<SentEmail>>>,
    attempts: Arc<Mutex<usize>>,
    /// Number of upcoming sends that fail
    fail_next: Arc<Mutex<usize>>,
    fail_always: Arc<Mutex<bool>>,
    delay: Option<Duration>,
}

impl SpyMailTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `n` sends, then succeed.
    pub fn failing_times(self, n: usize) -> Self {
        *lock(&self.fail_next) = n;
        self
    }

    pub fn failing(self) -> Self {
        *lock(&self.fail_always) = true;
        self
    }

    /// Hold every send for `delay` before completing.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn recover(&self) {
        *lock(&self.fail_always) = false;
        *lock(&self.fail_next) = 0;
    }

    /// Successfully delivered emails
    pub fn sent(&self) -> Vec<SentEmail> {
        lock(&self.sent).clone()
    }

    pub fn sent_to(&self, address: &str) -> Vec<SentEmail> {
        self.sent().into_iter().filter(|e| e.to == address).collect()
    }

    /// All send calls, failed ones included
    pub fn attempts(&self) -> usize {
        *lock(&self.attempts)
    }
}

#[async_trait]
impl BaseMailTransport for SpyMailTransport {
    async fn send(&self, to: &str, subject: &str, html: &str) -> Result<()> {
        *lock(&self.attempts) += 1;
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        if *lock(&self.fail_always) {
            anyhow::bail!("mail transport unavailable");
        }
        {
            let mut remaining = lock(&self.fail_next);
            if *remaining > 0 {
                *remaining -= 1;
                anyhow::bail!("mail transport unavailable");
            }
        }

        lock(&self.sent).push(SentEmail {
            to: to.to_string(),
            subject: subject.to_string(),
            html: html.to_string(),
        });
        Ok(())
    }
}

// =============================================================================
// Mock Webhook Client
// =============================================================================

#[derive(Debug, Clone)]
pub enum MockWebhookResponse {
    Status(u16),
    NetworkError(String),
    Timeout,
}

/// Arguments captured from a post call
#[derive(Debug, Clone)]
pub struct WebhookCall {
    pub url: String,
    pub body: Vec<u8>,
    pub headers: Vec<(String, String)>,
    pub timeout: Duration,
}

impl WebhookCall {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.body).unwrap_or(serde_json::Value::Null)
    }
}

/// Answers 200 unless a URL has scripted responses. Scripted responses are
/// consumed in order; the last one repeats.
#[derive(Default)]
pub struct MockWebhookClient {
    scripted: Arc<Mutex<HashMap<String, Vec<MockWebhookResponse>>>>,
    calls: Arc<Mutex<Vec<WebhookCall>>>,
}

impl MockWebhookClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_responses(self, url: &str, responses: Vec<MockWebhookResponse>) -> Self {
        self.script(url, responses);
        self
    }

    pub fn script(&self, url: &str, responses: Vec<MockWebhookResponse>) {
        lock(&self.scripted).insert(url.to_string(), responses);
    }

    pub fn calls(&self) -> Vec<WebhookCall> {
        lock(&self.calls).clone()
    }

    pub fn calls_to(&self, url: &str) -> Vec<WebhookCall> {
        self.calls().into_iter().filter(|c| c.url == url).collect()
    }

    pub fn call_count(&self) -> usize {
        lock(&self.calls).len()
    }
}

#[async_trait]
impl BaseWebhookClient for MockWebhookClient {
    async fn post(
        &self,
        url: &str,
        body: Vec<u8>,
        headers: Vec<(String, String)>,
        timeout: Duration,
    ) -> Result<WebhookResponse> {
        lock(&self.calls).push(WebhookCall {
            url: url.to_string(),
            body,
            headers,
            timeout,
        });

        let next = {
            let mut scripted = lock(&self.scripted);
            match scripted.get_mut(url) {
                Some(queue) if queue.len() > 1 => Some(queue.remove(0)),
                Some(queue) => queue.first().cloned(),
                None => None,
            }
        };

        match next.unwrap_or(MockWebhookResponse::Status(200)) {
            MockWebhookResponse::Status(status) => Ok(WebhookResponse { status }),
            MockWebhookResponse::NetworkError(msg) => Err(anyhow::anyhow!(msg)),
            MockWebhookResponse::Timeout => {
                Err(anyhow::anyhow!("request timed out after {:?}", timeout))
            }
        }
    }
}

// =============================================================================
// Spy Job Scheduler
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpyJobState {
    Pending,
    Succeeded,
    DeadLetter,
}

#[derive(Debug, Clone)]
pub struct QueuedJob {
    pub id: Uuid,
    pub job_type: String,
    pub payload: serde_json::Value,
    pub options: JobOptions,
    pub state: SpyJobState,
    pub attempts: i32,
    pub last_error: Option<String>,
}

/// Records enqueued jobs; `run_pending` executes them inline.
#[derive(Default)]
pub struct SpyJobScheduler {
    jobs: Arc<Mutex<Vec<QueuedJob>>>,
    fail_enqueue: Arc<Mutex<bool>>,
}

impl SpyJobScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `enqueue` return an error (scheduler outage).
    pub fn set_failing(&self, failing: bool) {
        *lock(&self.fail_enqueue) = failing;
    }

    pub fn jobs(&self) -> Vec<QueuedJob> {
        lock(&self.jobs).clone()
    }

    pub fn jobs_of_type(&self, job_type: &str) -> Vec<QueuedJob> {
        self.jobs()
            .into_iter()
            .filter(|j| j.job_type == job_type)
            .collect()
    }

    pub fn pending_count(&self) -> usize {
        lock(&self.jobs)
            .iter()
            .filter(|j| j.state == SpyJobState::Pending)
            .count()
    }

    /// Run pending jobs until none are left, including jobs enqueued by
    /// handlers. A failing job is retried immediately up to its
    /// `max_attempts`, then dead-lettered. Returns how many jobs ran.
    pub async fn run_pending(&self, registry: &JobRegistry) -> usize {
        let mut ran = 0;

        loop {
            let next = lock(&self.jobs)
                .iter()
                .find(|j| j.state == SpyJobState::Pending)
                .cloned();
            let Some(job) = next else { break };
            ran += 1;

            let mut attempts = 0;
            let mut outcome = SpyJobState::DeadLetter;
            let mut last_error = None;
            match registry.get(&job.job_type) {
                Some(handler) => {
                    while attempts < job.options.max_attempts.max(1) {
                        attempts += 1;
                        match handler.handle(job.payload.clone()).await {
                            Ok(()) => {
                                outcome = SpyJobState::Succeeded;
                                break;
                            }
                            Err(e) => last_error = Some(e.to_string()),
                        }
                    }
                }
                None => last_error = Some(format!("unknown job type: {}", job.job_type)),
            }

            if let Some(stored) = lock(&self.jobs).iter_mut().find(|j| j.id == job.id) {
                stored.state = outcome;
                stored.attempts += attempts;
                stored.last_error = last_error;
            }
        }

        ran
    }
}

#[async_trait]
impl BaseJobScheduler for SpyJobScheduler {
    async fn enqueue(
        &self,
        job_type: &str,
        payload: serde_json::Value,
        options: JobOptions,
    ) -> Result<EnqueueResult> {
        if *lock(&self.fail_enqueue) {
            anyhow::bail!("job scheduler unavailable");
        }

        let mut jobs = lock(&self.jobs);
        if let Some(key) = &options.idempotency_key {
            if let Some(existing) = jobs.iter().find(|j| {
                j.state == SpyJobState::Pending && j.options.idempotency_key.as_ref() == Some(key)
            }) {
                return Ok(EnqueueResult::Duplicate(existing.id));
            }
        }

        let id = Uuid::now_v7();
        jobs.push(QueuedJob {
            id,
            job_type: job_type.to_string(),
            payload,
            options,
            state: SpyJobState::Pending,
            attempts: 0,
            last_error: None,
        });
        Ok(EnqueueResult::Created(id))
    }
}

// =============================================================================
// Test Realtime
// =============================================================================

#[derive(Debug, Clone)]
pub struct PublishedEvent {
    pub room: String,
    pub event: String,
    pub payload: serde_json::Value,
}

#[derive(Default)]
pub struct TestRealtime {
    published: Arc<Mutex<Vec<PublishedEvent>>>,
}

impl TestRealtime {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn published(&self) -> Vec<PublishedEvent> {
        lock(&self.published).clone()
    }

    pub fn published_to(&self, room: &str) -> Vec<PublishedEvent> {
        self.published()
            .into_iter()
            .filter(|e| e.room == room)
            .collect()
    }
}

#[async_trait]
impl BaseRealtime for TestRealtime {
    async fn publish(&self, room: &str, event: &str, payload: serde_json::Value) {
        lock(&self.published).push(PublishedEvent {
            room: room.to_string(),
            event: event.to_string(),
            payload,
        });
    }
}

// =============================================================================
// TestDependencies
// =============================================================================

pub struct TestDependencies {
    pub mailer: Arc<SpyMailTransport>,
    pub webhook_client: Arc<MockWebhookClient>,
    pub jobs: Arc<SpyJobScheduler>,
    pub realtime: Arc<TestRealtime>,
    pub cipher: Arc<FieldCipher>,
    pub settings: WorkflowSettings,
}

impl TestDependencies {
    pub fn new() -> Self {
        Self {
            mailer: Arc::new(SpyMailTransport::new()),
            webhook_client: Arc::new(MockWebhookClient::new()),
            jobs: Arc::new(SpyJobScheduler::new()),
            realtime: Arc::new(TestRealtime::new()),
            cipher: Arc::new(FieldCipher::generate()),
            settings: WorkflowSettings::default(),
        }
    }

    /// Set a mock mail transport
    pub fn mock_mailer(mut self, mailer: SpyMailTransport) -> Self {
        self.mailer = Arc::new(mailer);
        self
    }

    /// Set a mock webhook client
    pub fn mock_webhooks(mut self, client: MockWebhookClient) -> Self {
        self.webhook_client = Arc::new(client);
        self
    }

    pub fn with_settings(mut self, settings: WorkflowSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Convert into ServerDeps over the given store
    pub fn into_deps(&self, store: Arc<dyn EntityStore>) -> ServerDeps {
        ServerDeps::new(
            store,
            self.jobs.clone(),
            self.mailer.clone(),
            self.webhook_client.clone(),
            self.realtime.clone(),
            self.cipher.clone(),
            self.settings.clone(),
        )
    }
}

impl Default for TestDependencies {
    fn default() -> Self {
        Self::new()
    }
}
