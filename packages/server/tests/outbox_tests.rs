//! Integration tests for the email outbox.
//!
//! Rows are deduplicated by business key, delivery is at most once per row,
//! and failed sends are retried by the job scheduler.

mod common;

use std::time::Duration;

use crate::common::TestHarness;
use adoption_core::domains::outbox::{
    enqueue_email, process_by_id, release_stale_sending, requeue_failed, EmailOutbox,
    EmailRequest, EmailStatus, EmailTemplate, ProcessOutcome, SEND_EMAIL_JOB,
};
use adoption_core::common::{CoreError, EmailOutboxId};
use adoption_core::kernel::store::OutboxStore;
use adoption_core::kernel::test_dependencies::{SpyJobState, SpyMailTransport};
use adoption_core::kernel::{TestDependencies, WorkflowSettings};
use chrono::Utc;
use serde_json::json;
use test_context::test_context;

fn status_email(key: &str) -> EmailRequest {
    EmailRequest {
        dedup_key: key.to_string(),
        to: "avery@example.test".to_string(),
        template: EmailTemplate::ApplicationStatus,
        payload: json!({
            "pet_name": "Biscuit",
            "status": "approved",
            "adopter_name": "Avery",
        }),
    }
}

async fn row(ctx: &TestHarness, id: EmailOutboxId) -> EmailOutbox {
    ctx.store.find_email_outbox(id).await.unwrap().unwrap()
}

// =============================================================================
// Enqueue
// =============================================================================

#[test_context(TestHarness)]
#[tokio::test]
async fn same_dedup_key_yields_one_row_and_one_job(ctx: &TestHarness) {
    let first = enqueue_email(&ctx.deps, status_email("application-status:a1:approved"))
        .await
        .unwrap();
    let second = enqueue_email(&ctx.deps, status_email("application-status:a1:approved"))
        .await
        .unwrap();

    assert_eq!(first.id, second.id);
    assert_eq!(ctx.store.all_email_outbox().len(), 1);
    assert_eq!(ctx.mocks.jobs.jobs_of_type(SEND_EMAIL_JOB).len(), 1);

    let job = &ctx.mocks.jobs.jobs()[0];
    assert_eq!(job.payload["outbox_id"], json!(first.id));
    assert_eq!(
        job.options.idempotency_key.as_deref(),
        Some(format!("email:{}", first.id).as_str())
    );
}

#[test_context(TestHarness)]
#[tokio::test]
async fn sent_row_is_not_rescheduled(ctx: &TestHarness) {
    let row = enqueue_email(&ctx.deps, status_email("application-status:a2:approved"))
        .await
        .unwrap();
    ctx.settle().await;
    assert_eq!(ctx.mocks.mailer.sent().len(), 1);

    let again = enqueue_email(&ctx.deps, status_email("application-status:a2:approved"))
        .await
        .unwrap();

    assert_eq!(again.id, row.id);
    assert_eq!(again.status, EmailStatus::Sent);
    assert_eq!(ctx.mocks.jobs.pending_count(), 0);
    assert_eq!(ctx.mocks.jobs.jobs().len(), 1);
}

// =============================================================================
// Processing
// =============================================================================

#[test_context(TestHarness)]
#[tokio::test]
async fn processing_sends_once_and_marks_sent(ctx: &TestHarness) {
    let queued = enqueue_email(&ctx.deps, status_email("application-status:a3:approved"))
        .await
        .unwrap();

    let outcome = process_by_id(&ctx.deps, queued.id).await.unwrap();

    assert_eq!(outcome, ProcessOutcome::Sent);
    let stored = row(ctx, queued.id).await;
    assert_eq!(stored.status, EmailStatus::Sent);
    assert_eq!(stored.attempts, 1);
    assert!(stored.sent_at.is_some());

    let sent = ctx.mocks.mailer.sent_to("avery@example.test");
    assert_eq!(sent.len(), 1);
    assert!(sent[0].subject.contains("Biscuit"));
}

#[test_context(TestHarness)]
#[tokio::test]
async fn processing_a_sent_row_never_calls_transport(ctx: &TestHarness) {
    let queued = enqueue_email(&ctx.deps, status_email("application-status:a4:approved"))
        .await
        .unwrap();
    process_by_id(&ctx.deps, queued.id).await.unwrap();
    let attempts = ctx.mocks.mailer.attempts();

    let outcome = process_by_id(&ctx.deps, queued.id).await.unwrap();

    assert_eq!(outcome, ProcessOutcome::AlreadySent);
    assert_eq!(ctx.mocks.mailer.attempts(), attempts);
}

#[test_context(TestHarness)]
#[tokio::test]
async fn processing_unknown_id_is_a_no_op(ctx: &TestHarness) {
    let outcome = process_by_id(&ctx.deps, EmailOutboxId::new()).await.unwrap();

    assert_eq!(outcome, ProcessOutcome::Missing);
    assert_eq!(ctx.mocks.mailer.attempts(), 0);
}

#[tokio::test]
async fn concurrent_processing_sends_exactly_once() {
    let mocks = TestDependencies::new()
        .mock_mailer(SpyMailTransport::new().with_delay(Duration::from_millis(50)));
    let ctx = TestHarness::with_mocks(mocks);
    let queued = enqueue_email(&ctx.deps, status_email("application-status:a5:approved"))
        .await
        .unwrap();
    ctx.store.yield_between_calls();

    let (a, b) = tokio::join!(
        process_by_id(&ctx.deps, queued.id),
        process_by_id(&ctx.deps, queued.id),
    );

    let mut outcomes = vec![a.unwrap(), b.unwrap()];
    outcomes.sort_by_key(|o| o.as_str());
    assert!(outcomes.contains(&ProcessOutcome::Sent));
    assert!(
        outcomes.contains(&ProcessOutcome::InFlight) || outcomes.contains(&ProcessOutcome::NotClaimed),
        "{:?}",
        outcomes
    );
    assert_eq!(ctx.mocks.mailer.sent().len(), 1);
    assert_eq!(ctx.mocks.mailer.attempts(), 1);
}

#[test_context(TestHarness)]
#[tokio::test]
async fn unknown_template_fails_the_row(ctx: &TestHarness) {
    let bogus = EmailOutbox::builder()
        .dedup_key("bogus:1:x")
        .email_type("newsletter")
        .to_address("avery@example.test")
        .build();
    ctx.store.put_email_outbox(bogus.clone());

    let result = process_by_id(&ctx.deps, bogus.id).await;

    assert!(matches!(result, Err(CoreError::Validation(_))));
    let stored = row(ctx, bogus.id).await;
    assert_eq!(stored.status, EmailStatus::Failed);
    assert_eq!(ctx.mocks.mailer.attempts(), 0);
}

// =============================================================================
// Retries and remediation
// =============================================================================

#[tokio::test]
async fn transient_send_failures_are_retried_until_sent() {
    let mocks = TestDependencies::new().mock_mailer(SpyMailTransport::new().failing_times(2));
    let ctx = TestHarness::with_mocks(mocks);
    let queued = enqueue_email(&ctx.deps, status_email("application-status:a6:approved"))
        .await
        .unwrap();

    ctx.settle().await;

    let stored = row(&ctx, queued.id).await;
    assert_eq!(stored.status, EmailStatus::Sent);
    assert_eq!(stored.attempts, 3);
    assert!(stored.last_error.is_none());
    assert_eq!(ctx.mocks.mailer.attempts(), 3);
    assert_eq!(ctx.mocks.mailer.sent().len(), 1);

    let job = &ctx.mocks.jobs.jobs_of_type(SEND_EMAIL_JOB)[0];
    assert_eq!(job.state, SpyJobState::Succeeded);
    assert_eq!(job.attempts, 3);
}

#[tokio::test]
async fn exhausted_retries_leave_row_failed_until_requeued() {
    let mocks = TestDependencies::new()
        .mock_mailer(SpyMailTransport::new().failing())
        .with_settings(WorkflowSettings {
            job_max_attempts: 3,
            ..WorkflowSettings::default()
        });
    let ctx = TestHarness::with_mocks(mocks);
    let queued = enqueue_email(&ctx.deps, status_email("application-status:a7:approved"))
        .await
        .unwrap();

    ctx.settle().await;

    let stored = row(&ctx, queued.id).await;
    assert_eq!(stored.status, EmailStatus::Failed);
    assert_eq!(stored.attempts, 3);
    assert_eq!(stored.last_error.as_deref(), Some("mail transport unavailable"));
    assert_eq!(ctx.mocks.jobs.jobs()[0].state, SpyJobState::DeadLetter);

    ctx.mocks.mailer.recover();
    let requeued = requeue_failed(&ctx.deps, 100).await.unwrap();
    assert_eq!(requeued, 1);
    ctx.settle().await;

    let stored = row(&ctx, queued.id).await;
    assert_eq!(stored.status, EmailStatus::Sent);
    assert_eq!(stored.attempts, 4);
    assert_eq!(ctx.mocks.mailer.sent().len(), 1);
}

#[test_context(TestHarness)]
#[tokio::test]
async fn requeue_skips_rows_already_scheduled(ctx: &TestHarness) {
    let failed = EmailOutbox::builder()
        .dedup_key("application-status:a8:approved")
        .email_type("application_status")
        .to_address("avery@example.test")
        .status(EmailStatus::Failed)
        .build();
    ctx.store.put_email_outbox(failed);

    assert_eq!(requeue_failed(&ctx.deps, 100).await.unwrap(), 1);
    assert_eq!(requeue_failed(&ctx.deps, 100).await.unwrap(), 0);
    assert_eq!(ctx.mocks.jobs.pending_count(), 1);
}

#[test_context(TestHarness)]
#[tokio::test]
async fn stale_sending_rows_are_released_for_retry(ctx: &TestHarness) {
    let stuck = EmailOutbox::builder()
        .dedup_key("application-status:a9:approved")
        .email_type("application_status")
        .to_address("avery@example.test")
        .status(EmailStatus::Sending)
        .updated_at(Utc::now() - chrono::Duration::minutes(30))
        .build();
    let fresh = EmailOutbox::builder()
        .dedup_key("application-status:a10:approved")
        .email_type("application_status")
        .to_address("avery@example.test")
        .status(EmailStatus::Sending)
        .build();
    ctx.store.put_email_outbox(stuck.clone());
    ctx.store.put_email_outbox(fresh.clone());

    let released = release_stale_sending(&ctx.deps, chrono::Duration::minutes(10))
        .await
        .unwrap();

    assert_eq!(released, 1);
    assert_eq!(row(ctx, stuck.id).await.status, EmailStatus::Failed);
    assert_eq!(row(ctx, fresh.id).await.status, EmailStatus::Sending);

    assert_eq!(process_by_id(&ctx.deps, stuck.id).await.unwrap(), ProcessOutcome::Sent);
    assert_eq!(
        process_by_id(&ctx.deps, fresh.id).await.unwrap(),
        ProcessOutcome::InFlight
    );
}
