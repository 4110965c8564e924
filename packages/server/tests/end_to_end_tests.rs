//! End-to-end adoption flow: submit, approve, adopted pet, one status email.

mod common;

use crate::common::{TestHarness, World};
use adoption_core::domains::applications::activities::{update_application_status, ReviewInput};
use adoption_core::domains::applications::ApplicationStatus;
use adoption_core::domains::outbox::{requeue_failed, EmailStatus};
use adoption_core::domains::pets::PetStatus;
use adoption_core::domains::webhooks::activities::{register_webhook, RegisterWebhookInput};
use adoption_core::kernel::test_dependencies::SpyMailTransport;
use adoption_core::kernel::{user_room, TestDependencies};
use test_context::test_context;

#[test_context(TestHarness)]
#[tokio::test]
async fn approved_application_adopts_pet_and_emails_adopter_once(ctx: &TestHarness) {
    let world = World::seed(ctx, PetStatus::Available).await;
    register_webhook(
        &world.staff(),
        RegisterWebhookInput {
            url: "https://hooks.example.test/north-paws".into(),
            events: vec!["application.status_changed".into(), "pet.status_changed".into()],
        },
        &ctx.deps,
    )
    .await
    .unwrap();

    let application = world.submit(ctx).await;
    let approved = update_application_status(
        &world.staff(),
        application.id,
        ReviewInput {
            status: ApplicationStatus::Approved,
            expected_version: Some(0),
            notes: Some("Welcome home!".into()),
        },
        &ctx.deps,
    )
    .await
    .unwrap();
    ctx.settle().await;

    assert_eq!(approved.version, 1);
    let pet = world.reload_pet(ctx).await;
    assert_eq!(pet.status, PetStatus::Adopted);
    assert!(pet.adoption_date.is_some());

    let rows = ctx.store.all_email_outbox();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].dedup_key, format!("application-status:{}:approved", application.id));
    assert_eq!(rows[0].status, EmailStatus::Sent);
    assert_eq!(rows[0].to_address, world.adopter.email);

    let emails = ctx.mocks.mailer.sent();
    assert_eq!(emails.len(), 1);
    assert_eq!(emails[0].subject, "Your application for Biscuit is now approved");
    assert!(emails[0].html.contains("Welcome home!"));

    let mut events: Vec<_> = ctx
        .mocks
        .webhook_client
        .calls()
        .into_iter()
        .map(|c| c.header("X-Webhook-Event").unwrap_or_default().to_string())
        .collect();
    events.sort();
    assert_eq!(events, vec!["application.status_changed", "pet.status_changed"]);

    let adopter_events = ctx.mocks.realtime.published_to(&user_room(world.adopter.id));
    assert_eq!(adopter_events.len(), 1);
    assert_eq!(adopter_events[0].payload["status"], "approved");
}

#[test_context(TestHarness)]
#[tokio::test]
async fn repeated_settling_does_not_resend(ctx: &TestHarness) {
    let world = World::seed(ctx, PetStatus::Available).await;
    let application = world.submit(ctx).await;
    update_application_status(
        &world.staff(),
        application.id,
        ReviewInput {
            status: ApplicationStatus::Reviewing,
            expected_version: Some(0),
            notes: None,
        },
        &ctx.deps,
    )
    .await
    .unwrap();

    ctx.settle().await;
    ctx.settle().await;
    assert_eq!(requeue_failed(&ctx.deps, 10).await.unwrap(), 0);

    assert_eq!(ctx.mocks.mailer.sent().len(), 1);
}

#[tokio::test]
async fn mail_outage_does_not_fail_the_review() {
    let mocks = TestDependencies::new().mock_mailer(SpyMailTransport::new().failing());
    let ctx = TestHarness::with_mocks(mocks);
    let world = World::seed(&ctx, PetStatus::Available).await;
    let application = world.submit(&ctx).await;

    let approved = update_application_status(
        &world.staff(),
        application.id,
        ReviewInput {
            status: ApplicationStatus::Approved,
            expected_version: Some(0),
            notes: None,
        },
        &ctx.deps,
    )
    .await;
    ctx.settle().await;

    assert!(approved.is_ok());
    assert_eq!(world.reload_pet(&ctx).await.status, PetStatus::Adopted);
    let rows = ctx.store.all_email_outbox();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].status, EmailStatus::Failed);

    ctx.mocks.mailer.recover();
    assert_eq!(requeue_failed(&ctx.deps, 10).await.unwrap(), 1);
    ctx.settle().await;

    assert_eq!(ctx.store.all_email_outbox()[0].status, EmailStatus::Sent);
    assert_eq!(ctx.mocks.mailer.sent().len(), 1);
}
