//! Integration tests for adoption application review.
//!
//! Covers the version guard on status updates, terminal statuses, the pet
//! transition on approval and adopter withdrawal.

mod common;

use crate::common::{add_staff, create_user, TestHarness, World};
use adoption_core::common::{Actor, CoreError, Role};
use adoption_core::domains::applications::activities::{
    read_application_message, submit_application, update_application_status,
    withdraw_application, ReviewInput, SubmitApplicationInput,
};
use adoption_core::domains::applications::{Application, ApplicationStatus};
use adoption_core::domains::pets::activities::update_pet_status;
use adoption_core::domains::pets::PetStatus;
use adoption_core::kernel::store::ApplicationStore;
use test_context::test_context;

fn review(status: ApplicationStatus, expected_version: i32) -> ReviewInput {
    ReviewInput {
        status,
        expected_version: Some(expected_version),
        notes: None,
    }
}

async fn reload(ctx: &TestHarness, application: &Application) -> Application {
    ctx.store
        .find_application(application.id)
        .await
        .unwrap()
        .unwrap()
}

// =============================================================================
// Submission
// =============================================================================

#[test_context(TestHarness)]
#[tokio::test]
async fn submitted_application_starts_at_version_zero(ctx: &TestHarness) {
    let world = World::seed(ctx, PetStatus::Available).await;

    let application = world.submit(ctx).await;

    assert_eq!(application.status, ApplicationStatus::Submitted);
    assert_eq!(application.version, 0);
    assert_eq!(application.shelter_id, world.shelter.id);
}

#[test_context(TestHarness)]
#[tokio::test]
async fn racing_duplicate_submissions_conflict(ctx: &TestHarness) {
    let world = World::seed(ctx, PetStatus::Available).await;
    let adopter = world.adopter();
    ctx.store.yield_between_calls();

    let (a, b) = tokio::join!(
        submit_application(
            &adopter,
            SubmitApplicationInput {
                pet_id: world.pet.id,
                message: None,
            },
            &ctx.deps
        ),
        submit_application(
            &adopter,
            SubmitApplicationInput {
                pet_id: world.pet.id,
                message: None,
            },
            &ctx.deps
        ),
    );

    let winners = [a.is_ok(), b.is_ok()].iter().filter(|ok| **ok).count();
    assert_eq!(winners, 1);
    let loser = if a.is_ok() { b } else { a };
    match loser {
        Err(err @ CoreError::Conflict(_)) => assert_eq!(err.status_code(), 409),
        other => panic!("expected conflict, got {:?}", other),
    }
}

#[test_context(TestHarness)]
#[tokio::test]
async fn adopter_message_is_stored_encrypted(ctx: &TestHarness) {
    let world = World::seed(ctx, PetStatus::Available).await;
    let application = world.submit(ctx).await;

    let stored = reload(ctx, &application).await;
    let sealed = stored.message.expect("message stored");
    assert!(!sealed.contains("fenced yard"));

    let as_adopter = read_application_message(&world.adopter(), application.id, &ctx.deps)
        .await
        .unwrap();
    let as_staff = read_application_message(&world.staff(), application.id, &ctx.deps)
        .await
        .unwrap();
    assert_eq!(as_adopter.as_deref(), Some("We have a fenced yard."));
    assert_eq!(as_staff, as_adopter);

    let stranger = create_user(ctx, "Sam", Role::Adopter).await;
    let denied = read_application_message(&Actor::adopter(stranger.id), application.id, &ctx.deps).await;
    assert!(matches!(denied, Err(CoreError::AuthorizationDenied(_))));
}

#[test_context(TestHarness)]
#[tokio::test]
async fn second_open_application_for_same_pet_conflicts(ctx: &TestHarness) {
    let world = World::seed(ctx, PetStatus::Available).await;
    world.submit(ctx).await;

    let result = submit_application(
        &world.adopter(),
        SubmitApplicationInput {
            pet_id: world.pet.id,
            message: None,
        },
        &ctx.deps,
    )
    .await;

    assert!(matches!(result, Err(CoreError::Conflict(_))));
}

#[test_context(TestHarness)]
#[tokio::test]
async fn adopter_may_reapply_after_rejection(ctx: &TestHarness) {
    let world = World::seed(ctx, PetStatus::Available).await;
    let first = world.submit(ctx).await;
    update_application_status(
        &world.staff(),
        first.id,
        review(ApplicationStatus::Rejected, 0),
        &ctx.deps,
    )
    .await
    .unwrap();

    let second = world.submit(ctx).await;

    assert_ne!(second.id, first.id);
    assert_eq!(second.version, 0);
}

#[test_context(TestHarness)]
#[tokio::test]
async fn pet_on_medical_hold_takes_no_applications(ctx: &TestHarness) {
    let world = World::seed(ctx, PetStatus::MedicalHold).await;

    let result = submit_application(
        &world.adopter(),
        SubmitApplicationInput {
            pet_id: world.pet.id,
            message: None,
        },
        &ctx.deps,
    )
    .await;

    assert!(matches!(result, Err(CoreError::Validation(_))));
}

// =============================================================================
// Version guard
// =============================================================================

#[test_context(TestHarness)]
#[tokio::test]
async fn matching_version_updates_and_increments(ctx: &TestHarness) {
    let world = World::seed(ctx, PetStatus::Available).await;
    let application = world.submit(ctx).await;
    ctx.store.put_application(Application {
        version: 3,
        ..application.clone()
    });

    let updated = update_application_status(
        &world.staff(),
        application.id,
        review(ApplicationStatus::Reviewing, 3),
        &ctx.deps,
    )
    .await
    .unwrap();

    assert_eq!(updated.status, ApplicationStatus::Reviewing);
    assert_eq!(updated.version, 4);
    assert_eq!(updated.reviewed_by, Some(world.owner.id));
    assert!(updated.reviewed_at.is_some());
}

#[test_context(TestHarness)]
#[tokio::test]
async fn stale_version_conflicts_and_returns_current_row(ctx: &TestHarness) {
    let world = World::seed(ctx, PetStatus::Available).await;
    let application = world.submit(ctx).await;
    update_application_status(
        &world.staff(),
        application.id,
        review(ApplicationStatus::Reviewing, 0),
        &ctx.deps,
    )
    .await
    .unwrap();

    let result = update_application_status(
        &world.staff(),
        application.id,
        review(ApplicationStatus::Interview, 0),
        &ctx.deps,
    )
    .await;

    match result {
        Err(CoreError::VersionConflict { expected, current }) => {
            assert_eq!(expected, 0);
            assert_eq!(current.version, 1);
            assert_eq!(current.status, ApplicationStatus::Reviewing);
        }
        other => panic!("expected version conflict, got {:?}", other),
    }

    let stored = reload(ctx, &application).await;
    assert_eq!(stored.status, ApplicationStatus::Reviewing);
    assert_eq!(stored.version, 1);
}

#[test_context(TestHarness)]
#[tokio::test]
async fn missing_version_is_rejected_before_any_write(ctx: &TestHarness) {
    let world = World::seed(ctx, PetStatus::Available).await;
    let application = world.submit(ctx).await;

    let result = update_application_status(
        &world.staff(),
        application.id,
        ReviewInput {
            status: ApplicationStatus::Reviewing,
            expected_version: None,
            notes: None,
        },
        &ctx.deps,
    )
    .await;

    assert!(matches!(result, Err(CoreError::MissingVersion)));
    assert_eq!(reload(ctx, &application).await.version, 0);
}

#[test_context(TestHarness)]
#[tokio::test]
async fn concurrent_reviews_with_same_version_have_one_winner(ctx: &TestHarness) {
    let world = World::seed(ctx, PetStatus::Available).await;
    let application = world.submit(ctx).await;
    let second_reviewer = add_staff(ctx, &world.shelter, "Reese").await;
    let first = world.staff();
    let second = Actor::staff(second_reviewer.id);
    ctx.store.yield_between_calls();

    let (a, b) = tokio::join!(
        update_application_status(
            &first,
            application.id,
            review(ApplicationStatus::Reviewing, 0),
            &ctx.deps
        ),
        update_application_status(
            &second,
            application.id,
            review(ApplicationStatus::Interview, 0),
            &ctx.deps
        ),
    );

    let winners = [a.is_ok(), b.is_ok()].iter().filter(|ok| **ok).count();
    assert_eq!(winners, 1);
    let loser = if a.is_ok() { b } else { a };
    assert!(matches!(loser, Err(CoreError::VersionConflict { .. })));
    assert_eq!(reload(ctx, &application).await.version, 1);
}

#[test_context(TestHarness)]
#[tokio::test]
async fn staff_of_another_shelter_cannot_review(ctx: &TestHarness) {
    let world = World::seed(ctx, PetStatus::Available).await;
    let application = world.submit(ctx).await;
    let outsider = create_user(ctx, "Quinn", Role::Staff).await;

    let result = update_application_status(
        &Actor::staff(outsider.id),
        application.id,
        review(ApplicationStatus::Reviewing, 0),
        &ctx.deps,
    )
    .await;

    assert!(matches!(result, Err(CoreError::AuthorizationDenied(_))));
}

// =============================================================================
// Terminal statuses and approval
// =============================================================================

#[test_context(TestHarness)]
#[tokio::test]
async fn decided_application_cannot_change(ctx: &TestHarness) {
    let world = World::seed(ctx, PetStatus::Available).await;
    let application = world.submit(ctx).await;
    update_application_status(
        &world.staff(),
        application.id,
        review(ApplicationStatus::Rejected, 0),
        &ctx.deps,
    )
    .await
    .unwrap();

    let result = update_application_status(
        &world.staff(),
        application.id,
        review(ApplicationStatus::Reviewing, 1),
        &ctx.deps,
    )
    .await;

    assert!(matches!(result, Err(CoreError::InvalidTransition { .. })));
}

#[test_context(TestHarness)]
#[tokio::test]
async fn approval_marks_pet_adopted(ctx: &TestHarness) {
    let world = World::seed(ctx, PetStatus::Available).await;
    let application = world.submit(ctx).await;

    let approved = update_application_status(
        &world.staff(),
        application.id,
        review(ApplicationStatus::Approved, 0),
        &ctx.deps,
    )
    .await
    .unwrap();

    assert_eq!(approved.status, ApplicationStatus::Approved);
    let pet = world.reload_pet(ctx).await;
    assert_eq!(pet.status, PetStatus::Adopted);
    assert!(pet.adoption_date.is_some());
}

#[test_context(TestHarness)]
#[tokio::test]
async fn approval_is_refused_when_pet_cannot_be_adopted(ctx: &TestHarness) {
    let world = World::seed(ctx, PetStatus::Available).await;
    let application = world.submit(ctx).await;
    update_pet_status(&world.staff(), world.pet.id, PetStatus::MedicalHold, &ctx.deps)
        .await
        .unwrap();

    let result = update_application_status(
        &world.staff(),
        application.id,
        review(ApplicationStatus::Approved, 0),
        &ctx.deps,
    )
    .await;

    assert!(matches!(result, Err(CoreError::InvalidTransition { .. })));
    let stored = reload(ctx, &application).await;
    assert_eq!(stored.status, ApplicationStatus::Submitted);
    assert_eq!(stored.version, 0);
}

#[test_context(TestHarness)]
#[tokio::test]
async fn concurrent_approvals_for_one_pet_adopt_it_once(ctx: &TestHarness) {
    let world = World::seed(ctx, PetStatus::Available).await;
    let first_application = world.submit(ctx).await;
    let other_adopter = create_user(ctx, "Sage", Role::Adopter).await;
    let second_application = submit_application(
        &Actor::adopter(other_adopter.id),
        SubmitApplicationInput {
            pet_id: world.pet.id,
            message: None,
        },
        &ctx.deps,
    )
    .await
    .unwrap();
    let second_reviewer = add_staff(ctx, &world.shelter, "Reese").await;
    let first = world.staff();
    let second = Actor::staff(second_reviewer.id);
    ctx.store.yield_between_calls();

    let (a, b) = tokio::join!(
        update_application_status(
            &first,
            first_application.id,
            review(ApplicationStatus::Approved, 0),
            &ctx.deps
        ),
        update_application_status(
            &second,
            second_application.id,
            review(ApplicationStatus::Approved, 0),
            &ctx.deps
        ),
    );

    let winners = [a.is_ok(), b.is_ok()].iter().filter(|ok| **ok).count();
    assert_eq!(winners, 1);
    let loser = if a.is_ok() { b } else { a };
    assert!(
        matches!(
            loser,
            Err(CoreError::Conflict(_)) | Err(CoreError::InvalidTransition { .. })
        ),
        "{:?}",
        loser
    );

    let approved = ctx
        .store
        .list_applications_for_pet(world.pet.id)
        .await
        .unwrap()
        .into_iter()
        .filter(|a| a.status == ApplicationStatus::Approved)
        .count();
    assert_eq!(approved, 1);
    assert_eq!(world.reload_pet(ctx).await.status, PetStatus::Adopted);
}

#[test_context(TestHarness)]
#[tokio::test]
async fn stale_approval_puts_the_pet_back(ctx: &TestHarness) {
    let world = World::seed(ctx, PetStatus::Available).await;
    let application = world.submit(ctx).await;
    update_application_status(
        &world.staff(),
        application.id,
        review(ApplicationStatus::Reviewing, 0),
        &ctx.deps,
    )
    .await
    .unwrap();

    let result = update_application_status(
        &world.staff(),
        application.id,
        review(ApplicationStatus::Approved, 0),
        &ctx.deps,
    )
    .await;

    assert!(matches!(result, Err(CoreError::VersionConflict { .. })));
    let pet = world.reload_pet(ctx).await;
    assert_eq!(pet.status, PetStatus::Available);
    assert!(pet.adoption_date.is_none());
    assert_eq!(reload(ctx, &application).await.status, ApplicationStatus::Reviewing);
}

// =============================================================================
// Withdrawal
// =============================================================================

#[test_context(TestHarness)]
#[tokio::test]
async fn adopter_withdraws_own_application(ctx: &TestHarness) {
    let world = World::seed(ctx, PetStatus::Available).await;
    let application = world.submit(ctx).await;

    let withdrawn = withdraw_application(&world.adopter(), application.id, Some(0), &ctx.deps)
        .await
        .unwrap();

    assert_eq!(withdrawn.status, ApplicationStatus::Rejected);
    assert_eq!(withdrawn.version, 1);
    assert_eq!(withdrawn.notes.as_deref(), Some("withdrawn by adopter"));
}

#[test_context(TestHarness)]
#[tokio::test]
async fn withdrawal_is_version_guarded(ctx: &TestHarness) {
    let world = World::seed(ctx, PetStatus::Available).await;
    let application = world.submit(ctx).await;
    update_application_status(
        &world.staff(),
        application.id,
        review(ApplicationStatus::Reviewing, 0),
        &ctx.deps,
    )
    .await
    .unwrap();

    let stale = withdraw_application(&world.adopter(), application.id, Some(0), &ctx.deps).await;
    let missing = withdraw_application(&world.adopter(), application.id, None, &ctx.deps).await;

    assert!(matches!(stale, Err(CoreError::VersionConflict { .. })));
    assert!(matches!(missing, Err(CoreError::MissingVersion)));
}

#[test_context(TestHarness)]
#[tokio::test]
async fn only_the_adopter_may_withdraw(ctx: &TestHarness) {
    let world = World::seed(ctx, PetStatus::Available).await;
    let application = world.submit(ctx).await;

    let result = withdraw_application(&world.staff(), application.id, Some(0), &ctx.deps).await;

    assert!(matches!(result, Err(CoreError::AuthorizationDenied(_))));
    assert_eq!(reload(ctx, &application).await.status, ApplicationStatus::Submitted);
}

// =============================================================================
// Side effects
// =============================================================================

#[test_context(TestHarness)]
#[tokio::test]
async fn status_change_is_audited_and_published_to_adopter(ctx: &TestHarness) {
    let world = World::seed(ctx, PetStatus::Available).await;
    let application = world.submit(ctx).await;

    update_application_status(
        &world.staff(),
        application.id,
        review(ApplicationStatus::Interview, 0),
        &ctx.deps,
    )
    .await
    .unwrap();
    ctx.settle().await;

    let actions: Vec<_> = ctx
        .store
        .all_audit_logs()
        .into_iter()
        .filter(|log| log.entity_id == application.id.into_uuid())
        .map(|log| log.action)
        .collect();
    assert_eq!(actions, vec!["application.submitted", "application.status_changed"]);

    let room = adoption_core::kernel::user_room(world.adopter.id);
    let events = ctx.mocks.realtime.published_to(&room);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event, "application.status_changed");
    assert_eq!(events[0].payload["status"], "interview");
    assert_eq!(events[0].payload["version"], 1);
}
