//! Optimistic concurrency guard for application status writes.

use tracing::debug;

use crate::common::{ApplicationId, CoreError, CoreResult};
use crate::domains::applications::models::{Application, ApplicationStatusUpdate};
use crate::kernel::store::EntityStore;

/// Apply `update` only if the stored version still equals `expected_version`.
///
/// The write is a single compare-and-swap on `(id, version)` that also bumps
/// the version. On a miss the current row is loaded and handed back inside
/// `VersionConflict` so the caller can retry against fresh state.
pub async fn apply_if_version(
    store: &dyn EntityStore,
    id: ApplicationId,
    expected_version: Option<i32>,
    update: &ApplicationStatusUpdate,
) -> CoreResult<Application> {
    let expected = expected_version.ok_or(CoreError::MissingVersion)?;

    if let Some(updated) = store
        .update_application_if_version(id, expected, update)
        .await?
    {
        return Ok(updated);
    }

    let current = store
        .find_application(id)
        .await?
        .ok_or_else(|| CoreError::not_found("application", id))?;

    debug!(
        application_id = %id,
        expected,
        current = current.version,
        "Application version conflict"
    );
    Err(CoreError::VersionConflict {
        expected,
        current: Box::new(current),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::{PetId, ShelterId, UserId};
    use crate::domains::applications::models::ApplicationStatus;
    use crate::kernel::store::ApplicationStore;
    use crate::kernel::MemoryStore;

    fn to(status: ApplicationStatus) -> ApplicationStatusUpdate {
        ApplicationStatusUpdate {
            status,
            reviewed_by: Some(UserId::new()),
            notes: None,
        }
    }

    async fn seeded(version: i32) -> (MemoryStore, Application) {
        let store = MemoryStore::new();
        let mut app = Application::submitted(PetId::new(), UserId::new(), ShelterId::new(), None);
        app.version = version;
        let app = store.insert_application(&app).await.unwrap();
        (store, app)
    }

    #[tokio::test]
    async fn matching_version_applies_and_bumps() {
        let (store, app) = seeded(3).await;

        let updated = apply_if_version(&store, app.id, Some(3), &to(ApplicationStatus::Reviewing))
            .await
            .unwrap();

        assert_eq!(updated.version, 4);
        assert_eq!(updated.status, ApplicationStatus::Reviewing);
        assert!(updated.reviewed_at.is_some());
    }

    #[tokio::test]
    async fn stale_version_returns_current_row() {
        let (store, app) = seeded(3).await;
        apply_if_version(&store, app.id, Some(3), &to(ApplicationStatus::Reviewing))
            .await
            .unwrap();

        let err = apply_if_version(&store, app.id, Some(3), &to(ApplicationStatus::Interview))
            .await
            .unwrap_err();

        match err {
            CoreError::VersionConflict { expected, current } => {
                assert_eq!(expected, 3);
                assert_eq!(current.version, 4);
                assert_eq!(current.status, ApplicationStatus::Reviewing);
            }
            other => panic!("expected version conflict, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn missing_version_is_rejected_before_any_write() {
        let (store, app) = seeded(0).await;

        let err = apply_if_version(&store, app.id, None, &to(ApplicationStatus::Reviewing))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::MissingVersion));

        let unchanged = store.find_application(app.id).await.unwrap().unwrap();
        assert_eq!(unchanged.version, 0);
    }

    #[tokio::test]
    async fn unknown_application_is_not_found() {
        let store = MemoryStore::new();
        let err = apply_if_version(&store, ApplicationId::new(), Some(0), &to(ApplicationStatus::Reviewing))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::NotFound { entity: "application", .. }));
    }
}
