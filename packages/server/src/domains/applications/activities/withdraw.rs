use serde_json::json;
use tracing::info;

use super::{guard::apply_if_version, notify};
use crate::common::{Actor, ApplicationId, AuthError, CoreError, CoreResult};
use crate::domains::applications::models::{Application, ApplicationStatus, ApplicationStatusUpdate};
use crate::domains::audit;
use crate::kernel::ServerDeps;

/// Adopter pulls their own undecided application. Ends as `rejected`.
pub async fn withdraw_application(
    actor: &Actor,
    id: ApplicationId,
    expected_version: Option<i32>,
    deps: &ServerDeps,
) -> CoreResult<Application> {
    if expected_version.is_none() {
        return Err(CoreError::MissingVersion);
    }

    let application = deps
        .store
        .find_application(id)
        .await?
        .ok_or_else(|| CoreError::not_found("application", id))?;

    if application.adopter_id != actor.user_id {
        return Err(AuthError::PermissionDenied("only the adopter may withdraw".into()).into());
    }

    if application.status.is_terminal() {
        return Err(CoreError::invalid_transition(
            "application",
            application.status,
            ApplicationStatus::Rejected,
        ));
    }

    let update = ApplicationStatusUpdate {
        status: ApplicationStatus::Rejected,
        reviewed_by: None,
        notes: Some("withdrawn by adopter".to_string()),
    };
    let updated = apply_if_version(deps.store.as_ref(), id, expected_version, &update).await?;

    info!(application_id = %id, adopter_id = %actor.user_id, "Application withdrawn");

    audit::record(
        deps,
        Some(actor.user_id),
        "application.withdrawn",
        "application",
        id,
        json!({ "from": application.status, "version": updated.version }),
    )
    .await;
    notify::application_event(deps, "application.withdrawn", &updated).await;

    Ok(updated)
}
