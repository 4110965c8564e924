//! Append an audit entry for a mutation that already happened.

use tracing::warn;
use uuid::Uuid;

use crate::common::UserId;
use crate::domains::audit::models::AuditLog;
use crate::kernel::ServerDeps;

/// Record a mutating action.
///
/// The mutation is already committed when this runs, so a failed insert is
/// logged and swallowed rather than reported to the caller.
pub async fn record(
    deps: &ServerDeps,
    actor_id: Option<UserId>,
    action: &str,
    entity_type: &str,
    entity_id: impl Into<Uuid>,
    details: serde_json::Value,
) {
    let entry = AuditLog::new(actor_id, action, entity_type, entity_id.into(), details);

    if let Err(e) = deps.store.insert_audit_log(&entry).await {
        warn!(
            action,
            entity_type,
            entity_id = %entry.entity_id,
            error = %e,
            "Failed to write audit log"
        );
    }
}
