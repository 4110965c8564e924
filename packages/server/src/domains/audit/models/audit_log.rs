use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::common::{AuditLogId, UserId};

/// Append-only record of a mutating action. Rows are never updated.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct AuditLog {
    pub id: AuditLogId,
    /// `None` for system actions (saga compensation, remediation CLI)
    pub actor_id: Option<UserId>,
    pub action: String,
    pub entity_type: String,
    pub entity_id: Uuid,
    pub details: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl AuditLog {
    pub fn new(
        actor_id: Option<UserId>,
        action: impl Into<String>,
        entity_type: impl Into<String>,
        entity_id: Uuid,
        details: serde_json::Value,
    ) -> Self {
        Self {
            id: AuditLogId::new(),
            actor_id,
            action: action.into(),
            entity_type: entity_type.into(),
            entity_id,
            details,
            created_at: Utc::now(),
        }
    }
}

// =============================================================================
// SQL Queries - ALL queries must be in models/
// =============================================================================

impl AuditLog {
    pub async fn insert(&self, pool: &PgPool) -> Result<Self> {
        sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO audit_logs (id, actor_id, action, entity_type, entity_id, details, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(self.id)
        .bind(self.actor_id)
        .bind(&self.action)
        .bind(&self.entity_type)
        .bind(self.entity_id)
        .bind(&self.details)
        .bind(self.created_at)
        .fetch_one(pool)
        .await
        .map_err(Into::into)
    }

    pub async fn find_for_entity(entity_type: &str, entity_id: Uuid, pool: &PgPool) -> Result<Vec<Self>> {
        sqlx::query_as::<_, Self>(
            r#"
            SELECT * FROM audit_logs
            WHERE entity_type = $1 AND entity_id = $2
            ORDER BY created_at, id
            "#,
        )
        .bind(entity_type)
        .bind(entity_id)
        .fetch_all(pool)
        .await
        .map_err(Into::into)
    }
}
