use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use crate::common::{ShelterId, StaffApplicationId, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "staff_application_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum StaffApplicationStatus {
    Pending,
    Approved,
    Rejected,
}

/// Request by a user to work at a shelter. Approved rows grant staff access.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct StaffApplication {
    pub id: StaffApplicationId,
    pub user_id: UserId,
    pub shelter_id: ShelterId,
    pub status: StaffApplicationStatus,
    pub created_at: DateTime<Utc>,
}

impl StaffApplication {
    pub fn pending(user_id: UserId, shelter_id: ShelterId) -> Self {
        Self {
            id: StaffApplicationId::new(),
            user_id,
            shelter_id,
            status: StaffApplicationStatus::Pending,
            created_at: Utc::now(),
        }
    }

    pub fn approved(user_id: UserId, shelter_id: ShelterId) -> Self {
        Self {
            status: StaffApplicationStatus::Approved,
            ..Self::pending(user_id, shelter_id)
        }
    }
}

// =============================================================================
// SQL Queries - ALL queries must be in models/
// =============================================================================

impl StaffApplication {
    pub async fn insert(&self, pool: &PgPool) -> Result<Self> {
        sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO staff_applications (id, user_id, shelter_id, status, created_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(self.id)
        .bind(self.user_id)
        .bind(self.shelter_id)
        .bind(self.status)
        .bind(self.created_at)
        .fetch_one(pool)
        .await
        .map_err(Into::into)
    }

    pub async fn is_approved_member(user_id: UserId, shelter_id: ShelterId, pool: &PgPool) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM staff_applications
                WHERE user_id = $1 AND shelter_id = $2 AND status = 'approved'
            )
            "#,
        )
        .bind(user_id)
        .bind(shelter_id)
        .fetch_one(pool)
        .await?;

        Ok(exists)
    }
}
