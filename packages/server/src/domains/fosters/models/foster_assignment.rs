use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use crate::common::{FosterAssignmentId, FosterId, PetId, ShelterId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "foster_assignment_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum FosterAssignmentStatus {
    Active,
    Ended,
}

/// A pet placed with a foster. `shelter_id` follows the pet across transfers.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct FosterAssignment {
    pub id: FosterAssignmentId,
    pub foster_id: FosterId,
    pub pet_id: PetId,
    pub shelter_id: ShelterId,
    pub status: FosterAssignmentStatus,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl FosterAssignment {
    pub fn start(foster_id: FosterId, pet_id: PetId, shelter_id: ShelterId) -> Self {
        Self {
            id: FosterAssignmentId::new(),
            foster_id,
            pet_id,
            shelter_id,
            status: FosterAssignmentStatus::Active,
            started_at: Utc::now(),
            ended_at: None,
        }
    }
}

// =============================================================================
// SQL Queries - ALL queries must be in models/
// =============================================================================

impl FosterAssignment {
    pub async fn find_by_id(id: FosterAssignmentId, pool: &PgPool) -> Result<Option<Self>> {
        sqlx::query_as::<_, Self>("SELECT * FROM foster_assignments WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
            .map_err(Into::into)
    }

    pub async fn find_by_pet(pet_id: PetId, pool: &PgPool) -> Result<Vec<Self>> {
        sqlx::query_as::<_, Self>(
            "SELECT * FROM foster_assignments WHERE pet_id = $1 ORDER BY started_at",
        )
        .bind(pet_id)
        .fetch_all(pool)
        .await
        .map_err(Into::into)
    }

    pub async fn insert(&self, pool: &PgPool) -> Result<Self> {
        sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO foster_assignments (id, foster_id, pet_id, shelter_id, status, started_at, ended_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(self.id)
        .bind(self.foster_id)
        .bind(self.pet_id)
        .bind(self.shelter_id)
        .bind(self.status)
        .bind(self.started_at)
        .bind(self.ended_at)
        .fetch_one(pool)
        .await
        .map_err(Into::into)
    }

    /// End an active assignment. `None` if it was already ended.
    pub async fn end(id: FosterAssignmentId, pool: &PgPool) -> Result<Option<Self>> {
        sqlx::query_as::<_, Self>(
            r#"
            UPDATE foster_assignments
            SET status = 'ended', ended_at = NOW()
            WHERE id = $1 AND status = 'active'
            RETURNING *
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(Into::into)
    }

    pub async fn reassign_shelter_for_pet(
        pet_id: PetId,
        shelter_id: ShelterId,
        pool: &PgPool,
    ) -> Result<u64> {
        let result = sqlx::query("UPDATE foster_assignments SET shelter_id = $2 WHERE pet_id = $1")
            .bind(pet_id)
            .bind(shelter_id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected())
    }
}
