use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use crate::common::{PetId, ShelterId, TransferRequestId, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "transfer_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TransferStatus {
    Pending,
    Approved,
    Rejected,
}

impl TransferStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferStatus::Pending => "pending",
            TransferStatus::Approved => "approved",
            TransferStatus::Rejected => "rejected",
        }
    }
}

impl std::fmt::Display for TransferStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request to move a pet between shelters. Decided exactly once.
///
/// A decider claims the request before acting on it, so only one approval or
/// rejection is ever in flight.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct TransferRequest {
    pub id: TransferRequestId,
    pub pet_id: PetId,
    pub from_shelter_id: ShelterId,
    pub to_shelter_id: ShelterId,
    pub requested_by: UserId,
    pub status: TransferStatus,
    pub claimed_by: Option<UserId>,
    pub claimed_at: Option<DateTime<Utc>>,
    pub decided_by: Option<UserId>,
    pub decision_note: Option<String>,
    pub decided_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl TransferRequest {
    pub fn pending(
        pet_id: PetId,
        from_shelter_id: ShelterId,
        to_shelter_id: ShelterId,
        requested_by: UserId,
    ) -> Self {
        Self {
            id: TransferRequestId::new(),
            pet_id,
            from_shelter_id,
            to_shelter_id,
            requested_by,
            status: TransferStatus::Pending,
            claimed_by: None,
            claimed_at: None,
            decided_by: None,
            decision_note: None,
            decided_at: None,
            created_at: Utc::now(),
        }
    }
}

// =============================================================================
// SQL Queries - ALL queries must be in models/
// =============================================================================

impl TransferRequest {
    pub async fn find_by_id(id: TransferRequestId, pool: &PgPool) -> Result<Option<Self>> {
        sqlx::query_as::<_, Self>("SELECT * FROM transfer_requests WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
            .map_err(Into::into)
    }

    pub async fn find_pending_for_pet(pet_id: PetId, pool: &PgPool) -> Result<Option<Self>> {
        sqlx::query_as::<_, Self>(
            "SELECT * FROM transfer_requests WHERE pet_id = $1 AND status = 'pending' LIMIT 1",
        )
        .bind(pet_id)
        .fetch_optional(pool)
        .await
        .map_err(Into::into)
    }

    pub async fn insert(&self, pool: &PgPool) -> Result<Self> {
        sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO transfer_requests (
                id, pet_id, from_shelter_id, to_shelter_id, requested_by,
                status, decided_by, decision_note, decided_at, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING *
            "#,
        )
        .bind(self.id)
        .bind(self.pet_id)
        .bind(self.from_shelter_id)
        .bind(self.to_shelter_id)
        .bind(self.requested_by)
        .bind(self.status)
        .bind(self.decided_by)
        .bind(&self.decision_note)
        .bind(self.decided_at)
        .bind(self.created_at)
        .fetch_one(pool)
        .await
        .map_err(Into::into)
    }

    pub async fn claim(
        id: TransferRequestId,
        by: UserId,
        stale_before: DateTime<Utc>,
        pool: &PgPool,
    ) -> Result<Option<Self>> {
        sqlx::query_as::<_, Self>(
            r#"
            UPDATE transfer_requests
            SET claimed_by = $2, claimed_at = NOW()
            WHERE id = $1
              AND status = 'pending'
              AND (claimed_by IS NULL OR claimed_at < $3)
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(by)
        .bind(stale_before)
        .fetch_optional(pool)
        .await
        .map_err(Into::into)
    }

    pub async fn release_claim(id: TransferRequestId, by: UserId, pool: &PgPool) -> Result<Option<Self>> {
        sqlx::query_as::<_, Self>(
            r#"
            UPDATE transfer_requests
            SET claimed_by = NULL, claimed_at = NULL
            WHERE id = $1 AND status = 'pending' AND claimed_by = $2
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(by)
        .fetch_optional(pool)
        .await
        .map_err(Into::into)
    }

    /// One-shot decision: only a `pending` request claimed by the decider is
    /// updated.
    pub async fn decide(
        id: TransferRequestId,
        status: TransferStatus,
        decided_by: UserId,
        note: Option<&str>,
        pool: &PgPool,
    ) -> Result<Option<Self>> {
        sqlx::query_as::<_, Self>(
            r#"
            UPDATE transfer_requests
            SET status = $2, decided_by = $3, decision_note = $4, decided_at = NOW()
            WHERE id = $1 AND status = 'pending' AND claimed_by = $3
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(status)
        .bind(decided_by)
        .bind(note)
        .fetch_optional(pool)
        .await
        .map_err(Into::into)
    }
}
