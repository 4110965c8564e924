use anyhow::Result;
use chrono::{DateTime, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use crate::common::{PetId, UserId, VetApprovalId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "vet_approval_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum VetApprovalStatus {
    Pending,
    Approved,
    Rejected,
}

impl VetApprovalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VetApprovalStatus::Pending => "pending",
            VetApprovalStatus::Approved => "approved",
            VetApprovalStatus::Rejected => "rejected",
        }
    }
}

impl std::fmt::Display for VetApprovalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Veterinarian sign-off for releasing a pet from medical hold.
///
/// The vet acts through an emailed link carrying `token`; there is no login.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct VetApproval {
    pub id: VetApprovalId,
    pub pet_id: PetId,
    pub token: String,
    pub vet_email: String,
    pub requested_by: UserId,
    pub status: VetApprovalStatus,
    pub note: Option<String>,
    pub decided_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl VetApproval {
    pub fn pending(pet_id: PetId, vet_email: impl Into<String>, requested_by: UserId) -> Self {
        Self {
            id: VetApprovalId::new(),
            pet_id,
            token: generate_token(),
            vet_email: vet_email.into(),
            requested_by,
            status: VetApprovalStatus::Pending,
            note: None,
            decided_at: None,
            created_at: Utc::now(),
        }
    }
}

/// 32 random bytes, hex encoded.
pub fn generate_token() -> String {
    let mut bytes = [0u8; 32];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

// =============================================================================
// SQL Queries - ALL queries must be in models/
// =============================================================================

impl VetApproval {
    pub async fn find_by_token(token: &str, pool: &PgPool) -> Result<Option<Self>> {
        sqlx::query_as::<_, Self>("SELECT * FROM vet_approvals WHERE token = $1")
            .bind(token)
            .fetch_optional(pool)
            .await
            .map_err(Into::into)
    }

    pub async fn find_pending_for_pet(pet_id: PetId, pool: &PgPool) -> Result<Option<Self>> {
        sqlx::query_as::<_, Self>(
            "SELECT * FROM vet_approvals WHERE pet_id = $1 AND status = 'pending' LIMIT 1",
        )
        .bind(pet_id)
        .fetch_optional(pool)
        .await
        .map_err(Into::into)
    }

    pub async fn has_approved(pet_id: PetId, pool: &PgPool) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM vet_approvals WHERE pet_id = $1 AND status = 'approved')",
        )
        .bind(pet_id)
        .fetch_one(pool)
        .await?;

        Ok(exists)
    }

    pub async fn insert(&self, pool: &PgPool) -> Result<Self> {
        sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO vet_approvals (id, pet_id, token, vet_email, requested_by, status, note, decided_at, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING *
            "#,
        )
        .bind(self.id)
        .bind(self.pet_id)
        .bind(&self.token)
        .bind(&self.vet_email)
        .bind(self.requested_by)
        .bind(self.status)
        .bind(&self.note)
        .bind(self.decided_at)
        .bind(self.created_at)
        .fetch_one(pool)
        .await
        .map_err(Into::into)
    }

    /// Claim the pending row for `token`. `None` if it is unknown or decided.
    pub async fn decide(
        token: &str,
        status: VetApprovalStatus,
        note: Option<&str>,
        pool: &PgPool,
    ) -> Result<Option<Self>> {
        sqlx::query_as::<_, Self>(
            r#"
            UPDATE vet_approvals
            SET status = $2, note = $3, decided_at = NOW()
            WHERE token = $1 AND status = 'pending'
            RETURNING *
            "#,
        )
        .bind(token)
        .bind(status)
        .bind(note)
        .fetch_optional(pool)
        .await
        .map_err(Into::into)
    }
}
