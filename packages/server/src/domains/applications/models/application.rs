use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use crate::common::{ApplicationId, PetId, ShelterId, UserId};

/// Application review status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "application_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ApplicationStatus {
    Submitted,
    Reviewing,
    Interview,
    Approved,
    Rejected,
}

impl ApplicationStatus {
    pub const ALL: [ApplicationStatus; 5] = [
        ApplicationStatus::Submitted,
        ApplicationStatus::Reviewing,
        ApplicationStatus::Interview,
        ApplicationStatus::Approved,
        ApplicationStatus::Rejected,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ApplicationStatus::Submitted => "submitted",
            ApplicationStatus::Reviewing => "reviewing",
            ApplicationStatus::Interview => "interview",
            ApplicationStatus::Approved => "approved",
            ApplicationStatus::Rejected => "rejected",
        }
    }

    /// No status update is accepted once an application is decided.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ApplicationStatus::Approved | ApplicationStatus::Rejected)
    }

    /// Counts against the one-application-per-(pet, adopter) rule.
    pub fn is_open(&self) -> bool {
        !matches!(self, ApplicationStatus::Rejected)
    }
}

impl std::fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ApplicationStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        ApplicationStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| anyhow::anyhow!("Invalid application status: {}", s))
    }
}

/// Adoption application
///
/// `version` is the optimistic lock: every status change bumps it, and a
/// status update only lands when the caller names the current version.
/// `shelter_id` mirrors the pet's shelter and is migrated by transfers.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Application {
    pub id: ApplicationId,
    pub pet_id: PetId,
    pub adopter_id: UserId,
    pub shelter_id: ShelterId,
    pub status: ApplicationStatus,
    pub version: i32,
    pub reviewed_by: Option<UserId>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    /// Adopter's note to the shelter, encrypted at rest
    pub message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Application {
    pub fn submitted(
        pet_id: PetId,
        adopter_id: UserId,
        shelter_id: ShelterId,
        encrypted_message: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: ApplicationId::new(),
            pet_id,
            adopter_id,
            shelter_id,
            status: ApplicationStatus::Submitted,
            version: 0,
            reviewed_by: None,
            reviewed_at: None,
            notes: None,
            message: encrypted_message,
            created_at: now,
            updated_at: now,
        }
    }
}

/// The mutation applied by a guarded status update.
#[derive(Debug, Clone)]
pub struct ApplicationStatusUpdate {
    pub status: ApplicationStatus,
    pub reviewed_by: Option<UserId>,
    /// `None` keeps the existing notes
    pub notes: Option<String>,
}

// =============================================================================
// SQL Queries - ALL queries must be in models/
// =============================================================================

impl Application {
    pub async fn find_by_id(id: ApplicationId, pool: &PgPool) -> Result<Option<Self>> {
        sqlx::query_as::<_, Self>("SELECT * FROM applications WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
            .map_err(Into::into)
    }

    pub async fn find_by_pet(pet_id: PetId, pool: &PgPool) -> Result<Vec<Self>> {
        sqlx::query_as::<_, Self>(
            "SELECT * FROM applications WHERE pet_id = $1 ORDER BY created_at",
        )
        .bind(pet_id)
        .fetch_all(pool)
        .await
        .map_err(Into::into)
    }

    /// The adopter's application for this pet that is not rejected, if any.
    pub async fn find_open(pet_id: PetId, adopter_id: UserId, pool: &PgPool) -> Result<Option<Self>> {
        sqlx::query_as::<_, Self>(
            r#"
            SELECT * FROM applications
            WHERE pet_id = $1 AND adopter_id = $2 AND status <> 'rejected'
            LIMIT 1
            "#,
        )
        .bind(pet_id)
        .bind(adopter_id)
        .fetch_optional(pool)
        .await
        .map_err(Into::into)
    }

    /// Insert. The partial unique index on open applications backs up the
    /// pre-check done by the submit activity.
    pub async fn insert(&self, pool: &PgPool) -> Result<Self> {
        sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO applications (
                id, pet_id, adopter_id, shelter_id, status, version,
                reviewed_by, reviewed_at, notes, message, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING *
            "#,
        )
        .bind(self.id)
        .bind(self.pet_id)
        .bind(self.adopter_id)
        .bind(self.shelter_id)
        .bind(self.status)
        .bind(self.version)
        .bind(self.reviewed_by)
        .bind(self.reviewed_at)
        .bind(&self.notes)
        .bind(&self.message)
        .bind(self.created_at)
        .bind(self.updated_at)
        .fetch_one(pool)
        .await
        .map_err(Into::into)
    }

    /// Compare-and-swap on `(id, version)`.
    ///
    /// One statement: the row is only touched when the stored version still
    /// equals `expected_version`, and the version is bumped in the same write.
    pub async fn update_if_version(
        id: ApplicationId,
        expected_version: i32,
        update: &ApplicationStatusUpdate,
        pool: &PgPool,
    ) -> Result<Option<Self>> {
        sqlx::query_as::<_, Self>(
            r#"
            UPDATE applications
            SET status = $3,
                reviewed_by = COALESCE($4, reviewed_by),
                reviewed_at = NOW(),
                notes = COALESCE($5, notes),
                version = version + 1,
                updated_at = NOW()
            WHERE id = $1 AND version = $2
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(expected_version)
        .bind(update.status)
        .bind(update.reviewed_by)
        .bind(&update.notes)
        .fetch_optional(pool)
        .await
        .map_err(Into::into)
    }

    /// Point every application for the pet at `shelter_id` (transfer saga).
    pub async fn reassign_shelter_for_pet(
        pet_id: PetId,
        shelter_id: ShelterId,
        pool: &PgPool,
    ) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE applications SET shelter_id = $2, updated_at = NOW() WHERE pet_id = $1",
        )
        .bind(pet_id)
        .bind(shelter_id)
        .execute(pool)
        .await?;

        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decided_statuses_are_terminal() {
        assert!(ApplicationStatus::Approved.is_terminal());
        assert!(ApplicationStatus::Rejected.is_terminal());
        assert!(!ApplicationStatus::Submitted.is_terminal());
        assert!(!ApplicationStatus::Interview.is_terminal());
    }

    #[test]
    fn approved_still_counts_as_open() {
        assert!(ApplicationStatus::Approved.is_open());
        assert!(!ApplicationStatus::Rejected.is_open());
    }

    #[test]
    fn new_application_starts_at_version_zero() {
        let app = Application::submitted(PetId::new(), UserId::new(), ShelterId::new(), None);
        assert_eq!(app.version, 0);
        assert_eq!(app.status, ApplicationStatus::Submitted);
        assert!(app.reviewed_by.is_none());
    }
}
