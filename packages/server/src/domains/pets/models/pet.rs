use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use crate::common::{PetId, ShelterId};

/// Pet lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "pet_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PetStatus {
    Intake,
    MedicalHold,
    Available,
    Meet,
    Adopted,
    Returned,
    Fostered,
    Transferred,
    Deceased,
}

impl PetStatus {
    pub const ALL: [PetStatus; 9] = [
        PetStatus::Intake,
        PetStatus::MedicalHold,
        PetStatus::Available,
        PetStatus::Meet,
        PetStatus::Adopted,
        PetStatus::Returned,
        PetStatus::Fostered,
        PetStatus::Transferred,
        PetStatus::Deceased,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PetStatus::Intake => "intake",
            PetStatus::MedicalHold => "medical_hold",
            PetStatus::Available => "available",
            PetStatus::Meet => "meet",
            PetStatus::Adopted => "adopted",
            PetStatus::Returned => "returned",
            PetStatus::Fostered => "fostered",
            PetStatus::Transferred => "transferred",
            PetStatus::Deceased => "deceased",
        }
    }

    /// Statuses in which the pet takes new adoption applications.
    pub fn accepts_applications(&self) -> bool {
        matches!(
            self,
            PetStatus::Available | PetStatus::Meet | PetStatus::Fostered
        )
    }
}

impl std::fmt::Display for PetStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PetStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        PetStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| anyhow::anyhow!("Invalid pet status: {}", s))
    }
}

/// Pet - an animal in the care of exactly one shelter
///
/// `shelter_id` only changes through the transfer saga. Pets are never
/// deleted; `is_active = false` hides them.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Pet {
    pub id: PetId,
    pub shelter_id: ShelterId,
    pub name: String,
    pub species: String,
    pub status: PetStatus,
    pub adoption_date: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Pet {
    /// New pet arriving at a shelter.
    pub fn intake(shelter_id: ShelterId, name: impl Into<String>, species: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: PetId::new(),
            shelter_id,
            name: name.into(),
            species: species.into(),
            status: PetStatus::Intake,
            adoption_date: None,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_status(mut self, status: PetStatus) -> Self {
        self.status = status;
        self
    }
}

// =============================================================================
// SQL Queries - ALL queries must be in models/
// =============================================================================

impl Pet {
    pub async fn find_by_id(id: PetId, pool: &PgPool) -> Result<Option<Self>> {
        sqlx::query_as::<_, Self>("SELECT * FROM pets WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
            .map_err(Into::into)
    }

    pub async fn find_by_shelter(shelter_id: ShelterId, pool: &PgPool) -> Result<Vec<Self>> {
        sqlx::query_as::<_, Self>(
            "SELECT * FROM pets WHERE shelter_id = $1 AND is_active = true ORDER BY created_at",
        )
        .bind(shelter_id)
        .fetch_all(pool)
        .await
        .map_err(Into::into)
    }

    pub async fn insert(&self, pool: &PgPool) -> Result<Self> {
        sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO pets (id, shelter_id, name, species, status, adoption_date, is_active, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING *
            "#,
        )
        .bind(self.id)
        .bind(self.shelter_id)
        .bind(&self.name)
        .bind(&self.species)
        .bind(self.status)
        .bind(self.adoption_date)
        .bind(self.is_active)
        .bind(self.created_at)
        .bind(self.updated_at)
        .fetch_one(pool)
        .await
        .map_err(Into::into)
    }

    /// Move the pet to `to` only if it is still in `from`.
    ///
    /// Returns `None` when another writer changed the status first.
    pub async fn update_status_if(
        id: PetId,
        from: PetStatus,
        to: PetStatus,
        adoption_date: Option<DateTime<Utc>>,
        pool: &PgPool,
    ) -> Result<Option<Self>> {
        sqlx::query_as::<_, Self>(
            r#"
            UPDATE pets
            SET status = $3,
                adoption_date = COALESCE($4, adoption_date),
                updated_at = NOW()
            WHERE id = $1 AND status = $2
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(from)
        .bind(to)
        .bind(adoption_date)
        .fetch_optional(pool)
        .await
        .map_err(Into::into)
    }

    pub async fn revert_adoption(id: PetId, to: PetStatus, pool: &PgPool) -> Result<Option<Self>> {
        sqlx::query_as::<_, Self>(
            r#"
            UPDATE pets
            SET status = $2, adoption_date = NULL, updated_at = NOW()
            WHERE id = $1 AND status = 'adopted'
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(to)
        .fetch_optional(pool)
        .await
        .map_err(Into::into)
    }

    pub async fn set_shelter(id: PetId, shelter_id: ShelterId, pool: &PgPool) -> Result<Option<Self>> {
        sqlx::query_as::<_, Self>(
            "UPDATE pets SET shelter_id = $2, updated_at = NOW() WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(shelter_id)
        .fetch_optional(pool)
        .await
        .map_err(Into::into)
    }

    pub async fn deactivate(id: PetId, pool: &PgPool) -> Result<Option<Self>> {
        sqlx::query_as::<_, Self>(
            "UPDATE pets SET is_active = false, updated_at = NOW() WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_strings_round_trip() {
        for status in PetStatus::ALL {
            let parsed: PetStatus = status.as_str().parse().unwrap();
            assert_eq!(parsed, status);
        }
        assert!("sleeping".parse::<PetStatus>().is_err());
    }

    #[test]
    fn intake_starts_active_without_adoption_date() {
        let pet = Pet::intake(ShelterId::new(), "Biscuit", "dog");
        assert_eq!(pet.status, PetStatus::Intake);
        assert!(pet.is_active);
        assert!(pet.adoption_date.is_none());
    }

    #[test]
    fn only_adoptable_statuses_take_applications() {
        assert!(PetStatus::Available.accepts_applications());
        assert!(PetStatus::Fostered.accepts_applications());
        assert!(!PetStatus::MedicalHold.accepts_applications());
        assert!(!PetStatus::Adopted.accepts_applications());
    }
}
