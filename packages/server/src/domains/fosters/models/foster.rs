use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use crate::common::{FosterId, ShelterId, UserId};

/// A volunteer who takes pets home for a shelter.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Foster {
    pub id: FosterId,
    pub user_id: UserId,
    pub shelter_id: ShelterId,
    /// Encrypted
    pub phone: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl Foster {
    pub fn new(user_id: UserId, shelter_id: ShelterId, encrypted_phone: Option<String>) -> Self {
        Self {
            id: FosterId::new(),
            user_id,
            shelter_id,
            phone: encrypted_phone,
            is_active: true,
            created_at: Utc::now(),
        }
    }
}

// =============================================================================
// SQL Queries - ALL queries must be in models/
// =============================================================================

impl Foster {
    pub async fn find_by_id(id: FosterId, pool: &PgPool) -> Result<Option<Self>> {
        sqlx::query_as::<_, Self>("SELECT * FROM fosters WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
            .map_err(Into::into)
    }

    pub async fn insert(&self, pool: &PgPool) -> Result<Self> {
        sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO fosters (id, user_id, shelter_id, phone, is_active, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(self.id)
        .bind(self.user_id)
        .bind(self.shelter_id)
        .bind(&self.phone)
        .bind(self.is_active)
        .bind(self.created_at)
        .fetch_one(pool)
        .await
        .map_err(Into::into)
    }
}
