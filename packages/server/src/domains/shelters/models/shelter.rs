use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use crate::common::{ShelterId, UserId};

/// Shelter - a tenant of the platform, owner of its pets
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Shelter {
    pub id: ShelterId,
    pub name: String,
    pub owner_id: UserId,
    pub is_active: bool,
    pub capacity: i32,
    /// Never negative; maintained with atomic increments
    pub current_occupancy: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Shelter {
    pub fn new(name: impl Into<String>, owner_id: UserId, capacity: i32) -> Self {
        let now = Utc::now();
        Self {
            id: ShelterId::new(),
            name: name.into(),
            owner_id,
            is_active: true,
            capacity,
            current_occupancy: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_occupancy(mut self, occupancy: i32) -> Self {
        self.current_occupancy = occupancy;
        self
    }

    pub fn inactive(mut self) -> Self {
        self.is_active = false;
        self
    }
}

// =============================================================================
// SQL Queries - ALL queries must be in models/
// =============================================================================

impl Shelter {
    pub async fn find_by_id(id: ShelterId, pool: &PgPool) -> Result<Option<Self>> {
        sqlx::query_as::<_, Self>("SELECT * FROM shelters WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
            .map_err(Into::into)
    }

    pub async fn insert(&self, pool: &PgPool) -> Result<Self> {
        sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO shelters (id, name, owner_id, is_active, capacity, current_occupancy, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#,
        )
        .bind(self.id)
        .bind(&self.name)
        .bind(self.owner_id)
        .bind(self.is_active)
        .bind(self.capacity)
        .bind(self.current_occupancy)
        .bind(self.created_at)
        .bind(self.updated_at)
        .fetch_one(pool)
        .await
        .map_err(Into::into)
    }

    /// Atomic `current_occupancy += delta`, floored at zero.
    pub async fn adjust_occupancy(id: ShelterId, delta: i32, pool: &PgPool) -> Result<Option<Self>> {
        sqlx::query_as::<_, Self>(
            r#"
            UPDATE shelters
            SET current_occupancy = GREATEST(0, current_occupancy + $2),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(delta)
        .fetch_optional(pool)
        .await
        .map_err(Into::into)
    }

    /// Restore a snapshotted occupancy (saga compensation).
    pub async fn set_occupancy(id: ShelterId, value: i32, pool: &PgPool) -> Result<Option<Self>> {
        sqlx::query_as::<_, Self>(
            r#"
            UPDATE shelters
            SET current_occupancy = GREATEST(0, $2), updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(value)
        .fetch_optional(pool)
        .await
        .map_err(Into::into)
    }
}
