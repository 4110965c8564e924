use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use typed_builder::TypedBuilder;

use crate::common::{UserId, WebhookId};

/// Event names a subscription may list.
pub const KNOWN_EVENTS: &[&str] = &[
    "application.submitted",
    "application.status_changed",
    "application.withdrawn",
    "pet.status_changed",
    "transfer.requested",
    "transfer.approved",
    "transfer.rejected",
    "webhook.test",
];

pub fn is_known_event(event: &str) -> bool {
    KNOWN_EVENTS.contains(&event)
}

/// Outbound webhook subscription
///
/// Invariant: `failure_count >= threshold` implies `is_active == false`.
#[derive(FromRow, Debug, Clone, Serialize, Deserialize, TypedBuilder)]
#[builder(field_defaults(setter(into)))]
pub struct Webhook {
    #[builder(default = WebhookId::new())]
    pub id: WebhookId,
    pub user_id: UserId,
    pub url: String,
    pub events: Vec<String>,
    /// HMAC key; never serialized back to clients
    #[serde(skip_serializing)]
    pub secret: String,
    #[builder(default = true)]
    pub is_active: bool,
    #[builder(default = 0)]
    pub failure_count: i32,
    #[builder(default, setter(strip_option))]
    pub last_triggered_at: Option<DateTime<Utc>>,
    #[builder(default = Utc::now())]
    pub created_at: DateTime<Utc>,
    #[builder(default = Utc::now())]
    pub updated_at: DateTime<Utc>,
}

impl Webhook {
    pub fn subscribes_to(&self, event: &str) -> bool {
        self.events.iter().any(|e| e == event)
    }
}

// =============================================================================
// SQL Queries - ALL queries must be in models/
// =============================================================================

impl Webhook {
    pub async fn find_by_id(id: WebhookId, pool: &PgPool) -> Result<Option<Self>> {
        sqlx::query_as::<_, Self>("SELECT * FROM webhooks WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
            .map_err(Into::into)
    }

    pub async fn find_by_owner(user_id: UserId, pool: &PgPool) -> Result<Vec<Self>> {
        sqlx::query_as::<_, Self>("SELECT * FROM webhooks WHERE user_id = $1 ORDER BY created_at")
            .bind(user_id)
            .fetch_all(pool)
            .await
            .map_err(Into::into)
    }

    /// Active subscriptions for `event`, optionally limited to one owner.
    pub async fn find_active_for_event(
        event: &str,
        owner: Option<UserId>,
        pool: &PgPool,
    ) -> Result<Vec<Self>> {
        sqlx::query_as::<_, Self>(
            r#"
            SELECT * FROM webhooks
            WHERE is_active = true
              AND $1 = ANY(events)
              AND ($2::uuid IS NULL OR user_id = $2)
            ORDER BY created_at
            "#,
        )
        .bind(event)
        .bind(owner)
        .fetch_all(pool)
        .await
        .map_err(Into::into)
    }

    pub async fn insert(&self, pool: &PgPool) -> Result<Self> {
        sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO webhooks (
                id, user_id, url, events, secret, is_active,
                failure_count, last_triggered_at, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING *
            "#,
        )
        .bind(self.id)
        .bind(self.user_id)
        .bind(&self.url)
        .bind(&self.events)
        .bind(&self.secret)
        .bind(self.is_active)
        .bind(self.failure_count)
        .bind(self.last_triggered_at)
        .bind(self.created_at)
        .bind(self.updated_at)
        .fetch_one(pool)
        .await
        .map_err(Into::into)
    }

    pub async fn record_success(id: WebhookId, pool: &PgPool) -> Result<Option<Self>> {
        sqlx::query_as::<_, Self>(
            r#"
            UPDATE webhooks
            SET failure_count = 0, last_triggered_at = NOW(), updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(Into::into)
    }

    /// Increment the failure counter and trip the breaker in the same write.
    pub async fn record_failure(id: WebhookId, threshold: i32, pool: &PgPool) -> Result<Option<Self>> {
        sqlx::query_as::<_, Self>(
            r#"
            UPDATE webhooks
            SET failure_count = failure_count + 1,
                is_active = CASE WHEN failure_count + 1 >= $2 THEN false ELSE is_active END,
                last_triggered_at = NOW(),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(threshold)
        .fetch_optional(pool)
        .await
        .map_err(Into::into)
    }

    /// Enable or disable. Enabling starts from a clean failure count.
    pub async fn set_active(id: WebhookId, active: bool, pool: &PgPool) -> Result<Option<Self>> {
        sqlx::query_as::<_, Self>(
            r#"
            UPDATE webhooks
            SET is_active = $2,
                failure_count = CASE WHEN $2 THEN 0 ELSE failure_count END,
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(active)
        .fetch_optional(pool)
        .await
        .map_err(Into::into)
    }

    pub async fn set_secret(id: WebhookId, secret: &str, pool: &PgPool) -> Result<Option<Self>> {
        sqlx::query_as::<_, Self>(
            "UPDATE webhooks SET secret = $2, updated_at = NOW() WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(secret)
        .fetch_optional(pool)
        .await
        .map_err(Into::into)
    }
}
