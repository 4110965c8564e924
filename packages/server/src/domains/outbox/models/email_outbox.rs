//! Email outbox record.
//!
//! One row per logical email, keyed by a business dedup key. Delivery state
//! moves `pending -> sending -> sent`; a failed send parks the row in
//! `failed`, from where the next job attempt can claim it again.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use typed_builder::TypedBuilder;

use crate::common::EmailOutboxId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, Default)]
#[sqlx(type_name = "email_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum EmailStatus {
    #[default]
    Pending,
    Sending,
    Sent,
    Failed,
}

impl EmailStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EmailStatus::Pending => "pending",
            EmailStatus::Sending => "sending",
            EmailStatus::Sent => "sent",
            EmailStatus::Failed => "failed",
        }
    }

    /// A worker may take the row for delivery.
    pub fn is_claimable(&self) -> bool {
        matches!(self, EmailStatus::Pending | EmailStatus::Failed)
    }
}

impl std::fmt::Display for EmailStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(FromRow, Debug, Clone, Serialize, Deserialize, TypedBuilder)]
#[builder(field_defaults(setter(into)))]
pub struct EmailOutbox {
    #[builder(default = EmailOutboxId::new())]
    pub id: EmailOutboxId,
    pub dedup_key: String,
    /// Template id, see `EmailTemplate`
    pub email_type: String,
    pub to_address: String,
    #[builder(default = serde_json::Value::Null)]
    pub payload: serde_json::Value,
    #[builder(default)]
    pub status: EmailStatus,
    #[builder(default = 0)]
    pub attempts: i32,
    #[builder(default, setter(strip_option))]
    pub last_error: Option<String>,
    #[builder(default, setter(strip_option))]
    pub sent_at: Option<DateTime<Utc>>,
    #[builder(default = Utc::now())]
    pub created_at: DateTime<Utc>,
    #[builder(default = Utc::now())]
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// SQL Queries - ALL queries must be in models/
// =============================================================================

impl EmailOutbox {
    pub async fn find_by_id(id: EmailOutboxId, pool: &PgPool) -> Result<Option<Self>> {
        sqlx::query_as::<_, Self>("SELECT * FROM email_outbox WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
            .map_err(Into::into)
    }

    pub async fn find_by_dedup_key(dedup_key: &str, pool: &PgPool) -> Result<Option<Self>> {
        sqlx::query_as::<_, Self>("SELECT * FROM email_outbox WHERE dedup_key = $1")
            .bind(dedup_key)
            .fetch_optional(pool)
            .await
            .map_err(Into::into)
    }

    /// Insert, or return the existing row for the same dedup key untouched.
    ///
    /// The no-op `DO UPDATE` makes `RETURNING` yield the existing row.
    pub async fn upsert(&self, pool: &PgPool) -> Result<Self> {
        sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO email_outbox (
                id, dedup_key, email_type, to_address, payload, status,
                attempts, last_error, sent_at, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ON CONFLICT (dedup_key) DO UPDATE SET dedup_key = email_outbox.dedup_key
            RETURNING *
            "#,
        )
        .bind(self.id)
        .bind(&self.dedup_key)
        .bind(&self.email_type)
        .bind(&self.to_address)
        .bind(&self.payload)
        .bind(self.status)
        .bind(self.attempts)
        .bind(&self.last_error)
        .bind(self.sent_at)
        .bind(self.created_at)
        .bind(self.updated_at)
        .fetch_one(pool)
        .await
        .map_err(Into::into)
    }

    /// `pending|failed -> sending`. `None` means another worker holds it or it
    /// is already sent.
    pub async fn claim(id: EmailOutboxId, pool: &PgPool) -> Result<Option<Self>> {
        sqlx::query_as::<_, Self>(
            r#"
            UPDATE email_outbox
            SET status = 'sending', updated_at = NOW()
            WHERE id = $1 AND status IN ('pending', 'failed')
            RETURNING *
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(Into::into)
    }

    pub async fn mark_sent(id: EmailOutboxId, pool: &PgPool) -> Result<Option<Self>> {
        sqlx::query_as::<_, Self>(
            r#"
            UPDATE email_outbox
            SET status = 'sent',
                attempts = attempts + 1,
                sent_at = NOW(),
                last_error = NULL,
                updated_at = NOW()
            WHERE id = $1 AND status = 'sending'
            RETURNING *
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(Into::into)
    }

    pub async fn mark_failed(id: EmailOutboxId, error: &str, pool: &PgPool) -> Result<Option<Self>> {
        sqlx::query_as::<_, Self>(
            r#"
            UPDATE email_outbox
            SET status = 'failed',
                attempts = attempts + 1,
                last_error = $2,
                updated_at = NOW()
            WHERE id = $1 AND status <> 'sent'
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(error)
        .fetch_optional(pool)
        .await
        .map_err(Into::into)
    }

    pub async fn find_failed(limit: i64, pool: &PgPool) -> Result<Vec<Self>> {
        sqlx::query_as::<_, Self>(
            "SELECT * FROM email_outbox WHERE status = 'failed' ORDER BY updated_at LIMIT $1",
        )
        .bind(limit)
        .fetch_all(pool)
        .await
        .map_err(Into::into)
    }

    /// Rows stuck in `sending` since before `older_than` go to `failed`.
    pub async fn release_stale_sending(older_than: DateTime<Utc>, pool: &PgPool) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE email_outbox
            SET status = 'failed',
                last_error = 'released: stuck in sending',
                updated_at = NOW()
            WHERE status = 'sending' AND updated_at < $1
            "#,
        )
        .bind(older_than)
        .execute(pool)
        .await?;

        Ok(result.rows_affected())
    }
}
