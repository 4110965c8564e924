use anyhow::{Context, Result};
use dotenvy::dotenv;
use std::env;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    /// Hex-encoded 32 byte key for field-level encryption (phones, messages)
    pub field_encryption_key: String,
    /// Mail API endpoint. When absent, emails are written to the log instead.
    pub mail_api_url: Option<String>,
    pub mail_api_key: Option<String>,
    pub mail_from: String,
    pub webhook_timeout_secs: u64,
    pub webhook_failure_threshold: i32,
    pub job_max_attempts: i32,
    pub job_backoff_initial_ms: i64,
    pub worker_poll_interval_ms: u64,
    /// Base URL for links in outgoing emails
    pub public_base_url: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        Ok(Self {
            database_url: env::var("DATABASE_URL").context("DATABASE_URL must be set")?,
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .context("PORT must be a valid number")?,
            field_encryption_key: env::var("FIELD_ENCRYPTION_KEY")
                .context("FIELD_ENCRYPTION_KEY must be set")?,
            mail_api_url: env::var("MAIL_API_URL").ok(),
            mail_api_key: env::var("MAIL_API_KEY").ok(),
            mail_from: env::var("MAIL_FROM")
                .unwrap_or_else(|_| "adoptions@shelterlink.local".to_string()),
            webhook_timeout_secs: parse_or("WEBHOOK_TIMEOUT_SECS", 10)?,
            webhook_failure_threshold: parse_or("WEBHOOK_FAILURE_THRESHOLD", 10)?,
            job_max_attempts: parse_or("JOB_MAX_ATTEMPTS", 5)?,
            job_backoff_initial_ms: parse_or("JOB_BACKOFF_INITIAL_MS", 1500)?,
            worker_poll_interval_ms: parse_or("WORKER_POLL_INTERVAL_MS", 1000)?,
            public_base_url: env::var("PUBLIC_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:8080".to_string()),
        })
    }
}

fn parse_or<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse()
            .with_context(|| format!("{} must be a valid number", key)),
        Err(_) => Ok(default),
    }
}
