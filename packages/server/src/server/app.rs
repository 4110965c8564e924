//! Application setup: dependency wiring and the HTTP router.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::{routing::get, Router};
use sqlx::PgPool;
use tower::ServiceBuilder;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::common::FieldCipher;
use crate::config::Config;
use crate::domains::outbox::{SendEmailJob, SEND_EMAIL_JOB};
use crate::kernel::{
    BaseMailTransport, HttpMailTransport, JobRegistry, LogMailTransport, PostgresJobQueue,
    PostgresStore, ReqwestWebhookClient, ServerDeps, StreamHub, WorkflowSettings,
};
use crate::server::routes::health_handler;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub db_pool: PgPool,
    pub deps: ServerDeps,
}

/// Build the production dependency container over `pool`.
pub fn build_deps(config: &Config, pool: PgPool, queue: Arc<PostgresJobQueue>) -> Result<ServerDeps> {
    let cipher = FieldCipher::from_hex(&config.field_encryption_key)
        .context("FIELD_ENCRYPTION_KEY is invalid")?;

    let mailer: Arc<dyn BaseMailTransport> = match &config.mail_api_url {
        Some(url) => Arc::new(HttpMailTransport::new(
            url.clone(),
            config.mail_api_key.clone(),
            config.mail_from.clone(),
        )),
        None => {
            info!("MAIL_API_URL not set, emails will be logged");
            Arc::new(LogMailTransport)
        }
    };

    let webhook_client = ReqwestWebhookClient::new().context("Failed to build webhook client")?;

    Ok(ServerDeps::new(
        Arc::new(PostgresStore::new(pool)),
        queue,
        mailer,
        Arc::new(webhook_client),
        Arc::new(StreamHub::new()),
        Arc::new(cipher),
        WorkflowSettings::from_config(config),
    ))
}

/// Job handlers run by the worker.
pub fn build_registry(deps: &ServerDeps) -> JobRegistry {
    JobRegistry::new().with(SEND_EMAIL_JOB, Arc::new(SendEmailJob::new(deps.clone())))
}

pub fn build_app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(TimeoutLayer::new(Duration::from_secs(30))),
        )
        .with_state(state)
}
