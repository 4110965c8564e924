//! Operator CLI for delivery remediation
//!
//! Re-schedules failed emails, releases rows abandoned in `sending` by a
//! crashed worker, and re-enables webhooks the circuit breaker turned off.
//! Prints one JSON object per invocation.

use std::sync::Arc;

use adoption_core::common::WebhookId;
use adoption_core::config::Config;
use adoption_core::domains::{audit, outbox};
use adoption_core::kernel::PostgresJobQueue;
use adoption_core::server::build_deps;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::json;
use sqlx::PgPool;

#[derive(Parser)]
#[command(name = "outbox_cli")]
#[command(about = "Email outbox and webhook remediation")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Schedule delivery again for failed outbox rows
    RequeueFailed {
        #[arg(long, default_value_t = 100)]
        limit: i64,
    },

    /// Move rows stuck in `sending` back to `failed`
    ReleaseStale {
        #[arg(long, default_value_t = 600)]
        older_than_secs: i64,
    },

    /// Re-enable a webhook and reset its failure count
    EnableWebhook { id: WebhookId },
}

#[derive(Serialize)]
struct Response {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    count: Option<u64>,
}

fn output(resp: Response) -> Result<()> {
    println!("{}", serde_json::to_string(&resp)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn,adoption_core=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = Config::from_env()?;
    let pool = PgPool::connect(&config.database_url)
        .await
        .context("Failed to connect to database")?;
    let queue = Arc::new(PostgresJobQueue::new(pool.clone()));
    let deps = build_deps(&config, pool, queue)?;

    let response = match cli.command {
        Commands::RequeueFailed { limit } => {
            let scheduled = outbox::requeue_failed(&deps, limit).await?;
            Response {
                success: true,
                message: Some(format!("scheduled {} failed emails", scheduled)),
                count: Some(scheduled as u64),
            }
        }
        Commands::ReleaseStale { older_than_secs } => {
            let released =
                outbox::release_stale_sending(&deps, chrono::Duration::seconds(older_than_secs))
                    .await?;
            Response {
                success: true,
                message: Some(format!("released {} stale rows", released)),
                count: Some(released),
            }
        }
        Commands::EnableWebhook { id } => match deps.store.set_webhook_active(id, true).await? {
            Some(webhook) => {
                audit::record(&deps, None, "webhook.enabled", "webhook", webhook.id, json!({ "source": "outbox_cli" }))
                    .await;
                Response {
                    success: true,
                    message: Some(format!("webhook {} enabled", webhook.id)),
                    count: None,
                }
            }
            None => Response {
                success: false,
                message: Some(format!("webhook {} not found", id)),
                count: None,
            },
        },
    };

    deps.drain_background().await;
    output(response)
}
