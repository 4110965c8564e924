use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use super::process::process_by_id;
use crate::common::EmailOutboxId;
use crate::kernel::{JobHandler, ServerDeps};

pub const SEND_EMAIL_JOB: &str = "email.send";

#[derive(Debug, Deserialize)]
struct SendEmailArgs {
    outbox_id: EmailOutboxId,
}

/// Job handler for `email.send`.
pub struct SendEmailJob {
    deps: ServerDeps,
}

impl SendEmailJob {
    pub fn new(deps: ServerDeps) -> Self {
        Self { deps }
    }
}

#[async_trait]
impl JobHandler for SendEmailJob {
    async fn handle(&self, args: serde_json::Value) -> Result<()> {
        let args: SendEmailArgs =
            serde_json::from_value(args).context("invalid email.send arguments")?;

        let outcome = process_by_id(&self.deps, args.outbox_id).await?;
        debug!(outbox_id = %args.outbox_id, outcome = outcome.as_str(), "email.send handled");
        Ok(())
    }
}
