//! Mail transports.
//!
//! `HttpMailTransport` posts to a transactional mail API; `LogMailTransport`
//! writes the message to the log for local development.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Serialize;
use tracing::info;

use super::BaseMailTransport;

#[derive(Serialize)]
struct MailRequest<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    html: &'a str,
}

pub struct HttpMailTransport {
    client: reqwest::Client,
    api_url: String,
    api_key: Option<String>,
    from: String,
}

impl HttpMailTransport {
    pub fn new(api_url: impl Into<String>, api_key: Option<String>, from: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url: api_url.into(),
            api_key,
            from: from.into(),
        }
    }
}

#[async_trait]
impl BaseMailTransport for HttpMailTransport {
    async fn send(&self, to: &str, subject: &str, html: &str) -> Result<()> {
        let mut request = self.client.post(&self.api_url).json(&MailRequest {
            from: &self.from,
            to,
            subject,
            html,
        });
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.context("mail API request failed")?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("mail API returned {}: {}", status, body);
        }
        Ok(())
    }
}

/// Development transport: logs instead of sending.
#[derive(Default)]
pub struct LogMailTransport;

#[async_trait]
impl BaseMailTransport for LogMailTransport {
    async fn send(&self, to: &str, subject: &str, html: &str) -> Result<()> {
        info!(to = %to, subject = %subject, body_len = html.len(), "email (log transport)");
        Ok(())
    }
}
