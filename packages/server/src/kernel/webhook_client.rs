use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;

use super::{BaseWebhookClient, WebhookResponse};

/// reqwest-backed client for outbound webhook POSTs.
pub struct ReqwestWebhookClient {
    client: reqwest::Client,
}

impl ReqwestWebhookClient {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("shelterlink-webhooks/", env!("CARGO_PKG_VERSION")))
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .context("failed to build webhook HTTP client")?;
        Ok(Self { client })
    }
}

#[async_trait]
impl BaseWebhookClient for ReqwestWebhookClient {
    async fn post(
        &self,
        url: &str,
        body: Vec<u8>,
        headers: Vec<(String, String)>,
        timeout: Duration,
    ) -> Result<WebhookResponse> {
        let mut request = self
            .client
            .post(url)
            .timeout(timeout)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body);
        for (name, value) in headers {
            request = request.header(name, value);
        }

        let response = request
            .send()
            .await
            .with_context(|| format!("webhook POST to {} failed", url))?;

        Ok(WebhookResponse {
            status: response.status().as_u16(),
        })
    }
}
