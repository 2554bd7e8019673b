use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use tracing::info;
use wzlobby_rust_core::models::NotificationTarget;

use crate::dispatcher::MessageSink;

/// Posts lobby messages to an HTTP endpoint that relays them to chat
#[derive(Debug, Clone)]
pub struct WebhookSink {
    http: Client,
    url: String,
}

#[derive(Debug, Serialize)]
struct DeliverRequest<'a> {
    network: &'a str,
    channel: &'a str,
    message: &'a str,
}

impl WebhookSink {
    pub fn new(url: String, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build webhook HTTP client")?;
        Ok(Self { http, url })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl MessageSink for WebhookSink {
    async fn deliver(&self, target: &NotificationTarget, message: &str) -> Result<()> {
        let body = DeliverRequest {
            network: &target.network,
            channel: &target.channel,
            message,
        };

        let resp = self
            .http
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .with_context(|| format!("Webhook request failed: {}", self.url))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            anyhow::bail!("Webhook non-2xx: {status} body={text}");
        }
        Ok(())
    }
}

/// Delivery for runs without a webhook: messages only go to the log
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

#[async_trait]
impl MessageSink for LogSink {
    async fn deliver(&self, target: &NotificationTarget, message: &str) -> Result<()> {
        info!(to = %target, "{}", message);
        Ok(())
    }
}
