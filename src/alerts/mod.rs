//! Alert delivery
//!
//! Alerts are plain text messages posted to a Slack-style incoming webhook as
//! `{"text": "..."}`. Each message is one request; nothing is batched or retried.

use crate::monitor::error::{MonitorError, MonitorResult};
use crate::types::{AccountInfo, Snapshot};
use reqwest::StatusCode;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, info};

const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(60);

#[allow(async_fn_in_trait)]
pub trait AlertSink {
    async fn send(&self, text: &str) -> MonitorResult<()>;
}

#[derive(Debug, Serialize)]
struct WebhookPayload<'a> {
    text: &'a str,
}

/// Posts alerts to an incoming webhook URL
pub struct WebhookSink {
    http_client: reqwest::Client,
    webhook_url: String,
}

impl WebhookSink {
    pub fn new(webhook_url: impl Into<String>) -> MonitorResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(WEBHOOK_TIMEOUT)
            .build()?;

        Ok(Self {
            http_client,
            webhook_url: webhook_url.into(),
        })
    }
}

impl AlertSink for WebhookSink {
    async fn send(&self, text: &str) -> MonitorResult<()> {
        // .json() sets Content-Type: application/json
        let response = self
            .http_client
            .post(&self.webhook_url)
            .json(&WebhookPayload { text })
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            return Err(MonitorError::WebhookRejected {
                status: status.as_u16(),
                body,
            });
        }

        debug!("Delivered alert ({} bytes)", text.len());
        Ok(())
    }
}

/// One `` `address: balance` `` line per account, balances to two decimals
pub fn format_snapshot(snapshot: &Snapshot) -> String {
    let mut message = String::from("\n");
    for (address, balance) in snapshot {
        message.push_str(&format!("`{}: {:.2}`\n", address, balance));
    }
    message
}

/// Code block listing the address followed by its registry fields
pub fn format_account_info(address: &str, info: &AccountInfo) -> String {
    let mut message = format!("```address: {}", address);
    for (key, value) in &info.fields {
        message.push_str(&format!("\n{}: {}", key, value));
    }
    message.push_str("```");
    message
}

/// Announce every known balance in a single message
pub async fn publish_snapshot<S: AlertSink>(sink: &S, snapshot: &Snapshot) -> MonitorResult<()> {
    let message = format_snapshot(snapshot);
    info!("{}", message);
    sink.send(&message).await
}

pub async fn publish_account_info<S: AlertSink>(
    sink: &S,
    address: &str,
    info: &AccountInfo,
) -> MonitorResult<()> {
    let message = format_account_info(address, info);
    info!("{}", message);
    sink.send(&message).await
}
