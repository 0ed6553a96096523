use std::time::Duration;

use anyhow::{Context, Result};
use tracing::info;

use crate::error::PipelineError;
use crate::render::chunks::ChunkedMessage;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Incoming-webhook delivery.
pub struct Notifier {
    http: reqwest::Client,
    webhook_url: String,
}

impl Notifier {
    pub fn new(webhook_url: &str) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Notifier {
            http,
            webhook_url: webhook_url.to_string(),
        })
    }

    /// Post the message. Any non-2xx status is a delivery failure.
    pub async fn send(&self, message: &ChunkedMessage) -> Result<(), PipelineError> {
        let response = self
            .http
            .post(&self.webhook_url)
            .json(message)
            .send()
            .await
            .map_err(|e| PipelineError::capability("delivery", e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PipelineError::capability(
                "delivery",
                format!("HTTP {}: {}", status, body),
            ));
        }

        info!("Delivered message with {} blocks", message.blocks.len());
        Ok(())
    }
}
