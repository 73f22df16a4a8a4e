//! Webhook Alert Sink
//!
//! POSTs each alert as JSON to a configured URL. The body carries a `text`
//! field, so Slack- and Discord-style incoming webhooks render it directly,
//! plus the full dashboard `record`.

use async_trait::async_trait;
use reqwest::Client;

use crate::application::ports::{Alert, AlertError, AlertSink};
use crate::infrastructure::config::AlertSettings;

/// Alert sink backed by an HTTP webhook.
#[derive(Debug, Clone)]
pub struct WebhookAlertSink {
    client: Client,
    url: String,
}

impl WebhookAlertSink {
    /// Build a sink from alert settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(settings: &AlertSettings) -> Result<Self, AlertError> {
        let client = Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(|e| AlertError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            url: settings.webhook_url.clone(),
        })
    }
}

#[async_trait]
impl AlertSink for WebhookAlertSink {
    async fn send(&self, alert: &Alert) -> Result<(), AlertError> {
        let response = self
            .client
            .post(&self.url)
            .json(alert)
            .send()
            .await
            .map_err(|e| AlertError::Transport(e.without_url().to_string()))?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(AlertError::Rejected(status.as_u16()))
        }
    }
}
