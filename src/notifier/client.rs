use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

/// One webhook call: the final score of a match, addressed to one subscriber.
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub url: String,
    pub secret_key: String,
    pub home: u32,
    pub away: u32,
}

#[derive(Debug, Serialize)]
struct ScoreBody {
    home: u32,
    away: u32,
}

/// Delivers result notifications to subscribers.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// `Ok` only when the subscriber accepted the call.
    async fn notify(&self, notification: &Notification) -> Result<()>;
}

/// Sends `PATCH <url>` with the score as JSON and the subscription secret as a
/// bearer token. Any 2xx response is an acceptance.
#[derive(Clone)]
pub struct WebhookClient {
    http: Client,
}

impl WebhookClient {
    pub fn new(timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(WebhookClient { http })
    }
}

#[async_trait]
impl Notifier for WebhookClient {
    async fn notify(&self, notification: &Notification) -> Result<()> {
        debug!("Delivering result to {}", notification.url);

        let resp = self
            .http
            .patch(&notification.url)
            .bearer_auth(&notification.secret_key)
            .json(&ScoreBody {
                home: notification.home,
                away: notification.away,
            })
            .send()
            .await
            .with_context(|| format!("Webhook request to {} failed", notification.url))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("Webhook {} answered {}: {}", notification.url, status, body);
        }
        Ok(())
    }
}
