//! Telegram bot notifications
//!
//! Posts rendered notification text to a Telegram chat via the Bot API.

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use super::transport::NotificationTransport;
use crate::config::TelegramCredentials;
use crate::error::{BulwarkError, Result};

const TELEGRAM_API: &str = "https://api.telegram.org";

/// Telegram notification client
#[derive(Clone)]
pub struct TelegramNotifier {
    client: Client,
    api_base: String,
    token: String,
    chat_id: String,
}

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'a str,
}

impl TelegramNotifier {
    pub fn from_credentials(creds: &TelegramCredentials) -> Option<Arc<Self>> {
        if !creds.is_configured() {
            info!("Telegram notifier disabled (no token/chat_id)");
            return None;
        }
        info!("Telegram notifications enabled (chat_id={})", creds.chat_id);
        Some(Self::new(&creds.bot_token, &creds.chat_id))
    }

    /// Create a notifier with explicit credentials
    pub fn new(token: &str, chat_id: &str) -> Arc<Self> {
        Self::with_api_base(TELEGRAM_API, token, chat_id)
    }

    /// Point at a different Bot API host (self-hosted API server, tests)
    pub fn with_api_base(api_base: &str, token: &str, chat_id: &str) -> Arc<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_else(|_| Client::new());
        Arc::new(Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            token: token.to_string(),
            chat_id: chat_id.to_string(),
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/bot{}/sendMessage", self.api_base, self.token)
    }
}

#[async_trait]
impl NotificationTransport for TelegramNotifier {
    async fn send(&self, text: &str) -> Result<()> {
        let message = SendMessage {
            chat_id: &self.chat_id,
            text,
            parse_mode: "Markdown",
        };

        let resp = self
            .client
            .post(self.endpoint())
            .json(&message)
            .send()
            .await?;

        let status = resp.status();
        if status.is_success() {
            debug!("Telegram notification sent successfully");
            Ok(())
        } else {
            let body = resp.text().await.unwrap_or_default();
            Err(BulwarkError::Delivery(format!("Telegram HTTP {}: {}", status, body)))
        }
    }

    fn name(&self) -> &str {
        "telegram"
    }
}
