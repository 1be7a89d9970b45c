//! Telegram bot channel

use crate::config::TelegramConfig;
use crate::error::WatchError;
use crate::models::AlertEvent;
use crate::notify::{classify_status, AlertChannel, NotifyError};
use async_trait::async_trait;
use serde_json::json;
use std::time::Duration;

pub struct TelegramChannel {
    client: reqwest::Client,
    api_url: String,
    bot_token: String,
    chat_id: String,
}

impl TelegramChannel {
    pub fn new(config: &TelegramConfig, timeout: Duration) -> Result<Self, WatchError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(config, client))
    }

    pub fn with_client(config: &TelegramConfig, client: reqwest::Client) -> Self {
        Self {
            client,
            api_url: config.api_url.clone(),
            bot_token: config.bot_token.clone(),
            chat_id: config.chat_id.clone(),
        }
    }
}

#[async_trait]
impl AlertChannel for TelegramChannel {
    fn name(&self) -> &str {
        "telegram"
    }

    async fn send(&self, event: &AlertEvent) -> Result<(), NotifyError> {
        let text = format!(
            "🚨 {} {} Alert!\nCurrent: RM {:.2}\nThreshold: RM {:.2}",
            event.symbol,
            event.direction.alert_word(),
            event.price,
            event.threshold
        );

        let url = format!("{}/bot{}/sendMessage", self.api_url, self.bot_token);
        let response = self
            .client
            .post(&url)
            .json(&json!({ "chat_id": self.chat_id, "text": text }))
            .send()
            .await
            .map_err(NotifyError::from_http)?;

        let status = response.status();
        if !status.is_success() {
            return Err(classify_status("telegram", status));
        }
        Ok(())
    }
}
