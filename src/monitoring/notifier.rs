use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;

use crate::core::config::TelegramConfig;

const TELEGRAM_API: &str = "https://api.telegram.org";
const SEND_TIMEOUT_SECS: u64 = 10;

/// Best-effort delivery of a formatted message. Callers never retry.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn deliver(&self, text: &str) -> bool;
}

pub struct TelegramNotifier {
    client: Client,
    send_url: String,
    chat_id: String,
}

impl TelegramNotifier {
    pub fn new(bot_token: &str, chat_id: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(SEND_TIMEOUT_SECS))
            .build()
            .context("Failed to build Telegram client")?;

        Ok(Self {
            client,
            send_url: format!("{}/bot{}/sendMessage", TELEGRAM_API, bot_token),
            chat_id: chat_id.to_string(),
        })
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn deliver(&self, text: &str) -> bool {
        let payload = serde_json::json!({
            "chat_id": self.chat_id,
            "text": text,
            "parse_mode": "HTML",
        });

        match self.client.post(&self.send_url).json(&payload).send().await {
            Ok(response) if response.status() == reqwest::StatusCode::OK => {
                tracing::info!("Telegram message sent");
                true
            }
            Ok(response) => {
                tracing::error!("Telegram error: {}", response.status());
                false
            }
            Err(e) => {
                tracing::error!("Telegram failed: {}", e.without_url());
                false
            }
        }
    }
}

/// Fallback when no Telegram credentials are configured.
pub struct ConsoleNotifier;

#[async_trait]
impl Notifier for ConsoleNotifier {
    async fn deliver(&self, text: &str) -> bool {
        tracing::warn!("Telegram token not configured!");
        println!("\nALERT:\n{}\n", text);
        false
    }
}

pub fn build_notifier(config: &TelegramConfig) -> Result<Arc<dyn Notifier>> {
    match config.credentials() {
        Some((token, chat_id)) => Ok(Arc::new(TelegramNotifier::new(token, chat_id)?)),
        None => Ok(Arc::new(ConsoleNotifier)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_console_notifier_reports_not_delivered() {
        assert!(!ConsoleNotifier.deliver("hello").await);
    }

    #[test]
    fn test_send_url_embeds_token() {
        let notifier = TelegramNotifier::new("123:abc", "42").unwrap();
        assert_eq!(
            notifier.send_url,
            "https://api.telegram.org/bot123:abc/sendMessage"
        );
    }

    #[test]
    fn test_missing_credentials_fall_back_to_console() {
        assert!(build_notifier(&TelegramConfig::default()).is_ok());
    }
}
