use anyhow::Result;
use serde::Deserialize;
use std::env;
use std::path::PathBuf;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub telegram: TelegramConfig,
    pub monitor: MonitorConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TelegramConfig {
    pub bot_token: Option<String>,
    pub chat_id: Option<String>,
}

impl TelegramConfig {
    /// Both values must be present for remote delivery.
    pub fn credentials(&self) -> Option<(&str, &str)> {
        match (self.bot_token.as_deref(), self.chat_id.as_deref()) {
            (Some(token), Some(chat_id)) => Some((token, chat_id)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MonitorConfig {
    pub check_interval_secs: u64,
    pub request_timeout_secs: u64,
    pub state_file: PathBuf,
    pub log_level: String,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            check_interval_secs: 30,
            request_timeout_secs: 15,
            state_file: PathBuf::from("known_listings.json"),
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();

        let defaults = MonitorConfig::default();

        Ok(Config {
            telegram: TelegramConfig {
                bot_token: non_empty_var("TELEGRAM_BOT_TOKEN"),
                chat_id: non_empty_var("TELEGRAM_CHAT_ID"),
            },
            monitor: MonitorConfig {
                check_interval_secs: env::var("CHECK_INTERVAL")
                    .unwrap_or_else(|_| "30".to_string())
                    .parse()
                    .unwrap_or(defaults.check_interval_secs)
                    .max(1),
                request_timeout_secs: env::var("REQUEST_TIMEOUT")
                    .unwrap_or_else(|_| "15".to_string())
                    .parse()
                    .unwrap_or(defaults.request_timeout_secs)
                    .max(1),
                state_file: env::var("STATE_FILE")
                    .map(PathBuf::from)
                    .unwrap_or(defaults.state_file),
                log_level: env::var("LOG_LEVEL").unwrap_or(defaults.log_level),
            },
        })
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
