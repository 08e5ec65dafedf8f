pub mod bithumb;
pub mod types;
pub mod upbit;

pub use bithumb::BithumbClient;
pub use types::*;
pub use upbit::UpbitClient;

use anyhow::Context;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, USER_AGENT};
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::collections::BTreeSet;
use std::time::Duration;
use thiserror::Error;

const BROWSER_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("unexpected HTTP status {0}")]
    Status(reqwest::StatusCode),
    #[error("malformed response: {0}")]
    Decode(String),
    #[error("exchange rejected request: {0}")]
    Rejected(String),
}

/// Read-only view of one exchange. Implementations never retry; the poll
/// interval is the retry mechanism.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ExchangeFeed: Send + Sync {
    fn exchange(&self) -> Exchange;

    /// Whether this exchange publishes a listing announcement board.
    fn has_announcements(&self) -> bool {
        false
    }

    async fn fetch_announcements(&self) -> Result<Vec<Announcement>, FetchError> {
        Ok(Vec::new())
    }

    /// Symbols currently tradable against KRW.
    async fn fetch_market_symbols(&self) -> Result<BTreeSet<String>, FetchError>;
}

/// Builds the HTTP client shared by every exchange adapter.
pub fn build_http_client(timeout_secs: u64) -> anyhow::Result<Client> {
    let mut headers = HeaderMap::new();
    headers.insert(USER_AGENT, HeaderValue::from_static(BROWSER_USER_AGENT));
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

    Client::builder()
        .default_headers(headers)
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .context("Failed to build HTTP client")
}

pub(crate) async fn get_json<T: DeserializeOwned>(
    client: &Client,
    url: &str,
    query: &[(&str, &str)],
) -> Result<T, FetchError> {
    let response = client.get(url).query(query).send().await?;
    let status = response.status();

    if !status.is_success() {
        return Err(FetchError::Status(status));
    }

    let body = response.text().await?;
    serde_json::from_str(&body).map_err(|e| FetchError::Decode(e.to_string()))
}
