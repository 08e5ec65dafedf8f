use async_trait::async_trait;
use reqwest::Client;
use std::collections::BTreeSet;

use super::types::*;
use super::{get_json, ExchangeFeed, FetchError};

const NOTICES_URL: &str = "https://api-manager.upbit.com/api/v1/notices";
const MARKETS_URL: &str = "https://api.upbit.com/v1/market/all";
const NOTICE_PAGE_SIZE: &str = "20";
const KRW_PREFIX: &str = "KRW-";

pub struct UpbitClient {
    client: Client,
    notices_url: String,
    markets_url: String,
}

impl UpbitClient {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            notices_url: NOTICES_URL.to_string(),
            markets_url: MARKETS_URL.to_string(),
        }
    }
}

/// Keeps only KRW-quoted markets and strips the quote prefix.
pub fn krw_symbols(markets: Vec<UpbitMarket>) -> BTreeSet<String> {
    markets
        .into_iter()
        .filter_map(|m| m.market.strip_prefix(KRW_PREFIX).map(str::to_string))
        .filter(|symbol| !symbol.is_empty())
        .collect()
}

#[async_trait]
impl ExchangeFeed for UpbitClient {
    fn exchange(&self) -> Exchange {
        Exchange::Upbit
    }

    fn has_announcements(&self) -> bool {
        true
    }

    async fn fetch_announcements(&self) -> Result<Vec<Announcement>, FetchError> {
        let page: UpbitNoticeResponse = get_json(
            &self.client,
            &self.notices_url,
            &[("page", "1"), ("per_page", NOTICE_PAGE_SIZE)],
        )
        .await?;

        let notices: Vec<Announcement> = page
            .data
            .list
            .into_iter()
            .filter_map(UpbitNotice::into_announcement)
            .collect();

        tracing::debug!("Upbit: {} notices", notices.len());
        Ok(notices)
    }

    async fn fetch_market_symbols(&self) -> Result<BTreeSet<String>, FetchError> {
        let markets: Vec<UpbitMarket> = get_json(&self.client, &self.markets_url, &[]).await?;
        let symbols = krw_symbols(markets);

        tracing::debug!("Upbit: {} markets", symbols.len());
        Ok(symbols)
    }
}
