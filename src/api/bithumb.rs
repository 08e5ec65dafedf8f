use async_trait::async_trait;
use reqwest::Client;
use std::collections::BTreeSet;

use super::types::*;
use super::{get_json, ExchangeFeed, FetchError};

const TICKER_URL: &str = "https://api.bithumb.com/public/ticker/ALL_KRW";
const STATUS_OK: &str = "0000";

/// Bithumb exposes no announcement feed here; only the KRW ticker snapshot.
pub struct BithumbClient {
    client: Client,
    ticker_url: String,
}

impl BithumbClient {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            ticker_url: TICKER_URL.to_string(),
        }
    }
}

/// Every key of `data` except `date` whose value is an object is a symbol.
pub fn ticker_symbols(response: BithumbTickerResponse) -> Result<BTreeSet<String>, FetchError> {
    if response.status != STATUS_OK {
        return Err(FetchError::Rejected(format!("status {}", response.status)));
    }

    let data = response
        .data
        .as_object()
        .ok_or_else(|| FetchError::Decode("ticker data is not an object".to_string()))?;

    Ok(data
        .iter()
        .filter(|(key, value)| key.as_str() != "date" && value.is_object())
        .map(|(key, _)| key.clone())
        .collect())
}

#[async_trait]
impl ExchangeFeed for BithumbClient {
    fn exchange(&self) -> Exchange {
        Exchange::Bithumb
    }

    async fn fetch_market_symbols(&self) -> Result<BTreeSet<String>, FetchError> {
        let response: BithumbTickerResponse = get_json(&self.client, &self.ticker_url, &[]).await?;
        let symbols = ticker_symbols(response)?;

        tracing::debug!("Bithumb: {} markets", symbols.len());
        Ok(symbols)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(body: &str) -> BithumbTickerResponse {
        serde_json::from_str(body).unwrap()
    }

    #[test]
    fn test_ticker_symbols_skip_date_and_scalars() {
        let response = parse(
            r#"{"status":"0000","data":{
                "BTC": {"opening_price": "1"},
                "ETH": {"opening_price": "2"},
                "date": "1700000000000",
                "WEIRD": "not-a-ticker"
            }}"#,
        );

        let symbols = ticker_symbols(response).unwrap();
        assert_eq!(
            symbols.into_iter().collect::<Vec<_>>(),
            vec!["BTC".to_string(), "ETH".to_string()]
        );
    }

    #[test]
    fn test_non_ok_status_is_rejected() {
        let response = parse(r#"{"status":"5600","message":"maintenance"}"#);
        assert!(matches!(ticker_symbols(response), Err(FetchError::Rejected(_))));
    }

    #[test]
    fn test_non_object_data_is_decode_error() {
        let response = parse(r#"{"status":"0000","data":[]}"#);
        assert!(matches!(ticker_symbols(response), Err(FetchError::Decode(_))));
    }
}
