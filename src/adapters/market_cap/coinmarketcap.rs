//! CoinMarketCap quotes client

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::ports::market_cap::{MarketCapError, MarketCapProvider};

#[derive(Debug, Deserialize)]
struct QuotesResponse {
    #[serde(default)]
    data: HashMap<String, CoinQuote>,
}

#[derive(Debug, Deserialize)]
struct CoinQuote {
    #[serde(default)]
    quote: HashMap<String, FiatQuote>,
}

#[derive(Debug, Deserialize)]
struct FiatQuote {
    #[serde(default)]
    market_cap: Option<Decimal>,
}

impl QuotesResponse {
    fn usd_market_cap(&self, symbol: &str) -> Option<Decimal> {
        self.data
            .get(symbol)
            .and_then(|coin| coin.quote.get("USD"))
            .and_then(|usd| usd.market_cap)
    }
}

/// CoinMarketCap `/v1/cryptocurrency/quotes/latest` client
#[derive(Debug, Clone)]
pub struct CoinMarketCapClient {
    base_url: String,
    api_key: String,
    http: Client,
}

impl CoinMarketCapClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>, timeout: Duration) -> Result<Self, MarketCapError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| MarketCapError::Http(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            http,
        })
    }
}

#[async_trait]
impl MarketCapProvider for CoinMarketCapClient {
    fn name(&self) -> &'static str {
        "coinmarketcap"
    }

    async fn market_cap(&self, symbol: &str) -> Result<Option<Decimal>, MarketCapError> {
        let url = format!("{}/v1/cryptocurrency/quotes/latest", self.base_url);
        let response = self
            .http
            .get(&url)
            .header("Accepts", "application/json")
            .header("X-CMC_PRO_API_KEY", &self.api_key)
            .query(&[("symbol", symbol), ("convert", "USD")])
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(MarketCapError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let quotes: QuotesResponse =
            serde_json::from_str(&body).map_err(|e| MarketCapError::Parse(e.to_string()))?;
        Ok(quotes.usd_market_cap(symbol))
    }
}
