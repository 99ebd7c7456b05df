//! CoinGecko client
//!
//! Symbols are not unique on CoinGecko, so a lookup resolves the symbol to
//! the first matching coin id from `/api/v3/coins/list` and then reads the
//! USD market cap from `/api/v3/coins/{id}`. The coin list is fetched on
//! every lookup so that freshly listed coins resolve.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

use crate::ports::market_cap::{MarketCapError, MarketCapProvider};

#[derive(Debug, Clone, Deserialize)]
struct CoinListEntry {
    id: String,
    symbol: String,
}

#[derive(Debug, Deserialize)]
struct CoinDetail {
    #[serde(default)]
    market_data: Option<MarketData>,
}

#[derive(Debug, Deserialize)]
struct MarketData {
    #[serde(default)]
    market_cap: Option<FiatValues>,
}

#[derive(Debug, Deserialize)]
struct FiatValues {
    #[serde(default)]
    usd: Option<Decimal>,
}

impl CoinDetail {
    fn usd_market_cap(&self) -> Option<Decimal> {
        self.market_data
            .as_ref()
            .and_then(|m| m.market_cap.as_ref())
            .and_then(|c| c.usd)
    }
}

fn find_coin_id<'a>(coins: &'a [CoinListEntry], symbol: &str) -> Option<&'a str> {
    coins
        .iter()
        .find(|c| c.symbol.eq_ignore_ascii_case(symbol))
        .map(|c| c.id.as_str())
}

/// CoinGecko public API client
#[derive(Debug)]
pub struct CoinGeckoClient {
    base_url: String,
    http: Client,
}

impl CoinGeckoClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, MarketCapError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| MarketCapError::Http(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, MarketCapError> {
        let url = format!("{}{}", self.base_url, path);
        let response = self.http.get(&url).send().await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(MarketCapError::Status {
                status: status.as_u16(),
                body,
            });
        }

        serde_json::from_str(&body).map_err(|e| MarketCapError::Parse(e.to_string()))
    }

    async fn coins(&self) -> Result<Vec<CoinListEntry>, MarketCapError> {
        let coins: Vec<CoinListEntry> = self.get_json("/api/v3/coins/list").await?;
        debug!("Fetched {} CoinGecko coin ids", coins.len());
        Ok(coins)
    }
}

#[async_trait]
impl MarketCapProvider for CoinGeckoClient {
    fn name(&self) -> &'static str {
        "coingecko"
    }

    async fn market_cap(&self, symbol: &str) -> Result<Option<Decimal>, MarketCapError> {
        let coins = self.coins().await?;
        let id = find_coin_id(&coins, symbol)
            .ok_or_else(|| MarketCapError::NotListed(symbol.to_string()))?
            .to_string();

        let detail: CoinDetail = self.get_json(&format!("/api/v3/coins/{}", id)).await?;
        Ok(detail.usd_market_cap())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn coins() -> Vec<CoinListEntry> {
        serde_json::from_str(
            r#"[
                {"id":"pepe","symbol":"pepe","name":"Pepe"},
                {"id":"pepe-2","symbol":"pepe","name":"Pepe 2.0"},
                {"id":"xai-blockchain","symbol":"xai","name":"Xai"}
            ]"#,
        )
        .unwrap()
    }

    #[test]
    fn test_first_symbol_match_wins() {
        let coins = coins();
        assert_eq!(find_coin_id(&coins, "PEPE"), Some("pepe"));
        assert_eq!(find_coin_id(&coins, "xai"), Some("xai-blockchain"));
        assert_eq!(find_coin_id(&coins, "DOGE"), None);
    }

    #[test]
    fn test_usd_market_cap() {
        let raw = r#"{"id":"xai-blockchain","market_data":{"market_cap":{"usd":120000000,"eur":110000000}}}"#;
        let detail: CoinDetail = serde_json::from_str(raw).unwrap();
        assert_eq!(detail.usd_market_cap(), Some(dec!(120000000)));
    }

    /// Minimal HTTP stub: serves `v1` of the coin list first, then `v2`
    async fn spawn_coingecko_stub(v1: &'static str, v2: &'static str) -> (String, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let list_hits = Arc::new(AtomicUsize::new(0));

        let hits = list_hits.clone();
        tokio::spawn(async move {
            loop {
                let Ok((mut stream, _)) = listener.accept().await else { break };
                let mut buf = vec![0u8; 4096];
                let n = stream.read(&mut buf).await.unwrap_or(0);
                let request = String::from_utf8_lossy(&buf[..n]).to_string();
                let path = request.split_whitespace().nth(1).unwrap_or("").to_string();

                let (status, body) = match path.as_str() {
                    "/api/v3/coins/list" => {
                        let list = if hits.fetch_add(1, Ordering::SeqCst) == 0 { v1 } else { v2 };
                        ("200 OK", list.to_string())
                    }
                    "/api/v3/coins/pepe" => (
                        "200 OK",
                        r#"{"id":"pepe","market_data":{"market_cap":{"usd":120000000}}}"#.to_string(),
                    ),
                    "/api/v3/coins/newcoin" => (
                        "200 OK",
                        r#"{"id":"newcoin","market_data":{"market_cap":{"usd":45000000}}}"#.to_string(),
                    ),
                    _ => ("404 Not Found", r#"{"error":"coin not found"}"#.to_string()),
                };

                let response = format!(
                    "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status,
                    body.len(),
                    body
                );
                let _ = stream.write_all(response.as_bytes()).await;
                let _ = stream.shutdown().await;
            }
        });

        (format!("http://{}", addr), list_hits)
    }

    #[tokio::test]
    async fn test_coin_listed_after_first_lookup_resolves() {
        let (base_url, list_hits) = spawn_coingecko_stub(
            r#"[{"id":"pepe","symbol":"pepe","name":"Pepe"}]"#,
            r#"[{"id":"pepe","symbol":"pepe","name":"Pepe"},{"id":"newcoin","symbol":"new","name":"New"}]"#,
        )
        .await;
        let client = CoinGeckoClient::new(base_url, Duration::from_secs(5)).unwrap();

        assert_eq!(client.market_cap("PEPE").await, Ok(Some(dec!(120000000))));
        assert_eq!(client.market_cap("NEW").await, Ok(Some(dec!(45000000))));
        assert_eq!(list_hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_unknown_symbol_is_not_listed() {
        let (base_url, _) = spawn_coingecko_stub(
            r#"[{"id":"pepe","symbol":"pepe","name":"Pepe"}]"#,
            r#"[{"id":"pepe","symbol":"pepe","name":"Pepe"}]"#,
        )
        .await;
        let client = CoinGeckoClient::new(base_url, Duration::from_secs(5)).unwrap();

        assert_eq!(
            client.market_cap("DOGE").await,
            Err(MarketCapError::NotListed("DOGE".to_string()))
        );
    }

    #[test]
    fn test_missing_market_data() {
        let detail: CoinDetail = serde_json::from_str(r#"{"id":"new-coin"}"#).unwrap();
        assert_eq!(detail.usd_market_cap(), None);
    }
}
