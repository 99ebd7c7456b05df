//! Bybit v5 REST Client
//!
//! Signed HTTP client for spot order placement, unified-account balances and
//! public klines. Private requests carry
//! `HMAC_SHA256(secret, timestamp + api_key + recv_window + payload)` in the
//! `X-BAPI-*` headers, where payload is the query string for GET and the raw
//! JSON body for POST.

use std::time::Duration;

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use reqwest::Client;
use sha2::Sha256;

use super::types::{
    ApiResponse, CreateOrderBody, CreateOrderResult, KlineResult, WalletBalanceResult,
};
use crate::domain::{OrderAck, OrderRequest};
use crate::ports::exchange::{Candle, CoinBalance, ExchangeError, ExchangePort, KlineQuery};

type HmacSha256 = Hmac<Sha256>;

/// Bybit client configuration
#[derive(Debug, Clone)]
pub struct BybitConfig {
    pub api_base_url: String,
    pub api_key: String,
    pub api_secret: String,
    /// Validity window the server allows for the request timestamp
    pub recv_window_ms: u64,
    /// Request timeout
    pub timeout: Duration,
}

impl BybitConfig {
    pub fn new(api_key: String, api_secret: String) -> Self {
        Self {
            api_base_url: "https://api.bybit.com".to_string(),
            api_key,
            api_secret,
            recv_window_ms: 5000,
            timeout: Duration::from_secs(10),
        }
    }
}

/// Bybit spot exchange client
#[derive(Debug, Clone)]
pub struct BybitClient {
    config: BybitConfig,
    http: Client,
}

impl BybitClient {
    pub fn with_config(config: BybitConfig) -> Result<Self, ExchangeError> {
        if config.api_key.is_empty() || config.api_secret.is_empty() {
            return Err(ExchangeError::Auth("API key and secret are required".into()));
        }

        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ExchangeError::Http(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { config, http })
    }

    /// Request signature for `payload` at `timestamp_ms`
    pub fn sign(&self, timestamp_ms: i64, payload: &str) -> Result<String, ExchangeError> {
        let prehash = format!(
            "{}{}{}{}",
            timestamp_ms, self.config.api_key, self.config.recv_window_ms, payload
        );
        let mut mac = HmacSha256::new_from_slice(self.config.api_secret.as_bytes())
            .map_err(|e| ExchangeError::Auth(format!("Invalid API secret: {}", e)))?;
        mac.update(prehash.as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    fn auth_headers(&self, payload: &str) -> Result<Vec<(&'static str, String)>, ExchangeError> {
        let timestamp = chrono::Utc::now().timestamp_millis();
        Ok(vec![
            ("X-BAPI-API-KEY", self.config.api_key.clone()),
            ("X-BAPI-TIMESTAMP", timestamp.to_string()),
            ("X-BAPI-RECV-WINDOW", self.config.recv_window_ms.to_string()),
            ("X-BAPI-SIGN", self.sign(timestamp, payload)?),
        ])
    }

    async fn get(&self, path: &str, query: &str, signed: bool) -> Result<ApiResponse, ExchangeError> {
        let url = format!("{}{}?{}", self.config.api_base_url, path, query);
        let mut req = self.http.get(&url);
        if signed {
            for (name, value) in self.auth_headers(query)? {
                req = req.header(name, value);
            }
        }

        let response = req.send().await?;
        Self::read_envelope(response).await
    }

    async fn post(&self, path: &str, body: String) -> Result<ApiResponse, ExchangeError> {
        let url = format!("{}{}", self.config.api_base_url, path);
        let mut req = self
            .http
            .post(&url)
            .header("Content-Type", "application/json");
        for (name, value) in self.auth_headers(&body)? {
            req = req.header(name, value);
        }

        let response = req.body(body).send().await?;
        Self::read_envelope(response).await
    }

    async fn read_envelope(response: reqwest::Response) -> Result<ApiResponse, ExchangeError> {
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            return Err(ExchangeError::Http(format!("API error {}: {}", status, text)));
        }

        Ok(serde_json::from_str(&text)?)
    }
}

#[async_trait]
impl ExchangePort for BybitClient {
    async fn place_order(&self, request: &OrderRequest) -> Result<OrderAck, ExchangeError> {
        let body = serde_json::to_string(&CreateOrderBody::spot(request))?;
        let result: CreateOrderResult = self.post("/v5/order/create", body).await?.into_result()?;

        Ok(OrderAck {
            order_id: result.order_id,
            quantity: request.quantity,
        })
    }

    async fn wallet_balance(&self, account_type: &str) -> Result<Vec<CoinBalance>, ExchangeError> {
        let query = format!("accountType={}", account_type);
        let result: WalletBalanceResult = self
            .get("/v5/account/wallet-balance", &query, true)
            .await?
            .into_result()?;

        result.into_balances()
    }

    async fn klines(&self, query: &KlineQuery) -> Result<Vec<Candle>, ExchangeError> {
        let qs = format!(
            "category=spot&symbol={}&interval={}&start={}&end={}&limit={}",
            query.instrument.symbol(),
            query.interval,
            query.start_ms,
            query.end_ms,
            query.limit
        );
        let result: KlineResult = self.get("/v5/market/kline", &qs, false).await?.into_result()?;

        result.into_candles()
    }
}
