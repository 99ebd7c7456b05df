//! Exchange port: order placement, wallet balances and candles

use async_trait::async_trait;
use rust_decimal::Decimal;
use thiserror::Error;

use crate::domain::{Instrument, OrderAck, OrderRequest};

/// Rejection text the exchange uses for over-precise quantities
const PRECISION_REJECTION: &str = "too many decimals";

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ExchangeError {
    /// Transport-level failure
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Request timed out")]
    Timeout,

    /// Exchange answered but refused the request
    #[error("Rejected by exchange: {message} (code: {code})")]
    Rejected { code: i64, message: String },

    #[error("Failed to parse exchange response: {0}")]
    Parse(String),

    #[error("Authentication error: {0}")]
    Auth(String),
}

impl ExchangeError {
    /// True when the exchange refused a quantity for having too many fractional digits
    pub fn is_precision_rejection(&self) -> bool {
        match self {
            ExchangeError::Rejected { message, .. } => {
                message.to_lowercase().contains(PRECISION_REJECTION)
            }
            _ => false,
        }
    }
}

impl From<reqwest::Error> for ExchangeError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ExchangeError::Timeout
        } else if err.is_decode() {
            ExchangeError::Parse(err.to_string())
        } else {
            ExchangeError::Http(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ExchangeError {
    fn from(err: serde_json::Error) -> Self {
        ExchangeError::Parse(err.to_string())
    }
}

/// Balance of one coin in the trading account
#[derive(Debug, Clone, PartialEq)]
pub struct CoinBalance {
    pub coin: String,
    pub wallet_balance: Decimal,
}

/// Candle query over a closed time window
#[derive(Debug, Clone, PartialEq)]
pub struct KlineQuery {
    pub instrument: Instrument,
    /// Exchange interval code, "1" = one minute
    pub interval: String,
    pub start_ms: i64,
    pub end_ms: i64,
    pub limit: u32,
}

/// One candle. Prices stay as the exchange wrote them so their precision survives.
#[derive(Debug, Clone, PartialEq)]
pub struct Candle {
    pub start_ms: i64,
    pub open: String,
    pub high: String,
    pub low: String,
    pub close: String,
    pub volume: String,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ExchangePort: Send + Sync {
    /// Submit an order. A refused order comes back as `ExchangeError::Rejected`.
    async fn place_order(&self, request: &OrderRequest) -> Result<OrderAck, ExchangeError>;

    /// Coin balances of the given account type
    async fn wallet_balance(&self, account_type: &str) -> Result<Vec<CoinBalance>, ExchangeError>;

    /// Candles inside the query window
    async fn klines(&self, query: &KlineQuery) -> Result<Vec<Candle>, ExchangeError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_precision_rejection_detected() {
        let err = ExchangeError::Rejected {
            code: 170137,
            message: "Order quantity has too many decimals.".to_string(),
        };
        assert!(err.is_precision_rejection());

        let upper = ExchangeError::Rejected {
            code: 170137,
            message: "TOO MANY DECIMALS".to_string(),
        };
        assert!(upper.is_precision_rejection());
    }

    #[test]
    fn test_other_errors_are_not_precision() {
        let err = ExchangeError::Rejected {
            code: 170131,
            message: "Insufficient balance.".to_string(),
        };
        assert!(!err.is_precision_rejection());
        assert!(!ExchangeError::Timeout.is_precision_rejection());
        assert!(!ExchangeError::Http("too many decimals".into()).is_precision_rejection());
    }
}
