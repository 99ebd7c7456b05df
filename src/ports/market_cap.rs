//! Market capitalization provider port

use async_trait::async_trait;
use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum MarketCapError {
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Provider returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Failed to parse provider response: {0}")]
    Parse(String),

    #[error("Symbol not listed by provider: {0}")]
    NotListed(String),
}

impl From<reqwest::Error> for MarketCapError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            MarketCapError::Parse(err.to_string())
        } else {
            MarketCapError::Http(err.to_string())
        }
    }
}

/// Source of USD market capitalization by base-asset symbol
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MarketCapProvider: Send + Sync {
    /// Short provider name for logs
    fn name(&self) -> &'static str;

    /// Market cap in USD. `Ok(None)` when the provider has no figure.
    async fn market_cap(&self, symbol: &str) -> Result<Option<Decimal>, MarketCapError>;
}
