//! Bybit Adapter
//!
//! Implementation of the ExchangePort for Bybit v5 spot trading:
//! - Signed market and limit order placement
//! - Unified-account wallet balances
//! - Public one-minute klines
//!
//! # Example
//!
//! ```rust,ignore
//! use listing_sniper::adapters::bybit::{BybitClient, BybitConfig};
//! use listing_sniper::ports::ExchangePort;
//!
//! let client = BybitClient::with_config(BybitConfig::new(api_key, api_secret))?;
//! let balances = client.wallet_balance("UNIFIED").await?;
//! ```

mod client;
mod types;

pub use client::{BybitClient, BybitConfig};
