//! Adapters Layer - External System Implementations
//!
//! This module contains implementations of the port traits:
//! - Bybit: v5 spot REST client (orders, balances, klines)
//! - Market Cap: CoinMarketCap and CoinGecko lookups
//! - Telegram: Bot API long-polling announcement source
//! - CLI: Command-line interface definitions

pub mod bybit;
pub mod market_cap;
pub mod telegram;
pub mod cli;

pub use bybit::{BybitClient, BybitConfig};
pub use market_cap::{CoinGeckoClient, CoinMarketCapClient};
pub use telegram::TelegramSource;
pub use cli::CliApp;
