//! Ports Layer - Trait definitions for external dependencies
//!
//! This module defines the interfaces (ports) that adapters must implement.
//! Following hexagonal architecture, these traits abstract:
//! - Spot exchange trading and account access (orders, balances, candles)
//! - Market capitalization lookups
//! - The inbound announcement stream

pub mod exchange;
pub mod market_cap;
pub mod signal_source;
pub mod mocks;

pub use exchange::{Candle, CoinBalance, ExchangeError, ExchangePort, KlineQuery};
pub use market_cap::{MarketCapError, MarketCapProvider};
pub use signal_source::{SignalSource, SourceError};
