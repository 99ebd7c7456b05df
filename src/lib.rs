//! Listing Sniper - Announcement-driven Bybit spot trading library
//!
//! Buys tokens the moment an exchange announces a futures launch or a spot
//! listing, then exits with a take-profit order sized by market cap.
//!
//! # Modules
//!
//! - `domain`: Core rules (ticker normalization, signal parsing, tier pricing, cooldown)
//! - `ports`: Trait abstractions (ExchangePort, MarketCapProvider, SignalSource)
//! - `adapters`: External implementations (Bybit, CoinMarketCap, CoinGecko, Telegram, CLI)
//! - `config`: Configuration loading and validation
//! - `application`: Resolver, executor, dispatcher and supervisor

pub mod domain;
pub mod ports;
pub mod adapters;
pub mod config;
pub mod application;
