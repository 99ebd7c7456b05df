//! Market Cap Adapters
//!
//! Implementations of the MarketCapProvider port:
//! - CoinMarketCap: keyed quotes endpoint, primary source
//! - CoinGecko: public coin list + coin detail, fallback source

mod coingecko;
mod coinmarketcap;

pub use coingecko::CoinGeckoClient;
pub use coinmarketcap::CoinMarketCapClient;
