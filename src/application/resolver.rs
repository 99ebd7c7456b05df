//! Market-Cap Resolver
//!
//! Ordered provider chain. The first provider that answers with a positive
//! market cap wins; errors, missing figures and zeros fall through to the
//! next provider.

use std::sync::Arc;

use rust_decimal::Decimal;

use crate::ports::market_cap::MarketCapProvider;

#[derive(Clone)]
pub struct MarketCapResolver {
    providers: Vec<Arc<dyn MarketCapProvider>>,
}

impl MarketCapResolver {
    pub fn new(providers: Vec<Arc<dyn MarketCapProvider>>) -> Self {
        Self { providers }
    }

    pub fn provider_names(&self) -> Vec<&'static str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    /// USD market cap of `base_asset`, or `None` when every provider failed
    pub async fn resolve(&self, base_asset: &str) -> Option<Decimal> {
        for provider in &self.providers {
            match provider.market_cap(base_asset).await {
                Ok(Some(cap)) if cap > Decimal::ZERO => {
                    tracing::info!(
                        symbol = base_asset,
                        provider = provider.name(),
                        market_cap = %cap,
                        "Market cap resolved"
                    );
                    return Some(cap);
                }
                Ok(_) => {
                    tracing::warn!(
                        symbol = base_asset,
                        provider = provider.name(),
                        "No market cap from provider"
                    );
                }
                Err(e) => {
                    tracing::warn!(
                        symbol = base_asset,
                        provider = provider.name(),
                        "Market cap lookup failed: {}",
                        e
                    );
                }
            }
        }

        tracing::error!(symbol = base_asset, "Market cap unavailable from all providers");
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::market_cap::{MarketCapError, MockMarketCapProvider};
    use mockall::predicate::eq;
    use rust_decimal_macros::dec;

    fn provider(name: &'static str, answer: Result<Option<Decimal>, MarketCapError>) -> MockMarketCapProvider {
        let mut mock = MockMarketCapProvider::new();
        mock.expect_name().return_const(name);
        mock.expect_market_cap()
            .with(eq("PEPE"))
            .times(1)
            .return_const(answer);
        mock
    }

    #[tokio::test]
    async fn test_primary_wins() {
        let primary = provider("cmc", Ok(Some(dec!(50000000))));
        let mut secondary = MockMarketCapProvider::new();
        secondary.expect_name().return_const("coingecko");
        secondary.expect_market_cap().never();

        let resolver = MarketCapResolver::new(vec![Arc::new(primary), Arc::new(secondary)]);
        assert_eq!(resolver.resolve("PEPE").await, Some(dec!(50000000)));
    }

    #[tokio::test]
    async fn test_falls_back_on_error() {
        let primary = provider("cmc", Err(MarketCapError::Status { status: 429, body: "rate limited".into() }));
        let secondary = provider("coingecko", Ok(Some(dec!(120000000))));

        let resolver = MarketCapResolver::new(vec![Arc::new(primary), Arc::new(secondary)]);
        assert_eq!(resolver.resolve("PEPE").await, Some(dec!(120000000)));
    }

    #[tokio::test]
    async fn test_zero_counts_as_missing() {
        let primary = provider("cmc", Ok(Some(Decimal::ZERO)));
        let secondary = provider("coingecko", Ok(Some(dec!(7))));

        let resolver = MarketCapResolver::new(vec![Arc::new(primary), Arc::new(secondary)]);
        assert_eq!(resolver.resolve("PEPE").await, Some(dec!(7)));
    }

    #[tokio::test]
    async fn test_all_providers_fail() {
        let primary = provider("cmc", Ok(None));
        let secondary = provider("coingecko", Err(MarketCapError::NotListed("PEPE".into())));

        let resolver = MarketCapResolver::new(vec![Arc::new(primary), Arc::new(secondary)]);
        assert_eq!(resolver.resolve("PEPE").await, None);
        assert_eq!(resolver.provider_names(), vec!["cmc", "coingecko"]);
    }
}
