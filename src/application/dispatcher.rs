//! Signal Dispatcher
//!
//! Turns one announcement into trades:
//! 1. Ignore it unless it came from an allow-listed channel
//! 2. Extract the announced instruments and split the budget evenly
//! 3. Market-buy every instrument concurrently and wait for all of them
//! 4. For each confirmed buy, concurrently: wait for settlement, read the
//!    balance, resolve the market cap and place the tiered exit
//!
//! A failure in one instrument's pipeline is logged and never touches its
//! siblings.

use std::collections::HashSet;
use std::time::Duration;

use futures_util::future::join_all;
use rust_decimal::Decimal;

use crate::config::Config;
use crate::domain::{
    sell_quantity, take_profit, truncate, FuturesTiers, Instrument, OrderAck, OrderRequest,
    PricingDecision, PricingPolicy, Signal, SignalParser, SignalType, SpotTiers, TierDecision,
};
use crate::domain::order::QUOTE_AMOUNT_DP;
use crate::ports::exchange::KlineQuery;

use super::error::{PipelineError, Stage};
use super::executor::{BuyOutcome, OrderExecutor};
use super::resolver::MarketCapResolver;

/// Tunables of the dispatcher, taken from `[telegram]`, `[bybit]` and `[trading]`
#[derive(Debug, Clone)]
pub struct DispatcherSettings {
    pub allowed_channels: HashSet<i64>,
    /// Quote amount split across the instruments of one announcement
    pub budget: Decimal,
    pub quote_asset: String,
    pub account_type: String,
    /// Wait between a confirmed buy and the balance read
    pub settlement_delay: Duration,
    /// Wait between pricing and the limit sell
    pub order_delay: Duration,
    pub kline_window: Duration,
    pub kline_end_offset: Duration,
    pub kline_interval: String,
    pub kline_limit: u32,
}

impl From<&Config> for DispatcherSettings {
    fn from(config: &Config) -> Self {
        let trading = &config.trading;
        Self {
            allowed_channels: config.telegram.channels.iter().copied().collect(),
            budget: trading.initial_target,
            quote_asset: trading.quote_asset.clone(),
            account_type: config.bybit.account_type.clone(),
            settlement_delay: trading.settlement_delay(),
            order_delay: trading.order_delay(),
            kline_window: Duration::from_secs(trading.kline_window_secs),
            kline_end_offset: Duration::from_secs(trading.kline_end_offset_secs),
            kline_interval: trading.kline_interval.clone(),
            kline_limit: trading.kline_limit,
        }
    }
}

/// How one instrument's position was exited
#[derive(Debug, Clone, PartialEq)]
pub enum SellOutcome {
    /// Market cap below the lowest band; position left open
    Skipped { market_cap: Decimal },
    MarketSold { market_cap: Decimal, ack: OrderAck },
    LimitPlaced {
        market_cap: Decimal,
        ack: OrderAck,
        pricing: PricingDecision,
    },
}

/// Everything one announcement caused
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchReport {
    pub signal_type: SignalType,
    /// Quote amount each buy spent
    pub per_instrument_budget: Decimal,
    pub buys: Vec<(Instrument, BuyOutcome)>,
    /// Only instruments whose buy was confirmed
    pub sells: Vec<(Instrument, Result<SellOutcome, PipelineError>)>,
}

impl DispatchReport {
    pub fn confirmed_buys(&self) -> usize {
        self.buys.iter().filter(|(_, outcome)| outcome.is_confirmed()).count()
    }

    pub fn sell_for(&self, instrument: &Instrument) -> Option<&Result<SellOutcome, PipelineError>> {
        self.sells
            .iter()
            .find(|(inst, _)| inst == instrument)
            .map(|(_, outcome)| outcome)
    }
}

pub struct SignalDispatcher {
    settings: DispatcherSettings,
    parser: SignalParser,
    policy: PricingPolicy,
    resolver: MarketCapResolver,
    executor: OrderExecutor,
}

impl SignalDispatcher {
    pub fn new(
        settings: DispatcherSettings,
        parser: SignalParser,
        policy: PricingPolicy,
        resolver: MarketCapResolver,
        executor: OrderExecutor,
    ) -> Self {
        Self {
            settings,
            parser,
            policy,
            resolver,
            executor,
        }
    }

    /// Dispatcher wired from a loaded config
    pub fn from_config(
        config: &Config,
        resolver: MarketCapResolver,
        executor: OrderExecutor,
    ) -> Result<Self, regex::Error> {
        let parser = SignalParser::new(&config.trading.quote_asset)?;
        let policy = PricingPolicy::new(
            &FuturesTiers::from(&config.futures),
            &SpotTiers::from(&config.spot),
        );
        Ok(Self::new(DispatcherSettings::from(config), parser, policy, resolver, executor))
    }

    pub fn settings(&self) -> &DispatcherSettings {
        &self.settings
    }

    pub fn accepts(&self, channel_id: i64) -> bool {
        self.settings.allowed_channels.contains(&channel_id)
    }

    /// Handle one inbound signal. `None` when it was ignored.
    pub async fn dispatch(&self, signal: &Signal) -> Option<DispatchReport> {
        if !self.accepts(signal.channel_id) {
            tracing::debug!("Ignoring message from channel {}", signal.channel_id);
            return None;
        }

        let parsed = self.parser.parse(&signal.text)?;
        let count = Decimal::from(parsed.instruments.len());
        let per_instrument_budget = truncate(self.settings.budget / count, QUOTE_AMOUNT_DP);

        tracing::info!(
            signal_type = %parsed.signal_type,
            channel = signal.channel_id,
            "Announcement for {:?}, {} {} each",
            parsed.instruments.iter().map(|i| i.symbol()).collect::<Vec<_>>(),
            per_instrument_budget,
            self.settings.quote_asset
        );

        let buys = join_all(
            parsed
                .instruments
                .iter()
                .map(|inst| self.executor.market_buy(inst, per_instrument_budget)),
        )
        .await;
        let buys: Vec<(Instrument, BuyOutcome)> =
            parsed.instruments.into_iter().zip(buys).collect();

        let confirmed: Vec<&Instrument> = buys
            .iter()
            .filter(|(_, outcome)| outcome.is_confirmed())
            .map(|(inst, _)| inst)
            .collect();

        let sells = join_all(
            confirmed
                .iter()
                .map(|inst| self.post_buy(inst, parsed.signal_type)),
        )
        .await;
        let sells = confirmed.into_iter().cloned().zip(sells).collect();

        Some(DispatchReport {
            signal_type: parsed.signal_type,
            per_instrument_budget,
            buys,
            sells,
        })
    }

    /// Exit sequence for one confirmed buy
    pub async fn post_buy(
        &self,
        instrument: &Instrument,
        signal_type: SignalType,
    ) -> Result<SellOutcome, PipelineError> {
        let result = self.run_post_buy(instrument, signal_type).await;
        match &result {
            Ok(outcome) => tracing::info!(instrument = %instrument, "Post-buy done: {:?}", outcome),
            Err(e) => tracing::error!(
                instrument = %instrument,
                stage = %e.stage(),
                "Post-buy aborted: {}",
                e
            ),
        }
        result
    }

    async fn run_post_buy(
        &self,
        instrument: &Instrument,
        signal_type: SignalType,
    ) -> Result<SellOutcome, PipelineError> {
        sleep_if_set(self.settings.settlement_delay).await;

        let quantity = self.sellable_quantity(instrument).await?;

        let market_cap = self
            .resolver
            .resolve(instrument.base())
            .await
            .ok_or(PipelineError::MarketCapUnavailable)?;

        match self.policy.decide(signal_type, market_cap) {
            TierDecision::Skip => {
                tracing::info!(
                    instrument = %instrument,
                    market_cap = %market_cap,
                    "Market cap below lowest band, no take-profit order"
                );
                Ok(SellOutcome::Skipped { market_cap })
            }
            TierDecision::MarketSell => {
                tracing::info!(
                    instrument = %instrument,
                    market_cap = %market_cap,
                    "Market cap above highest band, selling at market"
                );
                let request = OrderRequest::market_sell(instrument.clone(), quantity);
                let ack = self.sell(&request).await?;
                Ok(SellOutcome::MarketSold { market_cap, ack })
            }
            TierDecision::LimitSell { multiplier } => {
                let pricing = self.price(instrument, multiplier).await?;
                tracing::info!(
                    instrument = %instrument,
                    market_cap = %market_cap,
                    "Take-profit at {} (avg {} x {})",
                    pricing.take_profit_price,
                    pricing.average_price,
                    multiplier
                );

                sleep_if_set(self.settings.order_delay).await;

                let request =
                    OrderRequest::limit_sell(instrument.clone(), quantity, pricing.take_profit_price);
                let ack = self.sell(&request).await?;
                Ok(SellOutcome::LimitPlaced {
                    market_cap,
                    ack,
                    pricing,
                })
            }
        }
    }

    async fn sellable_quantity(&self, instrument: &Instrument) -> Result<Decimal, PipelineError> {
        let balances = self
            .executor
            .exchange()
            .wallet_balance(&self.settings.account_type)
            .await
            .map_err(|e| PipelineError::exchange(Stage::Balance, e))?;

        let balance = balances
            .into_iter()
            .find(|b| b.coin.eq_ignore_ascii_case(instrument.base()))
            .ok_or_else(|| PipelineError::NoBalance(instrument.base().to_string()))?;

        let quantity = sell_quantity(balance.wallet_balance);
        if quantity.is_zero() {
            return Err(PipelineError::ZeroQuantity);
        }

        tracing::debug!(
            instrument = %instrument,
            "Balance {} -> sell quantity {}",
            balance.wallet_balance,
            quantity
        );
        Ok(quantity)
    }

    async fn price(&self, instrument: &Instrument, multiplier: Decimal) -> Result<PricingDecision, PipelineError> {
        let now_ms = chrono::Utc::now().timestamp_millis();
        let query = KlineQuery {
            instrument: instrument.clone(),
            interval: self.settings.kline_interval.clone(),
            start_ms: now_ms - self.settings.kline_window.as_millis() as i64,
            end_ms: now_ms - self.settings.kline_end_offset.as_millis() as i64,
            limit: self.settings.kline_limit,
        };

        let candles = self
            .executor
            .exchange()
            .klines(&query)
            .await
            .map_err(|e| PipelineError::TransientProvider {
                stage: Stage::Candles,
                message: e.to_string(),
            })?;

        if candles.is_empty() {
            return Err(PipelineError::TransientProvider {
                stage: Stage::Candles,
                message: "no candles in window".to_string(),
            });
        }

        let closes: Vec<&str> = candles.iter().map(|c| c.close.as_str()).collect();
        take_profit(&closes, multiplier).map_err(|e| PipelineError::TransientProvider {
            stage: Stage::Pricing,
            message: e.to_string(),
        })
    }

    async fn sell(&self, request: &OrderRequest) -> Result<OrderAck, PipelineError> {
        self.executor
            .place_with_precision_retry(request)
            .await
            .map_err(|e| PipelineError::exchange(Stage::Sell, e))
    }
}

async fn sleep_if_set(delay: Duration) {
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}
