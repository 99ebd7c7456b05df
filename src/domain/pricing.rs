//! Take-Profit Pricing Policy
//!
//! Maps a coin's market capitalization to a take-profit action through
//! ordered threshold bands, one table per signal type, and turns the chosen
//! multiplier into a limit price from recent candle closes.
//!
//! Small caps get a larger multiple, large caps a smaller one. Under
//! futures launches the extremes switch action entirely: too small to sell
//! into (skip) or large enough to exit immediately (market sell).

use rust_decimal::{Decimal, RoundingStrategy};
use std::ops::{Bound, RangeBounds};
use thiserror::Error;

use super::signal::SignalType;

#[derive(Debug, Error, PartialEq)]
pub enum PricingError {
    #[error("No candle closes to price from")]
    NoCloses,
    #[error("Invalid close price: {0}")]
    InvalidClose(String),
}

/// What a matching band does
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TierAction {
    /// Do not place any sell order
    Skip,
    /// Exit at market instead of a priced limit order
    MarketSell,
    /// Add `delta` (may be negative or zero) to the base multiplier
    Adjust(Decimal),
}

/// One capitalization band
#[derive(Debug, Clone, PartialEq)]
pub struct TierRule {
    pub lower: Bound<Decimal>,
    pub upper: Bound<Decimal>,
    pub action: TierAction,
}

impl TierRule {
    pub fn new(lower: Bound<Decimal>, upper: Bound<Decimal>, action: TierAction) -> Self {
        Self { lower, upper, action }
    }

    pub fn contains(&self, market_cap: &Decimal) -> bool {
        (self.lower, self.upper).contains(market_cap)
    }
}

/// Resolved sell action for one instrument
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TierDecision {
    Skip,
    MarketSell,
    LimitSell { multiplier: Decimal },
}

/// Base multiplier plus ordered bands; first matching band wins
#[derive(Debug, Clone, PartialEq)]
pub struct TierTable {
    pub base_multiplier: Decimal,
    pub rules: Vec<TierRule>,
}

impl TierTable {
    pub fn decide(&self, market_cap: Decimal) -> TierDecision {
        let Some(rule) = self.rules.iter().find(|r| r.contains(&market_cap)) else {
            return TierDecision::LimitSell {
                multiplier: self.base_multiplier,
            };
        };

        match rule.action {
            TierAction::Skip => TierDecision::Skip,
            TierAction::MarketSell => TierDecision::MarketSell,
            TierAction::Adjust(delta) => TierDecision::LimitSell {
                multiplier: self.base_multiplier + delta,
            },
        }
    }
}

/// Futures-launch band thresholds and adjustments
#[derive(Debug, Clone, PartialEq)]
pub struct FuturesTiers {
    pub base_multiplier: Decimal,
    pub increase: Decimal,
    pub decrease: Decimal,
    pub ultralow_cap: Decimal,
    pub low_cap: Decimal,
    pub mid_cap: Decimal,
    pub max_cap: Decimal,
}

impl FuturesTiers {
    /// Build the band table.
    ///
    /// `[low, mid]` is an explicit no-adjustment band. A cap exactly at
    /// `ultralow` matches no band and keeps the base multiplier.
    pub fn table(&self) -> TierTable {
        use Bound::{Excluded, Included, Unbounded};

        TierTable {
            base_multiplier: self.base_multiplier,
            rules: vec![
                TierRule::new(Unbounded, Excluded(self.ultralow_cap), TierAction::Skip),
                TierRule::new(
                    Excluded(self.ultralow_cap),
                    Excluded(self.low_cap),
                    TierAction::Adjust(self.increase),
                ),
                TierRule::new(
                    Included(self.low_cap),
                    Included(self.mid_cap),
                    TierAction::Adjust(Decimal::ZERO),
                ),
                TierRule::new(
                    Excluded(self.mid_cap),
                    Excluded(self.max_cap),
                    TierAction::Adjust(-self.decrease),
                ),
                TierRule::new(Included(self.max_cap), Unbounded, TierAction::MarketSell),
            ],
        }
    }
}

/// Spot-listing band thresholds and adjustments
#[derive(Debug, Clone, PartialEq)]
pub struct SpotTiers {
    pub base_multiplier: Decimal,
    pub increase: Decimal,
    pub decrease: Decimal,
    pub low_threshold: Decimal,
    pub high_threshold: Decimal,
}

impl SpotTiers {
    pub fn table(&self) -> TierTable {
        use Bound::{Excluded, Included, Unbounded};

        TierTable {
            base_multiplier: self.base_multiplier,
            rules: vec![
                TierRule::new(
                    Unbounded,
                    Included(self.low_threshold),
                    TierAction::Adjust(self.increase),
                ),
                TierRule::new(
                    Excluded(self.low_threshold),
                    Excluded(self.high_threshold),
                    TierAction::Adjust(Decimal::ZERO),
                ),
                TierRule::new(
                    Included(self.high_threshold),
                    Unbounded,
                    TierAction::Adjust(-self.decrease),
                ),
            ],
        }
    }
}

/// Tier tables for both signal types
#[derive(Debug, Clone, PartialEq)]
pub struct PricingPolicy {
    futures: TierTable,
    spot: TierTable,
}

impl PricingPolicy {
    pub fn new(futures: &FuturesTiers, spot: &SpotTiers) -> Self {
        Self {
            futures: futures.table(),
            spot: spot.table(),
        }
    }

    pub fn table(&self, signal_type: SignalType) -> &TierTable {
        match signal_type {
            SignalType::FuturesLaunch => &self.futures,
            SignalType::SpotListing => &self.spot,
        }
    }

    pub fn decide(&self, signal_type: SignalType, market_cap: Decimal) -> TierDecision {
        self.table(signal_type).decide(market_cap)
    }

    /// Multiplier for a priced limit sell, `None` when the band skips or market-sells.
    pub fn decide_multiplier(&self, signal_type: SignalType, market_cap: Decimal) -> Option<Decimal> {
        match self.decide(signal_type, market_cap) {
            TierDecision::LimitSell { multiplier } => Some(multiplier),
            TierDecision::Skip | TierDecision::MarketSell => None,
        }
    }
}

/// Limit price derived from recent closes
#[derive(Debug, Clone, PartialEq)]
pub struct PricingDecision {
    pub multiplier: Decimal,
    pub average_price: Decimal,
    pub take_profit_price: Decimal,
    /// Fractional digits the price is rounded to
    pub precision: u32,
}

/// Number of fractional digits as written, trailing zeros included.
pub fn fractional_digits(raw: &str) -> u32 {
    raw.trim()
        .split_once('.')
        .map(|(_, frac)| frac.len() as u32)
        .unwrap_or(0)
}

/// Price a take-profit order from raw close strings.
///
/// The average close times the multiplier is rounded up, away from zero, to
/// the largest number of fractional digits seen in the closes.
pub fn take_profit<S: AsRef<str>>(closes: &[S], multiplier: Decimal) -> Result<PricingDecision, PricingError> {
    if closes.is_empty() {
        return Err(PricingError::NoCloses);
    }

    let mut sum = Decimal::ZERO;
    let mut precision = 0;
    for raw in closes {
        let raw = raw.as_ref();
        let price: Decimal = raw
            .trim()
            .parse()
            .map_err(|_| PricingError::InvalidClose(raw.to_string()))?;
        sum += price;
        precision = precision.max(fractional_digits(raw));
    }

    let average_price = sum / Decimal::from(closes.len());
    let take_profit_price = (average_price * multiplier)
        .round_dp_with_strategy(precision, RoundingStrategy::AwayFromZero);

    Ok(PricingDecision {
        multiplier,
        average_price,
        take_profit_price,
        precision,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn futures_tiers() -> FuturesTiers {
        FuturesTiers {
            base_multiplier: dec!(1.45),
            increase: dec!(0.3),
            decrease: dec!(0.2),
            ultralow_cap: dec!(100000000),
            low_cap: dec!(150000000),
            mid_cap: dec!(180000000),
            max_cap: dec!(250000000),
        }
    }

    fn spot_tiers() -> SpotTiers {
        SpotTiers {
            base_multiplier: dec!(3),
            increase: dec!(4),
            decrease: dec!(1.5),
            low_threshold: dec!(150000000),
            high_threshold: dec!(500000000),
        }
    }

    fn policy() -> PricingPolicy {
        PricingPolicy::new(&futures_tiers(), &spot_tiers())
    }

    #[test]
    fn test_futures_below_ultralow_skips() {
        let p = policy();
        for cap in [dec!(0), dec!(5000000), dec!(99999999.99)] {
            assert_eq!(p.decide(SignalType::FuturesLaunch, cap), TierDecision::Skip);
            assert_eq!(p.decide_multiplier(SignalType::FuturesLaunch, cap), None);
        }
    }

    #[test]
    fn test_futures_low_band_increases() {
        assert_eq!(
            policy().decide(SignalType::FuturesLaunch, dec!(120000000)),
            TierDecision::LimitSell { multiplier: dec!(1.75) }
        );
    }

    #[test]
    fn test_futures_gap_band_keeps_base() {
        let p = policy();
        for cap in [dec!(150000000), dec!(165000000), dec!(180000000)] {
            assert_eq!(
                p.decide(SignalType::FuturesLaunch, cap),
                TierDecision::LimitSell { multiplier: dec!(1.45) }
            );
        }
    }

    #[test]
    fn test_futures_exact_ultralow_keeps_base() {
        assert_eq!(
            policy().decide(SignalType::FuturesLaunch, dec!(100000000)),
            TierDecision::LimitSell { multiplier: dec!(1.45) }
        );
    }

    #[test]
    fn test_futures_mid_band_decreases() {
        assert_eq!(
            policy().decide_multiplier(SignalType::FuturesLaunch, dec!(200000000)),
            Some(dec!(1.25))
        );
    }

    #[test]
    fn test_futures_at_or_above_max_market_sells() {
        let p = policy();
        for cap in [dec!(250000000), dec!(10000000000)] {
            assert_eq!(p.decide(SignalType::FuturesLaunch, cap), TierDecision::MarketSell);
        }
    }

    #[test]
    fn test_spot_bands() {
        let p = policy();
        assert_eq!(p.decide_multiplier(SignalType::SpotListing, dec!(50000000)), Some(dec!(7)));
        assert_eq!(p.decide_multiplier(SignalType::SpotListing, dec!(150000000)), Some(dec!(7)));
        assert_eq!(p.decide_multiplier(SignalType::SpotListing, dec!(150000001)), Some(dec!(3)));
        assert_eq!(p.decide_multiplier(SignalType::SpotListing, dec!(499999999)), Some(dec!(3)));
        assert_eq!(p.decide_multiplier(SignalType::SpotListing, dec!(500000000)), Some(dec!(1.5)));
        assert_eq!(p.decide_multiplier(SignalType::SpotListing, dec!(9000000000)), Some(dec!(1.5)));
    }

    #[test]
    fn test_fractional_digits() {
        assert_eq!(fractional_digits("0.012340"), 6);
        assert_eq!(fractional_digits("12.5"), 1);
        assert_eq!(fractional_digits("42"), 0);
    }

    #[test]
    fn test_take_profit_rounds_up() {
        let closes = ["0.0101", "0.0102", "0.0104"];
        let decision = take_profit(&closes, dec!(1.75)).unwrap();

        // avg 0.010233.. * 1.75 = 0.0179083.. -> 0.0180
        assert_eq!(decision.precision, 4);
        assert_eq!(decision.take_profit_price, dec!(0.0180));
        assert_eq!(decision.multiplier, dec!(1.75));
    }

    #[test]
    fn test_take_profit_uses_max_precision() {
        let closes = ["1.5", "1.25", "1.125"];
        let decision = take_profit(&closes, dec!(2)).unwrap();
        assert_eq!(decision.precision, 3);
        assert_eq!(decision.take_profit_price, dec!(2.584));
    }

    #[test]
    fn test_take_profit_exact_value_not_bumped() {
        let decision = take_profit(&["2.00", "2.00"], dec!(3)).unwrap();
        assert_eq!(decision.take_profit_price, dec!(6.00));
    }

    #[test]
    fn test_take_profit_errors() {
        let empty: [&str; 0] = [];
        assert_eq!(take_profit(&empty, dec!(2)), Err(PricingError::NoCloses));
        assert!(matches!(
            take_profit(&["abc"], dec!(2)),
            Err(PricingError::InvalidClose(_))
        ));
    }
}
