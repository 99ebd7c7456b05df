//! Order requests and quantity precision handling

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::ticker::Instrument;

/// Fractional digits kept when selling a wallet balance
pub const SELL_QUANTITY_DP: u32 = 2;

/// Fractional digits kept on a quote-denominated buy amount
pub const QUOTE_AMOUNT_DP: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Buy => "Buy",
            Side::Sell => "Sell",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderType {
    Market,
    Limit,
}

impl OrderType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderType::Market => "Market",
            OrderType::Limit => "Limit",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeInForce {
    /// Immediate or cancel
    Ioc,
    /// Good till cancelled
    Gtc,
}

impl TimeInForce {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeInForce::Ioc => "IOC",
            TimeInForce::Gtc => "GTC",
        }
    }
}

/// One order submission
#[derive(Debug, Clone, PartialEq)]
pub struct OrderRequest {
    pub instrument: Instrument,
    pub side: Side,
    pub order_type: OrderType,
    /// Base quantity, or quote amount for market buys
    pub quantity: Decimal,
    pub price: Option<Decimal>,
    pub time_in_force: TimeInForce,
}

impl OrderRequest {
    /// Market buy spending `quote_amount` of the quote asset
    pub fn market_buy(instrument: Instrument, quote_amount: Decimal) -> Self {
        Self {
            instrument,
            side: Side::Buy,
            order_type: OrderType::Market,
            quantity: quote_amount,
            price: None,
            time_in_force: TimeInForce::Ioc,
        }
    }

    /// Immediate exit of `quantity` base units
    pub fn market_sell(instrument: Instrument, quantity: Decimal) -> Self {
        Self {
            instrument,
            side: Side::Sell,
            order_type: OrderType::Market,
            quantity,
            price: None,
            time_in_force: TimeInForce::Ioc,
        }
    }

    /// Resting take-profit order
    pub fn limit_sell(instrument: Instrument, quantity: Decimal, price: Decimal) -> Self {
        Self {
            instrument,
            side: Side::Sell,
            order_type: OrderType::Limit,
            quantity,
            price: Some(price),
            time_in_force: TimeInForce::Gtc,
        }
    }

    pub fn with_quantity(&self, quantity: Decimal) -> Self {
        Self {
            quantity,
            ..self.clone()
        }
    }
}

impl fmt::Display for OrderRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} qty={}",
            self.order_type.as_str(),
            self.side.as_str(),
            self.instrument,
            self.quantity
        )?;
        if let Some(price) = self.price {
            write!(f, " @ {}", price)?;
        }
        write!(f, " {}", self.time_in_force.as_str())
    }
}

/// Accepted order
#[derive(Debug, Clone, PartialEq)]
pub struct OrderAck {
    pub order_id: String,
    /// Quantity the exchange accepted, after any precision retry
    pub quantity: Decimal,
}

/// Cut to `dp` fractional digits toward zero; never rounds up.
pub fn truncate(value: Decimal, dp: u32) -> Decimal {
    value.round_dp_with_strategy(dp, RoundingStrategy::ToZero)
}

/// Sellable quantity for a wallet balance: never more than is held
pub fn sell_quantity(balance: Decimal) -> Decimal {
    truncate(balance, SELL_QUANTITY_DP)
}

/// Bounded retry for quantity precision rejections
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PrecisionRetry {
    pub max_attempts: u32,
    /// Fractional digits of the retried quantity
    pub retry_dp: u32,
}

impl Default for PrecisionRetry {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            retry_dp: 0,
        }
    }
}

impl PrecisionRetry {
    /// Quantity for the next attempt, or `None` if no further attempt is allowed.
    ///
    /// `attempt` is the 1-based number of the attempt that just failed.
    pub fn next_quantity(&self, attempt: u32, quantity: Decimal, precision_rejected: bool) -> Option<Decimal> {
        if !precision_rejected || attempt >= self.max_attempts {
            return None;
        }

        let coarser = truncate(quantity, self.retry_dp);
        if coarser.is_zero() {
            return None;
        }
        Some(coarser)
    }
}
