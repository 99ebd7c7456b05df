//! Domain Layer - Core decision logic for the listing sniper
//!
//! Pure types and rules with no I/O. All exchange, market data and
//! messaging interactions happen through the ports layer.
//!
//! - `ticker`: raw token canonicalization and the `Instrument` pair
//! - `signal`: announcement classification and ticker extraction
//! - `pricing`: market-cap tier tables and take-profit price math
//! - `cooldown`: per-instrument buy cooldown ledger
//! - `order`: order requests, quantity truncation, precision retry policy

pub mod ticker;
pub mod signal;
pub mod pricing;
pub mod cooldown;
pub mod order;

pub use ticker::{normalize, Instrument};
pub use signal::{ParsedSignal, Signal, SignalParser, SignalType};
pub use pricing::{
    take_profit, FuturesTiers, PricingDecision, PricingError, PricingPolicy, SpotTiers,
    TierAction, TierDecision, TierRule, TierTable,
};
pub use cooldown::{CooldownGuard, CooldownLedger};
pub use order::{
    sell_quantity, truncate, OrderAck, OrderRequest, OrderType, PrecisionRetry, Side, TimeInForce,
};
