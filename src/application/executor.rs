//! Order Execution Engine
//!
//! Cooldown-gated market buys and sells with a bounded precision retry.

use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use tokio::time::Instant;

use crate::domain::{
    truncate, CooldownLedger, Instrument, OrderAck, OrderRequest, PrecisionRetry,
};
use crate::domain::order::QUOTE_AMOUNT_DP;
use crate::ports::exchange::{ExchangeError, ExchangePort};

/// Result of a buy attempt
#[derive(Debug, Clone, PartialEq)]
pub enum BuyOutcome {
    Confirmed(OrderAck),
    /// Bought too recently; nothing was sent
    CooldownActive { remaining: Duration },
    Rejected(ExchangeError),
}

impl BuyOutcome {
    pub fn is_confirmed(&self) -> bool {
        matches!(self, BuyOutcome::Confirmed(_))
    }
}

pub struct OrderExecutor {
    exchange: Arc<dyn ExchangePort>,
    ledger: CooldownLedger,
    retry: PrecisionRetry,
}

impl OrderExecutor {
    pub fn new(exchange: Arc<dyn ExchangePort>, cooldown: Duration) -> Self {
        Self {
            exchange,
            ledger: CooldownLedger::new(cooldown),
            retry: PrecisionRetry::default(),
        }
    }

    pub fn exchange(&self) -> &Arc<dyn ExchangePort> {
        &self.exchange
    }

    pub fn ledger(&self) -> &CooldownLedger {
        &self.ledger
    }

    /// Market buy spending `quote_amount`, unless the instrument is cooling down.
    ///
    /// The instrument's ledger entry stays locked from the check until the
    /// outcome is known, and is only written when the exchange confirms.
    pub async fn market_buy(&self, instrument: &Instrument, quote_amount: Decimal) -> BuyOutcome {
        let mut guard = self.ledger.acquire(instrument).await;

        if let Some(remaining) = guard.remaining(Instant::now()) {
            tracing::info!(
                instrument = %instrument,
                "Cooldown active, skipping buy ({}s left)",
                remaining.as_secs()
            );
            return BuyOutcome::CooldownActive { remaining };
        }

        let request = OrderRequest::market_buy(instrument.clone(), truncate(quote_amount, QUOTE_AMOUNT_DP));
        tracing::info!(instrument = %instrument, side = "Buy", quantity = %request.quantity, "Submitting {}", request);

        match self.exchange.place_order(&request).await {
            Ok(ack) => {
                guard.record(Instant::now());
                tracing::info!(instrument = %instrument, order_id = %ack.order_id, "Buy confirmed");
                BuyOutcome::Confirmed(ack)
            }
            Err(e) => {
                tracing::error!(instrument = %instrument, side = "Buy", "Buy rejected: {}", e);
                BuyOutcome::Rejected(e)
            }
        }
    }

    /// Submit `request`, retrying once with an integer quantity when the
    /// exchange rejects it for having too many decimals.
    pub async fn place_with_precision_retry(&self, request: &OrderRequest) -> Result<OrderAck, ExchangeError> {
        let mut current = request.clone();
        let mut attempt = 1;

        loop {
            match self.exchange.place_order(&current).await {
                Ok(ack) => {
                    tracing::info!(
                        instrument = %current.instrument,
                        order_id = %ack.order_id,
                        attempt,
                        "Order accepted: {}",
                        current
                    );
                    return Ok(ack);
                }
                Err(e) => {
                    let next = self
                        .retry
                        .next_quantity(attempt, current.quantity, e.is_precision_rejection());
                    match next {
                        Some(quantity) => {
                            tracing::warn!(
                                instrument = %current.instrument,
                                attempt,
                                "Quantity {} rejected ({}), retrying with {}",
                                current.quantity,
                                e,
                                quantity
                            );
                            current = current.with_quantity(quantity);
                            attempt += 1;
                        }
                        None => {
                            tracing::error!(
                                instrument = %current.instrument,
                                attempt,
                                "Order failed: {}: {}",
                                current,
                                e
                            );
                            return Err(e);
                        }
                    }
                }
            }
        }
    }
}
