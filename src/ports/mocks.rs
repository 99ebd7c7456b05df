//! Recording fakes for the ports, used by dry runs and integration tests

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;
use tokio::sync::mpsc;

use crate::domain::{OrderAck, OrderRequest, Side, Signal};

use super::exchange::{Candle, CoinBalance, ExchangeError, ExchangePort, KlineQuery};
use super::market_cap::{MarketCapError, MarketCapProvider};
use super::signal_source::{SignalSource, SourceError};

type OrderKey = (String, Side);

/// Exchange fake with scripted order outcomes that records every call.
///
/// Orders succeed unless a response was queued for their symbol and side.
#[derive(Debug, Default)]
pub struct ScriptedExchange {
    order_responses: Arc<Mutex<HashMap<OrderKey, VecDeque<Result<OrderAck, ExchangeError>>>>>,
    balances: Arc<Mutex<Vec<CoinBalance>>>,
    balance_error: Arc<Mutex<Option<ExchangeError>>>,
    candles: Arc<Mutex<HashMap<String, Vec<Candle>>>>,
    orders: Arc<Mutex<Vec<OrderRequest>>>,
    kline_queries: Arc<Mutex<Vec<KlineQuery>>>,
    order_latency: Duration,
    next_id: Arc<AtomicUsize>,
}

impl ScriptedExchange {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue one outcome for the next order on `symbol` and `side`
    pub fn with_order_response(self, symbol: &str, side: Side, response: Result<OrderAck, ExchangeError>) -> Self {
        self.order_responses
            .lock()
            .unwrap()
            .entry((symbol.to_string(), side))
            .or_default()
            .push_back(response);
        self
    }

    /// Queue a rejection for the next order on `symbol` and `side`
    pub fn with_rejection(self, symbol: &str, side: Side, message: &str) -> Self {
        self.with_order_response(
            symbol,
            side,
            Err(ExchangeError::Rejected {
                code: 170_000,
                message: message.to_string(),
            }),
        )
    }

    pub fn with_balance(self, coin: &str, balance: Decimal) -> Self {
        self.balances.lock().unwrap().push(CoinBalance {
            coin: coin.to_string(),
            wallet_balance: balance,
        });
        self
    }

    pub fn with_balance_error(self, error: ExchangeError) -> Self {
        *self.balance_error.lock().unwrap() = Some(error);
        self
    }

    /// One-minute candles for `symbol` with the given close prices
    pub fn with_closes(self, symbol: &str, closes: &[&str]) -> Self {
        let candles = closes
            .iter()
            .enumerate()
            .map(|(i, close)| Candle {
                start_ms: i as i64 * 60_000,
                open: close.to_string(),
                high: close.to_string(),
                low: close.to_string(),
                close: close.to_string(),
                volume: "0".to_string(),
            })
            .collect();
        self.candles.lock().unwrap().insert(symbol.to_string(), candles);
        self
    }

    /// Delay every order submission, to widen race windows in tests
    pub fn with_order_latency(mut self, latency: Duration) -> Self {
        self.order_latency = latency;
        self
    }

    /// All submitted orders in submission order
    pub fn orders(&self) -> Vec<OrderRequest> {
        self.orders.lock().unwrap().clone()
    }

    pub fn orders_for(&self, symbol: &str, side: Side) -> Vec<OrderRequest> {
        self.orders()
            .into_iter()
            .filter(|o| o.instrument.symbol() == symbol && o.side == side)
            .collect()
    }

    pub fn kline_queries(&self) -> Vec<KlineQuery> {
        self.kline_queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl ExchangePort for ScriptedExchange {
    async fn place_order(&self, request: &OrderRequest) -> Result<OrderAck, ExchangeError> {
        if !self.order_latency.is_zero() {
            tokio::time::sleep(self.order_latency).await;
        }
        self.orders.lock().unwrap().push(request.clone());

        let key = (request.instrument.symbol(), request.side);
        let scripted = self
            .order_responses
            .lock()
            .unwrap()
            .get_mut(&key)
            .and_then(|queue| queue.pop_front());

        scripted.unwrap_or_else(|| {
            let id = self.next_id.fetch_add(1, Ordering::SeqCst);
            Ok(OrderAck {
                order_id: format!("mock-{}", id),
                quantity: request.quantity,
            })
        })
    }

    async fn wallet_balance(&self, _account_type: &str) -> Result<Vec<CoinBalance>, ExchangeError> {
        if let Some(err) = self.balance_error.lock().unwrap().clone() {
            return Err(err);
        }
        Ok(self.balances.lock().unwrap().clone())
    }

    async fn klines(&self, query: &KlineQuery) -> Result<Vec<Candle>, ExchangeError> {
        self.kline_queries.lock().unwrap().push(query.clone());
        Ok(self
            .candles
            .lock()
            .unwrap()
            .get(&query.instrument.symbol())
            .cloned()
            .unwrap_or_default())
    }
}

/// Market-cap provider answering from a fixed table
#[derive(Debug)]
pub struct StaticMarketCap {
    name: &'static str,
    answers: HashMap<String, Result<Option<Decimal>, MarketCapError>>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl StaticMarketCap {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            answers: HashMap::new(),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_cap(mut self, symbol: &str, cap: Decimal) -> Self {
        self.answers.insert(symbol.to_uppercase(), Ok(Some(cap)));
        self
    }

    pub fn with_error(mut self, symbol: &str, error: MarketCapError) -> Self {
        self.answers.insert(symbol.to_uppercase(), Err(error));
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl MarketCapProvider for StaticMarketCap {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn market_cap(&self, symbol: &str) -> Result<Option<Decimal>, MarketCapError> {
        self.calls.lock().unwrap().push(symbol.to_string());
        self.answers
            .get(&symbol.to_uppercase())
            .cloned()
            .unwrap_or(Ok(None))
    }
}

/// How a scripted connection ends
#[derive(Debug)]
pub enum RunEnd {
    StayOpen,
    Fail(String),
    Panic(String),
}

/// One scripted connection of a `ScriptedSource`
#[derive(Debug)]
pub struct ScriptedRun {
    pub signals: Vec<Signal>,
    pub end: RunEnd,
}

/// Signal source replaying scripted connections.
///
/// Each `run` call consumes the next script entry. Once the script is
/// exhausted, or when an entry is `StayOpen`, the run stays connected.
#[derive(Debug, Default)]
pub struct ScriptedSource {
    runs: Mutex<VecDeque<ScriptedRun>>,
    starts: AtomicUsize,
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn then_fail(self, signals: Vec<Signal>, error: &str) -> Self {
        self.runs.lock().unwrap().push_back(ScriptedRun {
            signals,
            end: RunEnd::Fail(error.to_string()),
        });
        self
    }

    pub fn then_panic(self, message: &str) -> Self {
        self.runs.lock().unwrap().push_back(ScriptedRun {
            signals: Vec::new(),
            end: RunEnd::Panic(message.to_string()),
        });
        self
    }

    pub fn then_stay_open(self, signals: Vec<Signal>) -> Self {
        self.runs.lock().unwrap().push_back(ScriptedRun {
            signals,
            end: RunEnd::StayOpen,
        });
        self
    }

    /// Number of times the source was (re)started
    pub fn starts(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SignalSource for ScriptedSource {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn run(&self, tx: mpsc::Sender<Signal>) -> Result<(), SourceError> {
        self.starts.fetch_add(1, Ordering::SeqCst);
        let next = self.runs.lock().unwrap().pop_front();

        if let Some(run) = next {
            for signal in run.signals {
                tx.send(signal).await.map_err(|_| SourceError::Closed)?;
            }
            match run.end {
                RunEnd::StayOpen => {}
                RunEnd::Fail(failure) => return Err(SourceError::Connection(failure)),
                RunEnd::Panic(message) => panic!("{}", message),
            }
        }

        std::future::pending::<()>().await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Instrument;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_scripted_exchange_records_and_replays() {
        let exchange = ScriptedExchange::new().with_rejection("PEPEUSDT", Side::Sell, "too many decimals");
        let inst = Instrument::new("PEPE", "USDT").unwrap();
        let request = OrderRequest::market_sell(inst, dec!(1.5));

        assert!(exchange.place_order(&request).await.is_err());
        assert!(exchange.place_order(&request).await.is_ok());
        assert_eq!(exchange.orders().len(), 2);
    }

    #[tokio::test]
    async fn test_static_market_cap() {
        let provider = StaticMarketCap::new("static").with_cap("pepe", dec!(42));

        assert_eq!(provider.market_cap("PEPE").await, Ok(Some(dec!(42))));
        assert_eq!(provider.market_cap("XAI").await, Ok(None));
        assert_eq!(provider.calls(), vec!["PEPE".to_string(), "XAI".to_string()]);
    }
}
