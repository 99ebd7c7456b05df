//! Ingestion supervisor
//!
//! Keeps the signal source running. Whenever the source fails, panics or its
//! stream ends, the supervisor waits for the restart delay and reconnects. Every
//! received signal is dispatched on its own task so a slow post-buy sequence
//! never blocks ingestion.
//!
//! Shutdown is driven by a `watch` channel: flipping it to `true` stops the
//! source without a restart and aborts signal tasks still in flight.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinSet;

use crate::domain::Signal;
use crate::ports::signal_source::SignalSource;

use super::dispatcher::SignalDispatcher;

/// Buffered signals between the source and the dispatcher
const SIGNAL_BUFFER: usize = 256;

#[derive(Debug, Clone)]
pub struct Supervisor {
    restart_delay: Duration,
}

impl Supervisor {
    pub fn new(restart_delay: Duration) -> Self {
        Self { restart_delay }
    }

    /// Run until `shutdown` turns true.
    pub async fn run(
        &self,
        source: Arc<dyn SignalSource>,
        dispatcher: Arc<SignalDispatcher>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        let (tx, rx) = mpsc::channel(SIGNAL_BUFFER);
        let consumer = tokio::spawn(consume(rx, dispatcher));

        tracing::info!("Supervisor started for source '{}'", source.name());

        loop {
            if *shutdown.borrow() {
                break;
            }

            let mut session = tokio::spawn({
                let source = source.clone();
                let tx = tx.clone();
                async move { source.run(tx).await }
            });

            let outcome = tokio::select! {
                joined = &mut session => Some(joined),
                _ = shutdown.changed() => None,
            };

            match outcome {
                None => {
                    session.abort();
                    break;
                }
                Some(Ok(Ok(()))) => tracing::warn!("Signal source '{}' disconnected", source.name()),
                Some(Ok(Err(e))) => tracing::error!("Signal source '{}' failed: {}", source.name(), e),
                Some(Err(e)) => tracing::error!("Signal source '{}' crashed: {}", source.name(), e),
            }

            if *shutdown.borrow() {
                break;
            }

            tracing::info!("Restarting signal source in {}s", self.restart_delay.as_secs());
            tokio::select! {
                _ = tokio::time::sleep(self.restart_delay) => {}
                _ = shutdown.changed() => break,
            }
        }

        drop(tx);
        consumer.abort();
        let _ = consumer.await;
        tracing::info!("Supervisor stopped");
    }
}

/// Spawn one dispatch task per signal. Dropping the set aborts what is left.
async fn consume(mut rx: mpsc::Receiver<Signal>, dispatcher: Arc<SignalDispatcher>) {
    let mut tasks = JoinSet::new();

    loop {
        tokio::select! {
            signal = rx.recv() => {
                let Some(signal) = signal else { break };
                let dispatcher = dispatcher.clone();
                tasks.spawn(async move {
                    dispatcher.dispatch(&signal).await;
                });
            }
            Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                if let Err(e) = joined {
                    if e.is_panic() {
                        tracing::error!("Signal task panicked: {}", e);
                    }
                }
            }
        }
    }

    tasks.abort_all();
    while tasks.join_next().await.is_some() {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::{MarketCapResolver, OrderExecutor};
    use crate::application::dispatcher::DispatcherSettings;
    use crate::domain::{FuturesTiers, PricingPolicy, SignalParser, SpotTiers};
    use crate::ports::mocks::{ScriptedExchange, ScriptedSource};
    use rust_decimal_macros::dec;

    const CHANNEL: i64 = -1001;

    fn dispatcher(exchange: Arc<ScriptedExchange>) -> Arc<SignalDispatcher> {
        let settings = DispatcherSettings {
            allowed_channels: [CHANNEL].into_iter().collect(),
            budget: dec!(600),
            quote_asset: "USDT".to_string(),
            account_type: "UNIFIED".to_string(),
            settlement_delay: Duration::ZERO,
            order_delay: Duration::ZERO,
            kline_window: Duration::from_secs(180),
            kline_end_offset: Duration::from_secs(30),
            kline_interval: "1".to_string(),
            kline_limit: 100,
        };
        let policy = PricingPolicy::new(
            &FuturesTiers {
                base_multiplier: dec!(1.45),
                increase: dec!(0.3),
                decrease: dec!(0.2),
                ultralow_cap: dec!(100000000),
                low_cap: dec!(150000000),
                mid_cap: dec!(180000000),
                max_cap: dec!(250000000),
            },
            &SpotTiers {
                base_multiplier: dec!(3),
                increase: dec!(4),
                decrease: dec!(1.5),
                low_threshold: dec!(150000000),
                high_threshold: dec!(500000000),
            },
        );
        Arc::new(SignalDispatcher::new(
            settings,
            SignalParser::new("USDT").unwrap(),
            policy,
            MarketCapResolver::new(Vec::new()),
            OrderExecutor::new(exchange, Duration::from_secs(60)),
        ))
    }

    #[tokio::test(start_paused = true)]
    async fn test_restarts_after_transport_failure() {
        let exchange = Arc::new(ScriptedExchange::new());
        let source = Arc::new(
            ScriptedSource::new()
                .then_fail(vec![], "connection reset")
                .then_stay_open(vec![Signal::new(CHANNEL, "Bybit will list Pepe (PEPE)")]),
        );
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let supervisor = Supervisor::new(Duration::from_secs(30));
        let handle = tokio::spawn({
            let source = source.clone();
            let dispatcher = dispatcher(exchange.clone());
            async move { supervisor.run(source, dispatcher, shutdown_rx).await }
        });

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(source.starts(), 1);

        tokio::time::sleep(Duration::from_secs(25)).await;
        assert_eq!(source.starts(), 2);
        assert_eq!(exchange.orders_for("PEPEUSDT", crate::domain::Side::Buy).len(), 1);

        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();
        assert_eq!(source.starts(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_restarts_after_source_panic() {
        let exchange = Arc::new(ScriptedExchange::new());
        let source = Arc::new(
            ScriptedSource::new()
                .then_panic("update decoder blew up")
                .then_stay_open(vec![Signal::new(CHANNEL, "Bybit will list Pepe (PEPE)")]),
        );
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let supervisor = Supervisor::new(Duration::from_secs(30));
        let handle = tokio::spawn({
            let source = source.clone();
            let dispatcher = dispatcher(exchange.clone());
            async move { supervisor.run(source, dispatcher, shutdown_rx).await }
        });

        tokio::time::sleep(Duration::from_secs(35)).await;
        assert_eq!(source.starts(), 2);
        assert_eq!(exchange.orders_for("PEPEUSDT", crate::domain::Side::Buy).len(), 1);

        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_during_backoff_does_not_restart() {
        let exchange = Arc::new(ScriptedExchange::new());
        let source = Arc::new(ScriptedSource::new().then_fail(vec![], "connection reset"));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let supervisor = Supervisor::new(Duration::from_secs(30));
        let handle = tokio::spawn({
            let source = source.clone();
            let dispatcher = dispatcher(exchange);
            async move { supervisor.run(source, dispatcher, shutdown_rx).await }
        });

        tokio::time::sleep(Duration::from_secs(5)).await;
        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(source.starts(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_aborts_in_flight_dispatch() {
        let exchange = Arc::new(ScriptedExchange::new().with_order_latency(Duration::from_secs(3600)));
        let source = Arc::new(
            ScriptedSource::new().then_stay_open(vec![Signal::new(CHANNEL, "Bybit will list Pepe (PEPE)")]),
        );
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let supervisor = Supervisor::new(Duration::from_secs(30));
        let handle = tokio::spawn({
            let source = source.clone();
            let dispatcher = dispatcher(exchange.clone());
            async move { supervisor.run(source, dispatcher, shutdown_rx).await }
        });

        tokio::time::sleep(Duration::from_secs(1)).await;
        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();

        assert!(exchange.orders().is_empty());
    }
}
