//! Buy Cooldown Ledger
//!
//! Remembers when each instrument was last bought and suppresses repeat buys
//! inside the cooldown window. The same listing is often announced in several
//! channels within seconds; only the first should reach the exchange.
//!
//! Each instrument has its own async lock. A buyer holds it from the cooldown
//! check through order submission until the timestamp is recorded, so two
//! concurrent buys for one instrument cannot both pass the check.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tokio::time::Instant;

use super::ticker::Instrument;

type Entry = Arc<AsyncMutex<Option<Instant>>>;

/// Per-instrument last-buy timestamps, process lifetime only
#[derive(Debug)]
pub struct CooldownLedger {
    window: Duration,
    entries: Mutex<HashMap<Instrument, Entry>>,
}

impl CooldownLedger {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Take the instrument's exclusive section, waiting for any buy in flight.
    pub async fn acquire(&self, instrument: &Instrument) -> CooldownGuard {
        let entry = {
            let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
            entries.entry(instrument.clone()).or_default().clone()
        };

        CooldownGuard {
            last_buy: entry.lock_owned().await,
            window: self.window,
        }
    }

    /// Last confirmed buy, if any. Does not wait for a buy in flight.
    pub fn last_buy(&self, instrument: &Instrument) -> Option<Instant> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries
            .get(instrument)
            .and_then(|entry| entry.try_lock().ok().and_then(|guard| *guard))
    }
}

/// Exclusive access to one instrument's ledger entry
#[derive(Debug)]
pub struct CooldownGuard {
    last_buy: OwnedMutexGuard<Option<Instant>>,
    window: Duration,
}

impl CooldownGuard {
    /// Time left in the cooldown window, `None` when a buy is allowed.
    pub fn remaining(&self, now: Instant) -> Option<Duration> {
        let last = (*self.last_buy)?;
        let elapsed = now.saturating_duration_since(last);
        if elapsed < self.window {
            Some(self.window - elapsed)
        } else {
            None
        }
    }

    /// Record a confirmed buy.
    pub fn record(&mut self, at: Instant) {
        *self.last_buy = Some(at);
    }
}
