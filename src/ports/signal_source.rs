//! Inbound announcement stream port

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::domain::Signal;

/// Transport failure of the announcement stream; the supervisor restarts on these
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Authentication error: {0}")]
    Auth(String),

    /// Nobody is consuming signals any more
    #[error("Signal channel closed")]
    Closed,
}

#[async_trait]
pub trait SignalSource: Send + Sync {
    fn name(&self) -> &'static str;

    /// Forward every inbound text event to `tx` until the stream drops.
    ///
    /// Returns `Ok(())` on a clean disconnect and `Err` on transport failure.
    async fn run(&self, tx: mpsc::Sender<Signal>) -> Result<(), SourceError>;
}
