//! Pipeline errors for one instrument's post-buy run

use std::fmt;
use thiserror::Error;

use crate::ports::exchange::ExchangeError;

/// Step of the post-buy sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Balance,
    MarketCap,
    Candles,
    Pricing,
    Sell,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Balance => "balance",
            Stage::MarketCap => "market-cap",
            Stage::Candles => "candles",
            Stage::Pricing => "pricing",
            Stage::Sell => "sell",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum PipelineError {
    /// Data provider failed; the sell is abandoned without retry
    #[error("{stage} unavailable: {message}")]
    TransientProvider { stage: Stage, message: String },

    #[error("No market cap from any provider")]
    MarketCapUnavailable,

    #[error("No wallet balance for {0}")]
    NoBalance(String),

    #[error("Sell quantity truncates to zero")]
    ZeroQuantity,

    #[error("Exchange error at {stage}: {source}")]
    Exchange {
        stage: Stage,
        #[source]
        source: ExchangeError,
    },
}

impl PipelineError {
    pub fn stage(&self) -> Stage {
        match self {
            PipelineError::TransientProvider { stage, .. } => *stage,
            PipelineError::MarketCapUnavailable => Stage::MarketCap,
            PipelineError::NoBalance(_) | PipelineError::ZeroQuantity => Stage::Balance,
            PipelineError::Exchange { stage, .. } => *stage,
        }
    }

    pub fn exchange(stage: Stage, source: ExchangeError) -> Self {
        PipelineError::Exchange { stage, source }
    }
}
